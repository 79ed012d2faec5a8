//! # PO Forecast
//!
//! A library for converting purchase-order payment terms (extracted from
//! PO documents via LLM) into dense monthly cash-inflow forecasts with a
//! client/PO pivot view.
//!
//! ## Core Concepts
//!
//! - **Raw Record**: one loosely-typed PO object as the extraction layer
//!   emits it ([`RawPoRecord`]) — amounts may be strings, dates arrive as
//!   `DD-MM-YYYY` text, and the payment schedule changes shape with the
//!   payment type.
//! - **Normalization**: the single boundary where raw records are
//!   validated and converted into typed purchase orders ([`NormalizedPo`])
//!   or rejected with a reason ([`Rejection`]).
//! - **Expansion**: each payment type (distributed, milestone, fixed,
//!   even, periodic) has a deterministic rule that spreads the contract
//!   value across calendar months ([`MonthlyInflow`]).
//! - **Pivot**: all per-PO rows merge into one table per
//!   `(client, PO, owner, status)` group with a contiguous month axis,
//!   row totals, and a trailing `TOTAL` row ([`PivotTable`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use po_forecast::*;
//!
//! let records = records_from_json_str(r#"[
//!     {
//!         "po_id": "PO-100",
//!         "client_name": "Acme Corp",
//!         "amount": 300,
//!         "payment_type": "even",
//!         "start_date": "01-01-2024",
//!         "end_date": "01-03-2024"
//!     }
//! ]"#)?;
//!
//! let run = run_forecast(&records);
//! assert_eq!(run.summary.accepted, 1);
//!
//! let mut csv = Vec::new();
//! write_forecast_csv(&mut csv, &run.rows)?;
//! if let Some(pivot) = &run.pivot {
//!     println!("{}", render_pivot(pivot, &RenderOptions::default()));
//! }
//! ```

pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod normalize;
pub mod pivot;
pub mod schema;
pub mod utils;

pub use engine::{expand, Expansion, MonthlyInflow, MONTH_SHIFT_DAY};
pub use error::{ForecastError, Result};
pub use export::{
    format_currency, render_pivot, write_forecast_csv, write_pivot_csv, MonthDisplay,
    RenderOptions, Rounding, FLAT_HEADERS,
};
pub use ingestion::{records_from_json_str, records_from_reader, records_from_value};
pub use normalize::{normalize, Rejection};
pub use pivot::{
    build_pivot, dedupe_rows, month_axis, po_rows, ForecastRow, PivotRow, PivotTable,
    OWNER_PLACEHOLDER,
};
pub use schema::*;

use log::{debug, info, warn};

/// Per-batch audit counters so a caller can explain why a PO contributed
/// nothing to the forecast.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub accepted: usize,
    pub rejections: Vec<Rejection>,
    /// Accepted records that had one or more sub-entries skipped.
    pub records_with_skipped_entries: usize,
}

impl BatchSummary {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

/// The result of one batch run: the flat forecast table, the pivot (when
/// at least one valid month exists), and the audit summary.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub rows: Vec<ForecastRow>,
    pub pivot: Option<PivotTable>,
    pub summary: BatchSummary,
}

pub struct ForecastProcessor;

impl ForecastProcessor {
    /// Runs validation, expansion, and aggregation over a batch of raw
    /// records. Rejected records are collected, never fatal.
    pub fn process(records: &[RawPoRecord]) -> ForecastRun {
        Self::process_with_existing(records, Vec::new())
    }

    /// Like [`process`](Self::process), but merges with rows kept from an
    /// earlier run. Exact duplicates collapse (last occurrence wins), so
    /// re-running an unchanged batch does not double its rows.
    pub fn process_with_existing(
        records: &[RawPoRecord],
        existing_rows: Vec<ForecastRow>,
    ) -> ForecastRun {
        info!("processing forecast batch of {} purchase orders", records.len());

        let mut rows = existing_rows;
        let mut summary = BatchSummary::default();

        for raw in records {
            match normalize(raw) {
                Ok(po) => {
                    let expansion = expand(&po);
                    if po.skipped_entries + expansion.skipped_entries > 0 {
                        summary.records_with_skipped_entries += 1;
                    }
                    if expansion.monthly.is_empty() {
                        debug!("{}: no dated inflow entries, contributing zero rows", po.po_id);
                    }
                    rows.extend(po_rows(&po, &expansion.monthly));
                    summary.accepted += 1;
                }
                Err(rejection) => {
                    warn!("rejected record: {}", rejection);
                    summary.rejections.push(rejection);
                }
            }
        }

        let rows = dedupe_rows(rows);
        let pivot = build_pivot(&rows);

        debug!(
            "batch complete: {} accepted, {} rejected, {} rows, pivot: {}",
            summary.accepted,
            summary.rejected(),
            rows.len(),
            pivot.is_some()
        );

        ForecastRun {
            rows,
            pivot,
            summary,
        }
    }
}

pub fn run_forecast(records: &[RawPoRecord]) -> ForecastRun {
    ForecastProcessor::process(records)
}
