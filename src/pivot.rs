use crate::engine::MonthlyInflow;
use crate::schema::NormalizedPo;
use crate::utils::{add_months, month_key, parse_month_key, round2};
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Owner shown when a PO carries no project owner.
pub const OWNER_PLACEHOLDER: &str = "-";

/// One flattened forecast observation: a single PO's inflow in a single
/// month. Created once per `(po, month)` cell and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    #[serde(rename = "Client Name")]
    pub client_name: String,
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "Inflow (USD)")]
    pub inflow: f64,
    #[serde(rename = "PO No")]
    pub po_id: String,
    #[serde(rename = "Project Owner")]
    pub project_owner: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl ForecastRow {
    fn dedupe_key(&self) -> (String, String, i64, String, String, String) {
        (
            self.client_name.clone(),
            self.month.clone(),
            (self.inflow * 100.0).round() as i64,
            self.po_id.clone(),
            self.project_owner.clone(),
            self.status.clone(),
        )
    }
}

/// Flattens one PO's monthly inflow map into forecast rows, rounding
/// amounts to cents.
pub fn po_rows(po: &NormalizedPo, monthly: &MonthlyInflow) -> Vec<ForecastRow> {
    monthly
        .iter()
        .map(|(month, amount)| ForecastRow {
            client_name: po.client_name.clone(),
            month: month.clone(),
            inflow: round2(*amount),
            po_id: po.po_id.clone(),
            project_owner: po
                .project_owner
                .clone()
                .unwrap_or_else(|| OWNER_PLACEHOLDER.to_string()),
            status: po.status.to_string(),
        })
        .collect()
}

/// Drops exact-duplicate rows, keeping the last occurrence so re-running
/// a batch over an unchanged PO does not double its rows.
pub fn dedupe_rows(rows: Vec<ForecastRow>) -> Vec<ForecastRow> {
    let mut last_seen: HashMap<_, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        last_seen.insert(row.dedupe_key(), i);
    }

    rows.into_iter()
        .enumerate()
        .filter(|(i, row)| last_seen[&row.dedupe_key()] == *i)
        .map(|(_, row)| row)
        .collect()
}

/// The contiguous `"YYYY-MM"` axis from the earliest to the latest month
/// observed across all rows, gaps included. `None` when no row carries a
/// parseable month.
pub fn month_axis(rows: &[ForecastRow]) -> Option<Vec<String>> {
    let months: Vec<_> = rows
        .iter()
        .filter_map(|row| parse_month_key(&row.month))
        .collect();
    let first = *months.iter().min()?;
    let last = *months.iter().max()?;

    let mut axis = Vec::new();
    let mut current = first;
    while current <= last {
        axis.push(month_key(current));
        current = add_months(current, 1)?;
    }
    Some(axis)
}

/// One pivot line: a `(client, po, owner, status)` group with one cell
/// per axis month and a row total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub client_name: String,
    pub po_id: String,
    pub project_owner: String,
    pub status: String,
    /// Summed inflow per axis month, aligned to `PivotTable::months`.
    pub cells: Vec<f64>,
    pub total: f64,
}

/// The client/PO pivot, recomputed in full from the row set on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub months: Vec<String>,
    pub rows: Vec<PivotRow>,
    /// Column-wise sums for the trailing `TOTAL` row.
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
}

/// Builds the pivot from flattened rows. Returns `None` (with a log)
/// when no row carries a parseable month; the flat table remains usable
/// in that case.
pub fn build_pivot(rows: &[ForecastRow]) -> Option<PivotTable> {
    let months = match month_axis(rows) {
        Some(months) => months,
        None => {
            if !rows.is_empty() {
                warn!("no valid months across the batch, skipping pivot generation");
            }
            return None;
        }
    };

    let index: HashMap<&str, usize> = months
        .iter()
        .enumerate()
        .map(|(i, m)| (m.as_str(), i))
        .collect();

    // Groups sort by their full key, which fixes the pivot's row order
    // and the S.No sequence derived from it.
    let mut groups: BTreeMap<(String, String, String, String), Vec<f64>> = BTreeMap::new();
    for row in rows {
        let slot = match index.get(row.month.as_str()) {
            Some(slot) => *slot,
            None => {
                warn!(
                    "dropping row with unparseable month '{}' from pivot",
                    row.month
                );
                continue;
            }
        };

        let key = (
            row.client_name.clone(),
            row.po_id.clone(),
            row.project_owner.clone(),
            row.status.clone(),
        );
        let cells = groups.entry(key).or_insert_with(|| vec![0.0; months.len()]);
        cells[slot] += row.inflow;
    }

    let mut pivot_rows = Vec::with_capacity(groups.len());
    let mut column_totals = vec![0.0; months.len()];

    for ((client_name, po_id, project_owner, status), cells) in groups {
        for (total, cell) in column_totals.iter_mut().zip(&cells) {
            *total += cell;
        }
        let total = cells.iter().sum();
        pivot_rows.push(PivotRow {
            client_name,
            po_id,
            project_owner,
            status,
            cells,
            total,
        });
    }

    let grand_total = column_totals.iter().sum();

    Some(PivotTable {
        months,
        rows: pivot_rows,
        column_totals,
        grand_total,
    })
}
