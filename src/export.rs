use crate::error::Result;
use crate::pivot::{ForecastRow, PivotTable};
use crate::utils::parse_month_key;
use num_format::{Locale, ToFormattedString};
use std::io::Write;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Monetary rounding granularity for rendered views. The flat CSV always
/// keeps cents; interactive views historically used either convention, so
/// the choice is explicit here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    #[default]
    Cents,
    WholeDollars,
}

/// How month columns are labelled in rendered views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonthDisplay {
    /// `2024-01`
    #[default]
    Numeric,
    /// `Jan 2024`
    Abbreviated,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub rounding: Rounding,
    pub month_display: MonthDisplay,
}

/// Column contract of the flat forecast table.
pub const FLAT_HEADERS: [&str; 6] = [
    "Client Name",
    "Month",
    "Inflow (USD)",
    "PO No",
    "Project Owner",
    "Status",
];

/// Writes the flat forecast table as CSV with raw 2-decimal floats.
pub fn write_forecast_csv<W: Write>(writer: W, rows: &[ForecastRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(FLAT_HEADERS)?;
    for row in rows {
        let inflow = format!("{:.2}", row.inflow);
        wtr.write_record([
            row.client_name.as_str(),
            row.month.as_str(),
            inflow.as_str(),
            row.po_id.as_str(),
            row.project_owner.as_str(),
            row.status.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the pivot as CSV: `S.No, Client Name, PO No, Project Owner,
/// Status, <months>, Total` plus the trailing `TOTAL` row.
pub fn write_pivot_csv<W: Write>(writer: W, pivot: &PivotTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![
        "S.No".to_string(),
        "Client Name".to_string(),
        "PO No".to_string(),
        "Project Owner".to_string(),
        "Status".to_string(),
    ];
    header.extend(pivot.months.iter().cloned());
    header.push("Total".to_string());
    wtr.write_record(&header)?;

    for (i, row) in pivot.rows.iter().enumerate() {
        let mut record = vec![
            (i + 1).to_string(),
            row.client_name.clone(),
            row.po_id.clone(),
            row.project_owner.clone(),
            row.status.clone(),
        ];
        record.extend(row.cells.iter().map(|cell| format!("{:.2}", cell)));
        record.push(format!("{:.2}", row.total));
        wtr.write_record(&record)?;
    }

    let mut totals = vec![
        String::new(),
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        String::new(),
    ];
    totals.extend(pivot.column_totals.iter().map(|t| format!("{:.2}", t)));
    totals.push(format!("{:.2}", pivot.grand_total));
    wtr.write_record(&totals)?;

    wtr.flush()?;
    Ok(())
}

/// Formats a monetary value with a `$` prefix and thousands separators,
/// at the configured granularity.
pub fn format_currency(value: f64, rounding: Rounding) -> String {
    let negative = value < 0.0;
    let abs = value.abs();

    let body = match rounding {
        Rounding::WholeDollars => (abs.round() as i64).to_formatted_string(&Locale::en),
        Rounding::Cents => {
            let fixed = format!("{:.2}", abs);
            let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
            let int_val: i64 = int_part.parse().unwrap_or(0);
            format!("{}.{}", int_val.to_formatted_string(&Locale::en), frac_part)
        }
    };

    if negative {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

fn display_month(month: &str, display: MonthDisplay) -> String {
    match display {
        MonthDisplay::Numeric => month.to_string(),
        MonthDisplay::Abbreviated => parse_month_key(month)
            .map(|date| date.format("%b %Y").to_string())
            .unwrap_or_else(|| month.to_string()),
    }
}

/// Renders the pivot as a markdown-style text table with currency cells.
pub fn render_pivot(pivot: &PivotTable, options: &RenderOptions) -> String {
    let mut builder = Builder::default();

    let mut header = vec![
        "S.No".to_string(),
        "Client Name".to_string(),
        "PO No".to_string(),
        "Project Owner".to_string(),
        "Status".to_string(),
    ];
    header.extend(
        pivot
            .months
            .iter()
            .map(|m| display_month(m, options.month_display)),
    );
    header.push("Total".to_string());
    builder.push_record(header);

    for (i, row) in pivot.rows.iter().enumerate() {
        let mut record = vec![
            (i + 1).to_string(),
            row.client_name.clone(),
            row.po_id.clone(),
            row.project_owner.clone(),
            row.status.clone(),
        ];
        record.extend(
            row.cells
                .iter()
                .map(|cell| format_currency(*cell, options.rounding)),
        );
        record.push(format_currency(row.total, options.rounding));
        builder.push_record(record);
    }

    let mut totals = vec![
        String::new(),
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        String::new(),
    ];
    totals.extend(
        pivot
            .column_totals
            .iter()
            .map(|t| format_currency(*t, options.rounding)),
    );
    totals.push(format_currency(pivot.grand_total, options.rounding));
    builder.push_record(totals);

    builder.build().with(Style::markdown()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::{build_pivot, OWNER_PLACEHOLDER};

    fn sample_rows() -> Vec<ForecastRow> {
        vec![
            ForecastRow {
                client_name: "Acme".to_string(),
                month: "2024-01".to_string(),
                inflow: 1250.5,
                po_id: "PO-1".to_string(),
                project_owner: OWNER_PLACEHOLDER.to_string(),
                status: "Confirmed".to_string(),
            },
            ForecastRow {
                client_name: "Globex".to_string(),
                month: "2024-02".to_string(),
                inflow: 800.0,
                po_id: "PO-2".to_string(),
                project_owner: "Dana".to_string(),
                status: "unspecified".to_string(),
            },
        ]
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(12345.678, Rounding::Cents), "$12,345.68");
        assert_eq!(format_currency(12345.678, Rounding::WholeDollars), "$12,346");
        assert_eq!(format_currency(0.0, Rounding::Cents), "$0.00");
        assert_eq!(format_currency(-500.0, Rounding::WholeDollars), "-$500");
    }

    #[test]
    fn test_flat_csv_layout() {
        let mut buf = Vec::new();
        write_forecast_csv(&mut buf, &sample_rows()).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Client Name,Month,Inflow (USD),PO No,Project Owner,Status")
        );
        assert_eq!(lines.next(), Some("Acme,2024-01,1250.50,PO-1,-,Confirmed"));
        assert_eq!(
            lines.next(),
            Some("Globex,2024-02,800.00,PO-2,Dana,unspecified")
        );
    }

    #[test]
    fn test_pivot_csv_has_total_row_and_gap_columns() {
        let rows = sample_rows();
        let pivot = build_pivot(&rows).unwrap();

        let mut buf = Vec::new();
        write_pivot_csv(&mut buf, &pivot).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "S.No,Client Name,PO No,Project Owner,Status,2024-01,2024-02,Total"
        );
        assert_eq!(lines[1], "1,Acme,PO-1,-,Confirmed,1250.50,0.00,1250.50");
        assert_eq!(
            lines[3],
            ",TOTAL,,,,1250.50,800.00,2050.50"
        );
    }

    #[test]
    fn test_render_pivot_formats_currency_and_months() {
        let rows = sample_rows();
        let pivot = build_pivot(&rows).unwrap();

        let rendered = render_pivot(
            &pivot,
            &RenderOptions {
                rounding: Rounding::WholeDollars,
                month_display: MonthDisplay::Abbreviated,
            },
        );

        assert!(rendered.contains("Jan 2024"));
        assert!(rendered.contains("Feb 2024"));
        assert!(rendered.contains("$1,251"));
        assert!(rendered.contains("TOTAL"));
    }
}
