use anyhow::{Context, Result};
use po_forecast::{
    records_from_reader, render_pivot, run_forecast, write_forecast_csv, write_pivot_csv,
    RenderOptions,
};
use std::env;
use std::fs::File;

/// End-to-end workflow: load a JSON batch of purchase orders, run the
/// forecast, write both output tables, and print the pivot.
///
/// Usage: cargo run --example forecast_workflow [purchase_orders.json]
fn main() -> Result<()> {
    let input_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "output/purchase_orders.json".to_string());

    let input = File::open(&input_path)
        .with_context(|| format!("could not open input batch '{}'", input_path))?;
    let records = records_from_reader(input)?;

    let run = run_forecast(&records);

    println!(
        "Processed {} records: {} accepted, {} rejected, {} with skipped entries",
        records.len(),
        run.summary.accepted,
        run.summary.rejected(),
        run.summary.records_with_skipped_entries,
    );
    for rejection in &run.summary.rejections {
        println!("  rejected {}", rejection);
    }

    let csv_path = "forecast_output.csv";
    write_forecast_csv(File::create(csv_path)?, &run.rows)?;
    println!("Saved forecast table to '{}'", csv_path);

    match &run.pivot {
        Some(pivot) => {
            let pivot_path = "forecast_pivot.csv";
            write_pivot_csv(File::create(pivot_path)?, pivot)?;
            println!("Saved forecast pivot to '{}'\n", pivot_path);
            println!("{}", render_pivot(pivot, &RenderOptions::default()));
        }
        None => println!("No valid months across the batch; pivot skipped."),
    }

    Ok(())
}
