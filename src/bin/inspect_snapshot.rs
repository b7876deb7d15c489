//! Utility to validate a snapshot file and print its entries.

use std::path::PathBuf;
use stripe_invoice_enrichment::snapshot;

/// Main entry point for the snapshot inspection utility.
///
/// Reads the path from the first argument, falling back to `SNAPSHOT_PATH`
/// and then `invoices.json`, and lists each subscription summary.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SNAPSHOT_PATH").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("invoices.json"));

    let summaries = snapshot::load_snapshot(&path).await?;

    println!("{}: {} subscriptions", path.display(), summaries.len());
    for summary in &summaries {
        let same = if summary.first_invoice_id == summary.last_invoice_id {
            " (single invoice)"
        } else {
            ""
        };
        println!(
            "- {} / {} <{}>: {} -> {}{}",
            summary.subscription_id,
            summary.customer_id,
            summary.customer_email.as_deref().unwrap_or("no email"),
            summary.first_invoice_id,
            summary.last_invoice_id,
            same
        );
    }

    Ok(())
}
