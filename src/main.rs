use stripe_invoice_enrichment::config::Config;
use stripe_invoice_enrichment::pipeline;
use stripe_invoice_enrichment::stripe_client::StripeClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the enrichment run.
///
/// Initializes tracing, loads configuration, then runs the pipeline once:
/// list subscriptions, resolve first/last invoices, checkpoint them to the
/// snapshot file, enrich from the checkpoint and write the final output.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok when the output was written; an error (and a
///   non-zero exit) when configuration, the subscription listing or file I/O
///   failed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stripe_invoice_enrichment=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {:#}", e);
        e
    })?;
    tracing::info!("Configuration loaded successfully");

    let client = StripeClient::from_config(&config).map_err(|e| {
        tracing::error!("Failed to initialize Stripe client: {}", e);
        e
    })?;

    match pipeline::run(&client, &config).await {
        Ok(report) => {
            report.log();
            Ok(())
        }
        Err(failure) => {
            // Failures recorded before the run stopped are still reported.
            failure.report.log();
            tracing::error!("Error processing subscriptions: {}", failure.error);
            Err(failure.error.into())
        }
    }
}
