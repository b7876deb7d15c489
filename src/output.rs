use crate::config::{JsonLayout, OutputFormat};
use crate::errors::{AppError, ResultExt};
use crate::models::{EnrichedRecord, EnrichmentDetails, SubscriptionSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Column headers of the CSV output, in order.
pub const CSV_HEADERS: [&str; 16] = [
    "Subscription ID",
    "Customer ID",
    "Customer Email",
    "First Invoice ID",
    "Last Invoice ID",
    "First Invoice Subtotal",
    "First Invoice Total",
    "First Invoice Discounts",
    "Last Invoice Subtotal",
    "Last Invoice Total",
    "Last Invoice Discounts",
    "Checkout Session Status",
    "Checkout Session ID",
    "Checkout Session Json",
    "Payment Intent Created",
    "Payment Intent Json",
];

// ============ JSON ============

#[derive(Serialize)]
struct NestedRecord<'a> {
    #[serde(flatten)]
    summary: &'a SubscriptionSummary,
    event: EventBlock<'a>,
}

#[derive(Serialize)]
struct EventBlock<'a> {
    #[serde(rename = "secondColumn")]
    second_column: &'a EnrichmentDetails,
}

#[derive(Serialize)]
struct FlatRecord<'a> {
    #[serde(flatten)]
    summary: &'a SubscriptionSummary,
    #[serde(flatten)]
    details: &'a EnrichmentDetails,
}

/// Renders records as a pretty-printed JSON array.
pub fn render_json(records: &[EnrichedRecord], layout: JsonLayout) -> Result<String, AppError> {
    let rendered = match layout {
        JsonLayout::Nested => serde_json::to_string_pretty(
            &records
                .iter()
                .map(|r| NestedRecord {
                    summary: &r.summary,
                    event: EventBlock {
                        second_column: &r.details,
                    },
                })
                .collect::<Vec<_>>(),
        ),
        JsonLayout::Flat => serde_json::to_string_pretty(
            &records
                .iter()
                .map(|r| FlatRecord {
                    summary: &r.summary,
                    details: &r.details,
                })
                .collect::<Vec<_>>(),
        ),
    };
    rendered.context("Serializing enriched records")
}

// ============ CSV ============

/// One flat CSV row. Field order matches `CSV_HEADERS`.
#[derive(Debug, Serialize)]
pub struct CsvRow {
    #[serde(rename = "Subscription ID")]
    pub subscription_id: String,
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Customer Email")]
    pub customer_email: Option<String>,
    #[serde(rename = "First Invoice ID")]
    pub first_invoice_id: String,
    #[serde(rename = "Last Invoice ID")]
    pub last_invoice_id: String,
    #[serde(rename = "First Invoice Subtotal")]
    pub first_invoice_subtotal: Option<i64>,
    #[serde(rename = "First Invoice Total")]
    pub first_invoice_total: Option<i64>,
    #[serde(rename = "First Invoice Discounts")]
    pub first_invoice_discounts: String,
    #[serde(rename = "Last Invoice Subtotal")]
    pub last_invoice_subtotal: Option<i64>,
    #[serde(rename = "Last Invoice Total")]
    pub last_invoice_total: Option<i64>,
    #[serde(rename = "Last Invoice Discounts")]
    pub last_invoice_discounts: String,
    #[serde(rename = "Checkout Session Status")]
    pub checkout_session_status: Option<String>,
    #[serde(rename = "Checkout Session ID")]
    pub checkout_session_id: Option<String>,
    #[serde(rename = "Checkout Session Json")]
    pub checkout_session_json: Option<String>,
    #[serde(rename = "Payment Intent Created")]
    pub payment_intent_created: Option<String>,
    #[serde(rename = "Payment Intent Json")]
    pub payment_intent_json: Option<String>,
}

/// Unix seconds as RFC 3339 UTC; `None` for out-of-range values.
fn format_timestamp(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339())
}

impl TryFrom<&EnrichedRecord> for CsvRow {
    type Error = AppError;

    fn try_from(record: &EnrichedRecord) -> Result<Self, Self::Error> {
        let summary = &record.summary;
        let details = &record.details;

        Ok(Self {
            subscription_id: summary.subscription_id.clone(),
            customer_id: summary.customer_id.clone(),
            customer_email: summary.customer_email.clone(),
            first_invoice_id: summary.first_invoice_id.clone(),
            last_invoice_id: summary.last_invoice_id.clone(),
            first_invoice_subtotal: details.first_invoice.subtotal,
            first_invoice_total: details.first_invoice.total,
            first_invoice_discounts: serde_json::to_string(
                &details.first_invoice.total_discount_amounts,
            )?,
            last_invoice_subtotal: details.last_invoice.subtotal,
            last_invoice_total: details.last_invoice.total,
            last_invoice_discounts: serde_json::to_string(
                &details.last_invoice.total_discount_amounts,
            )?,
            checkout_session_status: details.checkout_session.status.clone(),
            checkout_session_id: details.checkout_session.id.clone(),
            checkout_session_json: details
                .checkout_session
                .complete_json
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            payment_intent_created: details.payment_intent.created.and_then(format_timestamp),
            payment_intent_json: details
                .payment_intent
                .complete_json
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }
}

/// Renders records as CSV with a header row, even when there are no records.
pub fn render_csv(records: &[EnrichedRecord]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for record in records {
        writer.serialize(CsvRow::try_from(record)?)?;
    }
    writer.flush()?;

    writer
        .into_inner()
        .map_err(|e| AppError::IoError(e.into_error()))
}

/// Writes the final output in the requested format.
pub async fn write_output(
    path: &Path,
    records: &[EnrichedRecord],
    format: OutputFormat,
    layout: JsonLayout,
) -> Result<(), AppError> {
    let bytes = match format {
        OutputFormat::Json => render_json(records, layout)?.into_bytes(),
        OutputFormat::Csv => render_csv(records)?,
    };

    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Writing output {}", path.display()))?;

    tracing::info!(
        "Saved {} enriched records to {} ({:?})",
        records.len(),
        path.display(),
        format
    );
    Ok(())
}
