/// Detail enrichment for resolved subscription summaries
///
/// For each summary this module fetches, in order:
/// 1. First invoice totals
/// 2. Last invoice totals
/// 3. The first checkout session linked to the subscription
/// 4. The payment intent of the last invoice (only when it has a total)
///
/// Each fetch is isolated: a failure leaves its block null/empty, is recorded
/// as a `DetailFailure`, and the record is still emitted.
use crate::errors::{AppError, ResultExt};
use crate::models::{
    CheckoutSessionDetail, EnrichedRecord, EnrichmentDetails, InvoiceBlock, InvoiceDetail,
    PaymentIntentDetail, SubscriptionSummary,
};
use crate::stripe_client::BillingApi;
use std::fmt;

/// Which block of an enriched record failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    FirstInvoice,
    LastInvoice,
    CheckoutSession,
    PaymentIntent,
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetailKind::FirstInvoice => "first invoice",
            DetailKind::LastInvoice => "last invoice",
            DetailKind::CheckoutSession => "checkout session",
            DetailKind::PaymentIntent => "payment intent",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFailure {
    pub subscription_id: String,
    pub detail: DetailKind,
    pub reason: String,
}

/// Output of the enrichment stage.
#[derive(Debug, Default)]
pub struct Enrichment {
    pub records: Vec<EnrichedRecord>,
    pub failures: Vec<DetailFailure>,
}

pub struct DetailEnricher<'a> {
    api: &'a dyn BillingApi,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(api: &'a dyn BillingApi) -> Self {
        Self { api }
    }

    /// Enriches every summary in order, one record per summary.
    pub async fn enrich_all(&self, summaries: &[SubscriptionSummary]) -> Enrichment {
        let mut enrichment = Enrichment::default();
        let total = summaries.len();

        for (idx, summary) in summaries.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Enriching subscription {}",
                idx + 1,
                total,
                summary.subscription_id
            );
            let (record, failures) = self.enrich(summary).await;
            enrichment.records.push(record);
            enrichment.failures.extend(failures);
        }

        enrichment
    }

    /// Enriches a single summary. Never fails; failed blocks are reported.
    pub async fn enrich(&self, summary: &SubscriptionSummary) -> (EnrichedRecord, Vec<DetailFailure>) {
        let mut failures = Vec::new();
        let mut record_failure = |detail: DetailKind, err: AppError| {
            tracing::error!(
                "Error fetching {} for subscription {}: {}",
                detail,
                summary.subscription_id,
                err
            );
            failures.push(DetailFailure {
                subscription_id: summary.subscription_id.clone(),
                detail,
                reason: err.to_string(),
            });
        };

        let first_invoice = self
            .invoice_detail(&summary.first_invoice_id)
            .await
            .unwrap_or_else(|e| {
                record_failure(DetailKind::FirstInvoice, e);
                InvoiceDetail::unavailable()
            });

        let last_invoice = self
            .invoice_detail(&summary.last_invoice_id)
            .await
            .unwrap_or_else(|e| {
                record_failure(DetailKind::LastInvoice, e);
                InvoiceDetail::unavailable()
            });

        let checkout_session = self
            .checkout_session(&summary.subscription_id)
            .await
            .unwrap_or_else(|e| {
                record_failure(DetailKind::CheckoutSession, e);
                CheckoutSessionDetail::default()
            });

        let payment_intent = if last_invoice.total_amount.is_some() {
            self.payment_intent_for_invoice(&summary.last_invoice_id)
                .await
                .unwrap_or_else(|e| {
                    record_failure(DetailKind::PaymentIntent, e);
                    PaymentIntentDetail::default()
                })
        } else {
            tracing::debug!(
                "Last invoice {} has no total; skipping payment intent",
                summary.last_invoice_id
            );
            PaymentIntentDetail::default()
        };

        tracing::debug!(
            subscription_id = %summary.subscription_id,
            first_total = ?first_invoice.total_amount,
            last_total = ?last_invoice.total_amount,
            checkout_session = ?checkout_session.id,
            payment_intent_created = ?payment_intent.created,
            "Enriched subscription"
        );

        let record = EnrichedRecord {
            summary: summary.clone(),
            details: EnrichmentDetails {
                first_invoice: InvoiceBlock::new(&summary.first_invoice_id, first_invoice),
                last_invoice: InvoiceBlock::new(&summary.last_invoice_id, last_invoice),
                checkout_session,
                payment_intent,
            },
        };
        (record, failures)
    }

    pub async fn invoice_detail(&self, invoice_id: &str) -> Result<InvoiceDetail, AppError> {
        let invoice = self
            .api
            .get_invoice(invoice_id)
            .await
            .with_context(|| format!("Fetching invoice {}", invoice_id))?;
        Ok(InvoiceDetail::from(&invoice))
    }

    /// First checkout session created for the subscription, or an empty block.
    pub async fn checkout_session(
        &self,
        subscription_id: &str,
    ) -> Result<CheckoutSessionDetail, AppError> {
        let sessions = self
            .api
            .list_checkout_sessions(subscription_id, 1)
            .await
            .with_context(|| format!("Listing checkout sessions for {}", subscription_id))?;

        match sessions.data.into_iter().next() {
            Some(session) => Ok(CheckoutSessionDetail::from(session)),
            None => {
                tracing::info!("No checkout session found for subscription {}", subscription_id);
                Ok(CheckoutSessionDetail::default())
            }
        }
    }

    /// Re-reads the invoice to find its payment intent and loads it.
    pub async fn payment_intent_for_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<PaymentIntentDetail, AppError> {
        let invoice = self
            .api
            .get_invoice(invoice_id)
            .await
            .with_context(|| format!("Re-fetching invoice {}", invoice_id))?;

        let Some(reference) = invoice.payment_intent else {
            tracing::debug!("Invoice {} has no payment intent", invoice_id);
            return Ok(PaymentIntentDetail::default());
        };

        let intent = self
            .api
            .get_payment_intent(reference.id())
            .await
            .with_context(|| format!("Fetching payment intent {}", reference.id()))?;
        Ok(PaymentIntentDetail::from(intent))
    }
}
