//! Subscription listing and first/last invoice resolution.
//!
//! For every listed subscription the customer's invoices are fetched and
//! sorted by creation time; the oldest and newest become the summary's
//! first/last invoice. Any failure drops that one subscription and is
//! recorded for the batch-end report.

use crate::errors::{AppError, ResultExt};
use crate::models::{Invoice, Subscription, SubscriptionSummary};
use crate::stripe_client::BillingApi;
use moka::future::Cache;
use std::fmt;

/// Invoices fetched per customer. Stripe's maximum page size.
pub const INVOICE_PAGE_LIMIT: u8 = 100;

/// Why a subscription produced no summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The customer has no invoices yet.
    NoInvoices,
    /// Listing invoices or loading the customer failed.
    FetchFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoInvoices => write!(f, "no invoices"),
            SkipReason::FetchFailed(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSubscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub reason: SkipReason,
}

/// Output of the resolver stage.
#[derive(Debug, Default)]
pub struct Resolution {
    pub summaries: Vec<SubscriptionSummary>,
    pub skipped: Vec<SkippedSubscription>,
}

/// Fetches one page of subscriptions with the given status.
///
/// Only the first page is read; `has_more` is logged and otherwise ignored.
pub async fn list_subscriptions(
    api: &dyn BillingApi,
    status: &str,
    page_size: u8,
) -> Result<Vec<Subscription>, AppError> {
    let page = api
        .list_subscriptions(status, page_size)
        .await
        .with_context(|| format!("Listing {} subscriptions", status))?;

    if page.has_more {
        tracing::warn!(
            "More than {} {} subscriptions exist; only the first page is processed",
            page_size,
            status
        );
    }

    tracing::info!("Fetched {} {} subscriptions", page.data.len(), status);
    Ok(page.data)
}

/// Oldest and newest invoice by `created`, stable for equal timestamps.
///
/// Returns `None` for an empty list. With a single invoice both ends are the
/// same invoice.
pub fn first_and_last(mut invoices: Vec<Invoice>) -> Option<(Invoice, Invoice)> {
    invoices.sort_by_key(|invoice| invoice.created);
    let first = invoices.first()?.clone();
    let last = invoices.last()?.clone();
    Some((first, last))
}

/// Resolves first/last invoices and customer emails for each subscription.
pub struct InvoicePairResolver<'a> {
    api: &'a dyn BillingApi,
    emails: Cache<String, Option<String>>,
}

impl<'a> InvoicePairResolver<'a> {
    pub fn new(api: &'a dyn BillingApi) -> Self {
        Self {
            api,
            emails: Cache::builder().max_capacity(10_000).build(),
        }
    }

    /// Resolves every subscription in order. Never fails as a whole.
    pub async fn resolve_all(&self, subscriptions: &[Subscription]) -> Resolution {
        let mut resolution = Resolution::default();

        for subscription in subscriptions {
            let customer_id = subscription.customer.id();
            tracing::info!(
                subscription_id = %subscription.id,
                customer_id,
                "Fetching invoices"
            );

            match self.resolve(subscription).await {
                Ok(Some(summary)) => {
                    tracing::info!(
                        "Customer {}: first invoice {}, last invoice {}, email {}",
                        summary.customer_id,
                        summary.first_invoice_id,
                        summary.last_invoice_id,
                        summary.customer_email.as_deref().unwrap_or("<none>")
                    );
                    resolution.summaries.push(summary);
                }
                Ok(None) => {
                    tracing::info!("No invoices found for customer {}", customer_id);
                    resolution.skipped.push(SkippedSubscription {
                        subscription_id: subscription.id.clone(),
                        customer_id: customer_id.to_string(),
                        reason: SkipReason::NoInvoices,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        "Error fetching invoices for customer {} (subscription {}): {}",
                        customer_id,
                        subscription.id,
                        e
                    );
                    resolution.skipped.push(SkippedSubscription {
                        subscription_id: subscription.id.clone(),
                        customer_id: customer_id.to_string(),
                        reason: SkipReason::FetchFailed(e.to_string()),
                    });
                }
            }
        }

        resolution
    }

    /// Builds the summary for a single subscription.
    ///
    /// `Ok(None)` means the customer has no invoices.
    pub async fn resolve(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<SubscriptionSummary>, AppError> {
        let customer_id = subscription.customer.id();

        let invoices = self
            .api
            .list_invoices(customer_id, INVOICE_PAGE_LIMIT)
            .await
            .with_context(|| format!("Listing invoices for customer {}", customer_id))?;

        let Some((first, last)) = first_and_last(invoices.data) else {
            return Ok(None);
        };

        let customer_email = self.customer_email(customer_id).await?;

        Ok(Some(SubscriptionSummary {
            subscription_id: subscription.id.clone(),
            customer_id: customer_id.to_string(),
            customer_email,
            first_invoice_id: first.id,
            last_invoice_id: last.id,
        }))
    }

    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, AppError> {
        if let Some(cached) = self.emails.get(customer_id).await {
            tracing::debug!("Customer {} email served from cache", customer_id);
            return Ok(cached);
        }

        let customer = self
            .api
            .get_customer(customer_id)
            .await
            .with_context(|| format!("Loading customer {}", customer_id))?;

        if customer.deleted {
            tracing::warn!("Customer {} is deleted; email unavailable", customer_id);
        }

        self.emails
            .insert(customer_id.to_string(), customer.email.clone())
            .await;
        Ok(customer.email)
    }
}
