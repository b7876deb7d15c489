//! In-memory `BillingApi` used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use stripe_invoice_enrichment::errors::AppError;
use stripe_invoice_enrichment::models::{
    CheckoutSession, Customer, Invoice, List, ObjectRef, PaymentIntent, Subscription,
};
use stripe_invoice_enrichment::stripe_client::BillingApi;

fn not_found(kind: &str, id: &str) -> AppError {
    AppError::Stripe {
        status: 404,
        kind: Some("invalid_request_error".to_string()),
        message: format!("No such {}: '{}'", kind, id),
    }
}

fn unavailable(what: &str) -> AppError {
    AppError::ExternalApiError(format!("simulated outage for {}", what))
}

pub fn subscription(id: &str, customer: &str) -> Subscription {
    Subscription {
        id: id.to_string(),
        customer: ObjectRef::from(customer),
        status: Some("active".to_string()),
        created: 0,
    }
}

pub fn invoice(id: &str, customer: &str, created: i64, total: Option<i64>) -> Invoice {
    Invoice {
        id: id.to_string(),
        created,
        customer: Some(ObjectRef::from(customer)),
        subtotal: total,
        total,
        total_discount_amounts: Some(Vec::new()),
        payment_intent: None,
    }
}

#[derive(Default)]
pub struct FakeBillingApi {
    pub subscriptions: Vec<Subscription>,
    pub invoices: HashMap<String, Vec<Invoice>>,
    pub customers: HashMap<String, Customer>,
    pub sessions: HashMap<String, Vec<CheckoutSession>>,
    pub payment_intents: HashMap<String, PaymentIntent>,
    pub failing_ids: HashSet<String>,
    pub fail_subscription_listing: bool,
    pub customer_lookups: AtomicUsize,
    /// Invoice id -> 1-based `get_invoice` call that fails.
    pub failing_invoice_calls: HashMap<String, usize>,
    pub invoice_fetches: Mutex<HashMap<String, usize>>,
}

impl FakeBillingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription, its customer (with email) and the customer's invoices.
    pub fn with_subscription(
        mut self,
        subscription_id: &str,
        customer_id: &str,
        invoices: Vec<Invoice>,
    ) -> Self {
        self.subscriptions.push(subscription(subscription_id, customer_id));
        self.customers.insert(
            customer_id.to_string(),
            Customer {
                id: customer_id.to_string(),
                email: Some(format!("{}@example.com", customer_id)),
                deleted: false,
            },
        );
        self.invoices
            .entry(customer_id.to_string())
            .or_default()
            .extend(invoices);
        self
    }

    pub fn with_checkout_session(mut self, subscription_id: &str, session_id: &str, status: &str) -> Self {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": session_id,
            "object": "checkout.session",
            "status": status,
            "subscription": subscription_id,
        }))
        .expect("valid session");
        self.sessions
            .entry(subscription_id.to_string())
            .or_default()
            .push(session);
        self
    }

    /// Links `invoice_id` to a new payment intent created at `created`.
    pub fn with_payment_intent(mut self, invoice_id: &str, intent_id: &str, created: i64) -> Self {
        for invoices in self.invoices.values_mut() {
            for invoice in invoices.iter_mut().filter(|i| i.id == invoice_id) {
                invoice.payment_intent = Some(ObjectRef::from(intent_id));
            }
        }
        let intent: PaymentIntent = serde_json::from_value(json!({
            "id": intent_id,
            "object": "payment_intent",
            "created": created,
            "status": "succeeded",
        }))
        .expect("valid payment intent");
        self.payment_intents.insert(intent_id.to_string(), intent);
        self
    }

    /// Any call addressing `id` (customer, invoice, subscription or intent) fails.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    /// Only the `nth` `get_invoice` call for `invoice_id` fails; others succeed.
    pub fn failing_invoice_call(mut self, invoice_id: &str, nth: usize) -> Self {
        self.failing_invoice_calls.insert(invoice_id.to_string(), nth);
        self
    }

    pub fn invoice_fetch_count(&self, invoice_id: &str) -> usize {
        self.invoice_fetches
            .lock()
            .unwrap()
            .get(invoice_id)
            .copied()
            .unwrap_or(0)
    }

    fn check(&self, id: &str) -> Result<(), AppError> {
        if self.failing_ids.contains(id) {
            Err(unavailable(id))
        } else {
            Ok(())
        }
    }

    fn find_invoice(&self, invoice_id: &str) -> Option<&Invoice> {
        self.invoices.values().flatten().find(|i| i.id == invoice_id)
    }
}

#[async_trait]
impl BillingApi for FakeBillingApi {
    async fn list_subscriptions(&self, _status: &str, limit: u8) -> Result<List<Subscription>, AppError> {
        if self.fail_subscription_listing {
            return Err(unavailable("subscriptions"));
        }
        let data: Vec<Subscription> = self
            .subscriptions
            .iter()
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(List {
            has_more: self.subscriptions.len() > data.len(),
            data,
        })
    }

    async fn list_invoices(&self, customer_id: &str, limit: u8) -> Result<List<Invoice>, AppError> {
        self.check(customer_id)?;
        let mut data = self.invoices.get(customer_id).cloned().unwrap_or_default();
        // Stripe lists newest first.
        data.sort_by_key(|i| std::cmp::Reverse(i.created));
        data.truncate(limit as usize);
        Ok(List::new(data))
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, AppError> {
        self.customer_lookups.fetch_add(1, Ordering::SeqCst);
        self.customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| not_found("customer", customer_id))
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, AppError> {
        self.check(invoice_id)?;
        let call = {
            let mut fetches = self.invoice_fetches.lock().unwrap();
            let count = fetches.entry(invoice_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if self.failing_invoice_calls.get(invoice_id) == Some(&call) {
            return Err(unavailable(invoice_id));
        }
        self.find_invoice(invoice_id)
            .cloned()
            .ok_or_else(|| not_found("invoice", invoice_id))
    }

    async fn list_checkout_sessions(
        &self,
        subscription_id: &str,
        limit: u8,
    ) -> Result<List<CheckoutSession>, AppError> {
        self.check(subscription_id)?;
        let mut data = self.sessions.get(subscription_id).cloned().unwrap_or_default();
        data.truncate(limit as usize);
        Ok(List::new(data))
    }

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, AppError> {
        self.check(payment_intent_id)?;
        self.payment_intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| not_found("payment_intent", payment_intent_id))
    }
}
