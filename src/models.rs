use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============ Stripe Wire Models ============

/// Stripe list envelope (`{"object": "list", "data": [...], "has_more": ...}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> List<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            has_more: false,
        }
    }
}

/// Reference to another Stripe object.
///
/// Stripe returns either the bare id or, when the field was expanded, the
/// whole object. Only the id is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Id(String),
    Object { id: String },
}

impl ObjectRef {
    pub fn id(&self) -> &str {
        match self {
            ObjectRef::Id(id) => id,
            ObjectRef::Object { id } => id,
        }
    }
}

impl From<&str> for ObjectRef {
    fn from(id: &str) -> Self {
        ObjectRef::Id(id.to_string())
    }
}

/// A recurring billing agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub customer: ObjectRef,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created: i64,
}

/// One entry of an invoice's `total_discount_amounts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountAmount {
    pub amount: i64,
    pub discount: ObjectRef,
}

/// A billed document. Amounts are in the smallest currency unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub created: i64,
    #[serde(default)]
    pub customer: Option<ObjectRef>,
    #[serde(default)]
    pub subtotal: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub total_discount_amounts: Option<Vec<DiscountAmount>>,
    #[serde(default)]
    pub payment_intent: Option<ObjectRef>,
}

/// Customer record. Deleted customers come back as `{"id", "deleted": true}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// A hosted payment-collection flow, kept together with its raw payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct CheckoutSession {
    pub id: String,
    pub status: Option<String>,
    pub raw: Value,
}

impl TryFrom<Value> for CheckoutSession {
    type Error = String;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or("checkout session missing 'id'")?
            .to_string();
        let status = raw.get("status").and_then(Value::as_str).map(String::from);
        Ok(Self { id, status, raw })
    }
}

/// A charge attempt, kept together with its raw payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct PaymentIntent {
    pub id: String,
    pub created: Option<i64>,
    pub raw: Value,
}

impl TryFrom<Value> for PaymentIntent {
    type Error = String;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or("payment intent missing 'id'")?
            .to_string();
        let created = raw.get("created").and_then(Value::as_i64);
        Ok(Self { id, created, raw })
    }
}

/// Stripe error body: `{"error": {"type": ..., "message": ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

// ============ Pipeline Records ============

/// First/last invoice pair for one subscription.
///
/// Written to the snapshot file and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub subscription_id: String,
    pub customer_id: String,
    pub customer_email: Option<String>,
    pub first_invoice_id: String,
    pub last_invoice_id: String,
}

/// Financial totals of one invoice. All-null when the invoice could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    pub subtotal: Option<i64>,
    pub total_discount_amounts: Vec<DiscountAmount>,
    pub total_amount: Option<i64>,
}

impl InvoiceDetail {
    pub fn unavailable() -> Self {
        Self::default()
    }
}

impl From<&Invoice> for InvoiceDetail {
    fn from(invoice: &Invoice) -> Self {
        Self {
            subtotal: invoice.subtotal,
            total_discount_amounts: invoice.total_discount_amounts.clone().unwrap_or_default(),
            total_amount: invoice.total,
        }
    }
}

/// Invoice block as it appears in enriched output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceBlock {
    pub invoice_id: String,
    pub total: Option<i64>,
    pub subtotal: Option<i64>,
    pub total_discount_amounts: Vec<DiscountAmount>,
}

impl InvoiceBlock {
    pub fn new(invoice_id: &str, detail: InvoiceDetail) -> Self {
        Self {
            invoice_id: invoice_id.to_string(),
            total: detail.total_amount,
            subtotal: detail.subtotal,
            total_discount_amounts: detail.total_discount_amounts,
        }
    }
}

/// Checkout session block; serializes to `{}` when no session was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_json: Option<Value>,
}

impl CheckoutSessionDetail {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.complete_json.is_none()
    }
}

impl From<CheckoutSession> for CheckoutSessionDetail {
    fn from(session: CheckoutSession) -> Self {
        Self {
            status: session.status,
            id: Some(session.id),
            complete_json: Some(session.raw),
        }
    }
}

/// Payment intent block; serializes to `{}` when the last invoice has none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_json: Option<Value>,
}

impl PaymentIntentDetail {
    pub fn is_empty(&self) -> bool {
        self.complete_json.is_none()
    }
}

impl From<PaymentIntent> for PaymentIntentDetail {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            created: intent.created,
            complete_json: Some(intent.raw),
        }
    }
}

/// Everything fetched for a summary in the enrichment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentDetails {
    pub first_invoice: InvoiceBlock,
    pub last_invoice: InvoiceBlock,
    pub checkout_session: CheckoutSessionDetail,
    pub payment_intent: PaymentIntentDetail,
}

/// One output record per subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub summary: SubscriptionSummary,
    pub details: EnrichmentDetails,
}
