//! Stripe Invoice Enrichment Library
//!
//! Pulls subscriptions from Stripe, resolves each customer's first and last
//! invoice, checkpoints the result to disk and enriches it with invoice
//! totals, checkout sessions and payment intents before writing JSON or CSV.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `enrichment`: Detail enrichment stage.
//! - `errors`: Error handling types.
//! - `models`: Stripe wire models and pipeline records.
//! - `output`: JSON and CSV writers for enriched records.
//! - `pipeline`: Stage orchestration and the run report.
//! - `resolver`: Subscription listing and first/last invoice resolution.
//! - `snapshot`: Checksummed checkpoint file.
//! - `stripe_client`: Stripe REST client and the `BillingApi` trait.

pub mod config;
pub mod enrichment;
pub mod errors;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod snapshot;
pub mod stripe_client;
