use std::fmt;
use std::path::PathBuf;

/// Largest page Stripe accepts on list endpoints.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Format of the enriched output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn default_path(self) -> &'static str {
        match self {
            OutputFormat::Json => "invoices_updated.json",
            OutputFormat::Csv => "invoices_updated.csv",
        }
    }
}

/// Shape of JSON output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonLayout {
    /// Detail blocks live under `event.secondColumn`.
    Nested,
    /// Detail blocks sit next to the summary fields.
    Flat,
}

#[derive(Clone)]
pub struct Config {
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub subscription_status: String,
    pub subscription_page_size: u8,
    pub request_timeout_secs: u64,
    pub snapshot_path: PathBuf,
    pub output_format: OutputFormat,
    pub output_path: PathBuf,
    pub json_layout: JsonLayout,
}

// Keeps the secret key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("stripe_secret_key", &"[REDACTED]")
            .field("stripe_api_base", &self.stripe_api_base)
            .field("subscription_status", &self.subscription_status)
            .field("subscription_page_size", &self.subscription_page_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("snapshot_path", &self.snapshot_path)
            .field("output_format", &self.output_format)
            .field("output_path", &self.output_path)
            .field("json_layout", &self.json_layout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let stripe_secret_key = lookup("STRIPE_SECRET_KEY")
            .ok_or_else(|| anyhow::anyhow!("STRIPE_SECRET_KEY environment variable required"))
            .and_then(|key| {
                if key.trim().is_empty() {
                    anyhow::bail!("STRIPE_SECRET_KEY cannot be empty");
                }
                if !key.starts_with("sk_") && !key.starts_with("rk_") {
                    anyhow::bail!("STRIPE_SECRET_KEY must be a secret (sk_) or restricted (rk_) key");
                }
                Ok(key)
            })?;

        let stripe_api_base = var("STRIPE_API_BASE")
            .unwrap_or_else(|| "https://api.stripe.com".to_string())
            .trim_end_matches('/')
            .to_string();
        if !stripe_api_base.starts_with("http://") && !stripe_api_base.starts_with("https://") {
            anyhow::bail!("STRIPE_API_BASE must start with http:// or https://");
        }

        let subscription_status = var("SUBSCRIPTION_STATUS").unwrap_or_else(|| "active".to_string());

        let subscription_page_size = var("SUBSCRIPTION_PAGE_SIZE")
            .unwrap_or_else(|| MAX_PAGE_SIZE.to_string())
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
            .ok_or_else(|| {
                anyhow::anyhow!("SUBSCRIPTION_PAGE_SIZE must be a number between 1-{}", MAX_PAGE_SIZE)
            })?;

        let request_timeout_secs = var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| anyhow::anyhow!("REQUEST_TIMEOUT_SECS must be a positive number"))?;

        let snapshot_path =
            PathBuf::from(var("SNAPSHOT_PATH").unwrap_or_else(|| "invoices.json".to_string()));

        let output_format = match var("OUTPUT_FORMAT").map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("json") => OutputFormat::Json,
            Some("csv") => OutputFormat::Csv,
            Some(other) => anyhow::bail!("OUTPUT_FORMAT must be json or csv, got '{}'", other),
        };

        let output_path = PathBuf::from(
            var("OUTPUT_PATH").unwrap_or_else(|| output_format.default_path().to_string()),
        );

        let json_layout = match var("JSON_LAYOUT").map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("nested") => JsonLayout::Nested,
            Some("flat") => JsonLayout::Flat,
            Some(other) => anyhow::bail!("JSON_LAYOUT must be nested or flat, got '{}'", other),
        };

        let config = Self {
            stripe_secret_key,
            stripe_api_base,
            subscription_status,
            subscription_page_size,
            request_timeout_secs,
            snapshot_path,
            output_format,
            output_path,
            json_layout,
        };

        tracing::debug!("Stripe API base: {}", config.stripe_api_base);
        tracing::debug!(
            "Subscriptions: status={} page_size={}",
            config.subscription_status,
            config.subscription_page_size
        );
        tracing::debug!(
            "Snapshot: {} -> output: {} ({:?})",
            config.snapshot_path.display(),
            config.output_path.display(),
            config.output_format
        );

        Ok(config)
    }
}
