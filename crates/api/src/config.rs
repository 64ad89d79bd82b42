//! Application configuration loaded from environment variables.

use domain::{Money, PricingTable};

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — Postgres ledger; absent means in-memory
/// - `WEBSITE_URL`, `COMPANY` — redirect base and brand name
/// - `MONTH_PLAN_ID` / `MONTH_COST_CENTS`, `YEAR_PLAN_ID` /
///   `YEAR_COST_CENTS` — the two paid plans
/// - provider credentials: `STRIPE_SECRET_KEY`, `PAYPAL_CLIENT_ID` +
///   `PAYPAL_SECRET_KEY`, `RAZORPAY_KEY_ID` + `RAZORPAY_KEY_SECRET`,
///   `PAYSTACK_SECRET_KEY`, `FLUTTERWAVE_SECRET_KEY`. Only providers
///   with credentials get an adapter registered.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub website_url: String,
    pub company: String,

    pub month_plan_id: String,
    pub month_cost_cents: i64,
    pub year_plan_id: String,
    pub year_cost_cents: i64,

    pub stripe_secret_key: Option<String>,
    pub paypal_client_id: Option<String>,
    pub paypal_secret_key: Option<String>,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub paystack_secret_key: Option<String>,
    pub flutterwave_secret_key: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_opt("HOST").unwrap_or(defaults.host),
            port: env_opt("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: env_opt("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: env_opt("DATABASE_URL"),
            website_url: env_opt("WEBSITE_URL").unwrap_or(defaults.website_url),
            company: env_opt("COMPANY").unwrap_or(defaults.company),
            month_plan_id: env_opt("MONTH_PLAN_ID").unwrap_or(defaults.month_plan_id),
            month_cost_cents: env_opt("MONTH_COST_CENTS")
                .and_then(|c| c.parse().ok())
                .unwrap_or(defaults.month_cost_cents),
            year_plan_id: env_opt("YEAR_PLAN_ID").unwrap_or(defaults.year_plan_id),
            year_cost_cents: env_opt("YEAR_COST_CENTS")
                .and_then(|c| c.parse().ok())
                .unwrap_or(defaults.year_cost_cents),
            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            paypal_client_id: env_opt("PAYPAL_CLIENT_ID"),
            paypal_secret_key: env_opt("PAYPAL_SECRET_KEY"),
            razorpay_key_id: env_opt("RAZORPAY_KEY_ID"),
            razorpay_key_secret: env_opt("RAZORPAY_KEY_SECRET"),
            paystack_secret_key: env_opt("PAYSTACK_SECRET_KEY"),
            flutterwave_secret_key: env_opt("FLUTTERWAVE_SECRET_KEY"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the pricing table from the configured plans.
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::new(
            self.month_plan_id.as_str(),
            Money::from_cents(self.month_cost_cents),
            self.year_plan_id.as_str(),
            Money::from_cents(self.year_cost_cents),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            website_url: "http://localhost:5173".to_string(),
            company: "Acme Learning".to_string(),
            month_plan_id: "monthly".to_string(),
            month_cost_cents: 500,
            year_plan_id: "yearly".to_string(),
            year_cost_cents: 4900,
            stripe_secret_key: None,
            paypal_client_id: None,
            paypal_secret_key: None,
            razorpay_key_id: None,
            razorpay_key_secret: None,
            paystack_secret_key: None,
            flutterwave_secret_key: None,
        }
    }
}
