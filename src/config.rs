use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Stripe secret key (sk_...) used for transfer creation.
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret (whsec_...).
    pub stripe_webhook_secret: String,
    /// Webhook URL for terminal payout failure notifications (optional).
    pub notify_webhook_url: Option<String>,
    /// Per-transfer timeout budget. A transfer exceeding this is recorded
    /// as failed, never left processing indefinitely.
    pub transfer_timeout: Duration,
    /// Age after which a `processing` payout is considered stale and
    /// re-marked failed by the reconciliation task.
    pub payout_stale_after: Duration,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SPLITFACT_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let transfer_timeout_secs: u64 = env::var("TRANSFER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let payout_stale_after_secs: u64 = env::var("PAYOUT_STALE_AFTER_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15 * 60);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "splitfact.db".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            transfer_timeout: Duration::from_secs(transfer_timeout_secs),
            payout_stale_after: Duration::from_secs(payout_stale_after_secs),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
