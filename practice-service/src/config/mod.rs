use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::env;

#[derive(Clone, Debug)]
pub struct PracticeConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub whatsapp: WhatsAppConfig,
    pub razorpay: RazorpayConfig,
    pub stripe: StripeConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_secs: u64,
    /// Hour of day (UTC) after which the daily sweeps run.
    pub daily_hour: u32,
    /// Hour of day (UTC) after which recurring invoices are generated.
    pub generation_hour: u32,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub api_base: String,
    pub api_token: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub api_base: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl PracticeConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let port = env_or("PRACTICE_SERVICE_PORT", "3010").parse()?;

        let database_url =
            env::var("PRACTICE_DATABASE_URL").expect("PRACTICE_DATABASE_URL must be set");

        Ok(Self {
            common: CoreConfig { port },
            service_name: "practice-service".to_string(),
            log_level: env_or("PRACTICE_LOG_LEVEL", "info"),
            otlp_endpoint: env::var("PRACTICE_OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or("PRACTICE_DB_MAX_CONNECTIONS", "10").parse()?,
                min_connections: env_or("PRACTICE_DB_MIN_CONNECTIONS", "1").parse()?,
            },
            scheduler: SchedulerConfig {
                enabled: env_or("PRACTICE_SCHEDULER_ENABLED", "true").parse().unwrap_or(true),
                tick_interval_secs: env_or("PRACTICE_SCHEDULER_TICK_SECS", "60").parse()?,
                daily_hour: env_or("PRACTICE_SCHEDULER_DAILY_HOUR", "3").parse()?,
                generation_hour: env_or("PRACTICE_SCHEDULER_GENERATION_HOUR", "9").parse()?,
            },
            whatsapp: WhatsAppConfig {
                enabled: env_or("PRACTICE_WHATSAPP_ENABLED", "false")
                    .parse()
                    .unwrap_or(false),
                api_base: env_or("PRACTICE_WHATSAPP_API_BASE", "http://localhost:8088"),
                api_token: Secret::new(env_or("PRACTICE_WHATSAPP_API_TOKEN", "")),
            },
            razorpay: RazorpayConfig {
                api_base: env_or("PRACTICE_RAZORPAY_API_BASE", "https://api.razorpay.com"),
                key_id: env_or("PRACTICE_RAZORPAY_KEY_ID", ""),
                key_secret: Secret::new(env_or("PRACTICE_RAZORPAY_KEY_SECRET", "")),
                webhook_secret: Secret::new(env_or("PRACTICE_RAZORPAY_WEBHOOK_SECRET", "")),
            },
            stripe: StripeConfig {
                api_base: env_or("PRACTICE_STRIPE_API_BASE", "https://api.stripe.com"),
                secret_key: Secret::new(env_or("PRACTICE_STRIPE_SECRET_KEY", "")),
                webhook_secret: Secret::new(env_or("PRACTICE_STRIPE_WEBHOOK_SECRET", "")),
            },
        })
    }
}
