use std::env;
use std::net::IpAddr;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

use crate::sentry_integration::SentryConfig;

enum Env {
    Development,
    Test,
    Production,
}

impl Env {
    fn new() -> Self {
        match env::var("RUN_MODE") {
            Ok(ref s) if s == "test" => Env::Test,
            Ok(ref s) if s == "production" => Env::Production,
            _ => Env::Development,
        }
    }

    fn to_string(&self) -> &'static str {
        match self {
            Env::Development => "development",
            Env::Production => "production",
            Env::Test => "test",
        }
    }
}

/// Conventional variables that override a config key when present.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("DATABASE_URL", "db.dsn"),
    ("STRIPE_SECRET_KEY", "payment.secret_key"),
    ("STRIPE_PUBLISHABLE_KEY", "payment.publishable_key"),
    ("SENDGRID_API_KEY", "email.api_key"),
    ("GOOGLE_MAPS_API_KEY", "places.api_key"),
];

/// Service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listen {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub dsn: String,
    pub pool_size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Auth {
    pub session_ttl_hours: i64,
    pub max_login_attempts: i32,
    pub lock_minutes: i64,
    pub bcrypt_cost: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pricing {
    pub vat_rate: f64,
    /// Depot from which transport distances are measured.
    pub depot_latitude: f64,
    pub depot_longitude: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub api_url: String,
    pub secret_key: String,
    pub publishable_key: String,
    pub currency: String,
    pub return_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Email {
    pub api_url: String,
    /// Empty key disables delivery; mails are logged and recorded as skipped.
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub site_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Places {
    pub api_url: String,
    pub api_key: String,
    pub country: String,
    pub language: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Marketing {
    pub interval_s: u64,
    pub abandoned_after_hours: i64,
    pub inactivity_days: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address
    pub listen: Listen,
    /// Database settings
    pub db: Database,
    pub auth: Auth,
    pub pricing: Pricing,
    pub payment: Payment,
    pub email: Email,
    pub places: Places,
    /// Outbound http client settings
    pub client: Client,
    /// Marketing notifications loader, disabled when absent
    pub marketing: Option<Marketing>,
    pub sentry: Option<SentryConfig>,
}

impl Config {
    /// Creates config from base.toml, which are overwritten by <env>.toml, where
    /// env is one of development, test, production. After that it could be overwritten
    /// by env variables like BENNES_LISTEN__PORT, and finally by the conventional
    /// variables such as DATABASE_URL.
    pub fn new() -> Result<Self, ConfigError> {
        let env = Env::new();
        let mut builder = RawConfig::builder()
            .add_source(File::with_name("config/base"))
            // Optional file specific for environment
            .add_source(File::with_name(&format!("config/{}", env.to_string())).required(false))
            // Add in settings from the environment (with a prefix of BENNES)
            .add_source(Environment::with_prefix("BENNES").separator("__"));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }
}
