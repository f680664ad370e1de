use std::fmt::Display;

use sentry::{ClientInitGuard, ClientOptions, Level};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SentryConfig {
    pub dsn: String,
}

/// Sentry reporting stays off when no `[sentry]` section is configured.
pub fn init(sentry_config: Option<&SentryConfig>) -> Option<ClientInitGuard> {
    sentry_config.map(|config| {
        info!("Initializing Sentry integration");
        sentry::init((
            config.dsn.as_str(),
            ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    })
}

pub fn log_and_capture_error<E: Display>(error: &E) {
    error!("{}", error);
    sentry::capture_message(&error.to_string(), Level::Error);
}
