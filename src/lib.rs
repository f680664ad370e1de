#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

extern crate config as config_crate;

pub mod acl;
pub mod clients;
pub mod config;
pub mod controller;
pub mod db;
pub mod errors;
pub mod export;
pub mod http;
pub mod loaders;
pub mod migrations;
pub mod models;
pub mod pricing;
pub mod repos;
pub mod router;
pub mod sentry_integration;
pub mod services;
pub mod types;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bb8_postgres::PostgresConnectionManager;
use failure::Error as FailureError;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use tokio_postgres::NoTls;

use crate::clients::{GooglePlacesClient, SendGridEmailClient, StripePaymentClient};
use crate::config::Config;
use crate::controller::ControllerImpl;
use crate::http::client::HttpClient;
use crate::http::controller::Application;
use crate::services::ServiceContext;
use crate::types::DbPool;

pub async fn create_db_pool(config: &Config) -> Result<DbPool, FailureError> {
    let manager = PostgresConnectionManager::new_from_stringlike(config.db.dsn.as_str(), NoTls)?;
    let db_pool = bb8::Pool::builder()
        .max_size(config.db.pool_size)
        .min_idle(Some(1))
        .build(manager)
        .await?;
    Ok(db_pool)
}

/// Pool plus the provider clients, shared by the server and the loaders.
pub async fn create_context(config: Config) -> Result<ServiceContext, FailureError> {
    let db_pool = create_db_pool(&config).await?;
    let http = HttpClient::new(&config.client);

    Ok(ServiceContext {
        db_pool,
        payment: Arc::new(StripePaymentClient::new(http.clone(), config.payment.clone())),
        email: Arc::new(SendGridEmailClient::new(http.clone(), config.email.clone())),
        places: Arc::new(GooglePlacesClient::new(http, config.places.clone())),
        config: Arc::new(config),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

/// Starts new web service from provided `Config`
pub async fn start_server(config: Config) -> Result<(), FailureError> {
    let address = SocketAddr::new(config.listen.host, config.listen.port);
    let ctx = create_context(config).await?;
    migrations::run(&ctx.db_pool).await?;

    let app = Arc::new(Application::new(ControllerImpl::new(ctx)));
    let make_service = make_service_fn(move |_| {
        let app = app.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                let app = app.clone();
                async move { Ok::<_, Infallible>(app.handle(request).await) }
            }))
        }
    });

    let server = Server::try_bind(&address)?.serve(make_service);
    info!("Listening on http://{}", address);
    server.with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

/// Runs the abandoned checkout and inactivity campaigns until interrupted.
pub async fn start_marketing_notifications(config: Config) -> Result<(), FailureError> {
    let ctx = create_context(config).await?;
    let loader = loaders::MarketingNotificationsLoader::new(ctx);
    tokio::select! {
        _ = loader.start() => {}
        _ = shutdown_signal() => {}
    }
    Ok(())
}
