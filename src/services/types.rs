use std::sync::Arc;

use bb8::PooledConnection;
use bb8_postgres::PostgresConnectionManager;
use failure::Error as FailureError;
use futures::future::BoxFuture;
use tokio_postgres::NoTls;
use validator::Validate;

use crate::clients::{EmailClient, PaymentClient, PlacesClient};
use crate::config::Config;
use crate::errors::{Error, RepoError};
use crate::types::DbPool;

pub type ServiceFuture<T> = BoxFuture<'static, Result<T, FailureError>>;

pub type PooledConn<'a> = PooledConnection<'a, PostgresConnectionManager<NoTls>>;

/// Shared by every service instance: the pool, settings and provider clients.
#[derive(Clone)]
pub struct ServiceContext {
    pub db_pool: DbPool,
    pub config: Arc<Config>,
    pub payment: Arc<dyn PaymentClient>,
    pub email: Arc<dyn EmailClient>,
    pub places: Arc<dyn PlacesClient>,
}

impl ServiceContext {
    pub async fn connection(&self) -> Result<PooledConn<'_>, RepoError> {
        self.db_pool.get().await.map_err(RepoError::from)
    }
}

/// Runs the payload's `validator` rules, tagging failures as `Validate`.
pub fn validate<T: Validate>(payload: &T) -> Result<(), FailureError> {
    payload
        .validate()
        .map_err(|e| format_err!("Invalid payload").context(Error::Validate(e)).into())
}
