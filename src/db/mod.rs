//! Thin statement-builder and repository layer over `tokio-postgres`.

pub mod repo;
pub mod statement;

pub use self::repo::*;
pub use self::statement::*;

use bb8_postgres::PostgresConnectionManager;
use failure::Error as FailureError;
use tokio_postgres::NoTls;

use crate::types::DbPool;

pub async fn create_pool(dsn: &str, max_size: u32) -> Result<DbPool, FailureError> {
    let manager = PostgresConnectionManager::new_from_stringlike(dsn, NoTls)?;
    let pool = bb8::Pool::builder().max_size(max_size).build(manager).await?;
    Ok(pool)
}
