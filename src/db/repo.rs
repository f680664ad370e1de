use std::convert::TryFrom;
use std::marker::PhantomData;

use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row};

use super::statement::*;
use crate::errors::RepoError;

pub trait Inserter: Send {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder;
}

pub trait Filter: Send {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder;
}

pub trait Updater: Send {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder;
}

/// Placeholder for tables that are append-only.
pub struct NoUpdater;

impl Updater for NoUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        UpdateBuilder::from(FilteredOperationBuilder::new(table))
    }
}

fn as_params(args: &[SqlArg]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|arg| &**arg as &(dyn ToSql + Sync)).collect()
}

fn convert_rows<T>(rows: Vec<Row>) -> Result<Vec<T>, RepoError>
where
    T: TryFrom<Row, Error = RepoError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Table-bound repository. All operations take the connection (or open
/// transaction) they run on, so several repos can share one transaction.
pub struct DbRepoImpl<T, I, F, U> {
    table: &'static str,
    phantom: PhantomData<fn() -> (T, I, F, U)>,
}

impl<T, I, F, U> Clone for DbRepoImpl<T, I, F, U> {
    fn clone(&self) -> Self {
        Self::new(self.table)
    }
}

impl<T, I, F, U> DbRepoImpl<T, I, F, U> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            phantom: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}

impl<T, I, F, U> DbRepoImpl<T, I, F, U>
where
    T: TryFrom<Row, Error = RepoError> + Send,
    I: Inserter,
    F: Filter,
    U: Updater,
{
    pub async fn insert_exactly_one<C>(&self, conn: &C, inserter: I) -> Result<T, RepoError>
    where
        C: GenericClient + Sync,
    {
        let (query, args) = inserter.into_insert_builder(self.table).build();
        debug!("Inserting into {}: {}", self.table, query);
        let row = conn.query_one(query.as_str(), &as_params(&args)).await?;
        T::try_from(row)
    }

    pub async fn select<C>(&self, conn: &C, filter: F) -> Result<Vec<T>, RepoError>
    where
        C: GenericClient + Sync,
    {
        self.select_full(conn, filter, |b| b).await
    }

    /// Select with access to the builder, for ordering and paging.
    pub async fn select_full<C, M>(&self, conn: &C, filter: F, modify: M) -> Result<Vec<T>, RepoError>
    where
        C: GenericClient + Sync,
        M: FnOnce(FilteredOperationBuilder) -> FilteredOperationBuilder + Send,
    {
        let (query, args) = modify(filter.into_filtered_operation_builder(self.table)).build_select();
        let rows = conn.query(query.as_str(), &as_params(&args)).await?;
        convert_rows(rows)
    }

    pub async fn select_one<C>(&self, conn: &C, filter: F) -> Result<Option<T>, RepoError>
    where
        C: GenericClient + Sync,
    {
        let mut out = self.select_full(conn, filter, |b| b.with_limit(Some(1))).await?;
        Ok(out.pop())
    }

    pub async fn select_exactly_one<C>(&self, conn: &C, filter: F) -> Result<T, RepoError>
    where
        C: GenericClient + Sync,
    {
        self.select_one(conn, filter).await?.ok_or(RepoError::NotFound)
    }

    pub async fn count<C>(&self, conn: &C, filter: F) -> Result<i64, RepoError>
    where
        C: GenericClient + Sync,
    {
        let (query, args) = filter.into_filtered_operation_builder(self.table).build_count();
        let row = conn.query_one(query.as_str(), &as_params(&args)).await?;
        Ok(row.try_get(0)?)
    }

    pub async fn update<C>(&self, conn: &C, updater: U) -> Result<Vec<T>, RepoError>
    where
        C: GenericClient + Sync,
    {
        match updater.into_update_builder(self.table).build() {
            Ok((query, args)) => {
                debug!("Updating {}: {}", self.table, query);
                let rows = conn.query(query.as_str(), &as_params(&args)).await?;
                convert_rows(rows)
            }
            Err(filter) => {
                let (query, args) = filter.build_select();
                let rows = conn.query(query.as_str(), &as_params(&args)).await?;
                convert_rows(rows)
            }
        }
    }

    pub async fn update_exactly_one<C>(&self, conn: &C, updater: U) -> Result<T, RepoError>
    where
        C: GenericClient + Sync,
    {
        self.update(conn, updater).await?.pop().ok_or(RepoError::NotFound)
    }

    pub async fn delete<C>(&self, conn: &C, filter: F) -> Result<Vec<T>, RepoError>
    where
        C: GenericClient + Sync,
    {
        let (query, args) = filter.into_filtered_operation_builder(self.table).build_delete();
        debug!("Deleting from {}: {}", self.table, query);
        let rows = conn.query(query.as_str(), &as_params(&args)).await?;
        convert_rows(rows)
    }
}
