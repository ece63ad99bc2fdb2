//! Execution boundary.
//!
//! [`Driver`] is the only place statements leave the crate: compiled SQL plus
//! its [`Value`] parameters go in, [`Record`]s come back. It is implemented for
//! tokio-postgres clients and transactions (and pooled clients with the `pool`
//! feature) so callers can run graph inserts inside their own transaction.

use crate::error::QbResult;
use crate::value::{Record, Value};
use tokio_postgres::types::ToSql;

/// A connection or transaction that can run compiled statements.
pub trait Driver: Send + Sync {
    /// Run a statement and return every row.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QbResult<Vec<Record>>> + Send;

    /// Run a statement and return the affected row count.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QbResult<u64>> + Send;

    /// Like [`Driver::query`], with a tag for monitoring.
    ///
    /// The default implementation ignores `tag`.
    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QbResult<Vec<Record>>> + Send {
        let _ = tag;
        self.query(sql, params)
    }
}

impl<D: Driver> Driver for &D {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        (**self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        (**self).execute(sql, params).await
    }

    async fn query_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        (**self).query_tagged(tag, sql, params).await
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn decode_rows(rows: Vec<tokio_postgres::Row>) -> QbResult<Vec<Record>> {
    rows.iter().map(Record::from_row).collect()
}

impl Driver for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        let refs = param_refs(params);
        let rows = tokio_postgres::Client::query(self, sql, &refs).await?;
        decode_rows(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        let refs = param_refs(params);
        Ok(tokio_postgres::Client::execute(self, sql, &refs).await?)
    }
}

impl Driver for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        let refs = param_refs(params);
        let rows = tokio_postgres::Transaction::query(self, sql, &refs).await?;
        decode_rows(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        let refs = param_refs(params);
        Ok(tokio_postgres::Transaction::execute(self, sql, &refs).await?)
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl Driver for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        Driver::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        Driver::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Driver for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        Driver::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        Driver::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Driver for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        Driver::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        Driver::execute(&**self, sql, params).await
    }
}
