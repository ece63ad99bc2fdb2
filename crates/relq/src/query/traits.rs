//! Execution helpers shared by all statement drafts.

use crate::compile::CompiledStatement;
use crate::driver::Driver;
use crate::error::{QbError, QbResult};
use crate::value::Record;
use serde::de::DeserializeOwned;

/// A draft that compiles to one statement.
///
/// Every execution method compiles first, so builder and compile errors
/// surface before anything reaches the driver.
pub trait Statement: Sync {
    /// Compile into SQL text and parameters.
    fn build(&self) -> QbResult<CompiledStatement>;

    /// Debug helper returning only the SQL text.
    fn to_sql(&self) -> QbResult<String> {
        Ok(self.build()?.sql)
    }

    /// Execute and return every row.
    fn fetch_all(
        &self,
        driver: &impl Driver,
    ) -> impl std::future::Future<Output = QbResult<Vec<Record>>> + Send {
        async move {
            let stmt = self.build()?;
            driver.query(&stmt.sql, &stmt.params).await
        }
    }

    /// Execute and return the first row, if any.
    fn fetch_optional(
        &self,
        driver: &impl Driver,
    ) -> impl std::future::Future<Output = QbResult<Option<Record>>> + Send {
        async move {
            let rows = self.fetch_all(driver).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute and return the first row, failing with `NotFound` when empty.
    fn fetch_one(
        &self,
        driver: &impl Driver,
    ) -> impl std::future::Future<Output = QbResult<Record>> + Send {
        async move {
            self.fetch_optional(driver)
                .await?
                .ok_or_else(|| QbError::NotFound("query returned no rows".to_string()))
        }
    }

    /// Execute and deserialize every row into `T`.
    fn fetch_all_as<T: DeserializeOwned + Send>(
        &self,
        driver: &impl Driver,
    ) -> impl std::future::Future<Output = QbResult<Vec<T>>> + Send {
        async move {
            let rows = self.fetch_all(driver).await?;
            rows.iter().map(Record::deserialize).collect()
        }
    }

    /// Execute and return the affected row count.
    fn execute(
        &self,
        driver: &impl Driver,
    ) -> impl std::future::Future<Output = QbResult<u64>> + Send {
        async move {
            let stmt = self.build()?;
            driver.execute(&stmt.sql, &stmt.params).await
        }
    }
}
