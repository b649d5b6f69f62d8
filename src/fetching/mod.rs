//! Single-column reads with the bounding-box predicate applied.
//!
//! The two query engines take the predicate in different native forms (a row mask over
//! Arrow arrays vs. a SQL WHERE clause). [`ColumnFetcher`] hides that difference so the
//! strategies read the same way for either engine.

pub mod arrow_fetcher;
pub mod dataset_files;
pub mod sql_fetcher;

use crate::predicate::bbox_predicate::BboxPredicate;
use crate::DatasetSource;

/// Reads one column of the rows matching a predicate.
#[allow(async_fn_in_trait)]
pub trait ColumnFetcher {
    /// Returns the values of `column` for every row of `source` satisfying `predicate`,
    /// in the engine's scan order. Nulls are kept as `None`; nothing is deduplicated.
    ///
    /// # Errors
    ///
    /// Unreachable or missing sources, unknown columns and engine failures are returned
    /// unchanged.
    async fn fetch_column(
        &self,
        source: &DatasetSource,
        column: &str,
        predicate: &BboxPredicate,
    ) -> Result<Vec<Option<String>>, Box<dyn std::error::Error + Send + Sync>>;
}

// Link to test module (only compiled during tests)
#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
