//! The four benchmarked retrieval strategies.
//!
//! | Flag | Engine | Steps |
//! |---|---|---|
//! | `--pyarrow-no-index` | Arrow | `id` from the dataset directory, anonymous access |
//! | `--pyarrow-index` | Arrow | `filename` from the index (credentialed), then `id` from those files (anonymous) |
//! | `--duckdb-no-index` | DuckDB | `id` from `<dataset>/*.parquet` |
//! | `--duckdb-index` | DuckDB | `filename` from the index, then `id` from the bracketed file list |
//!
//! Each returns how many identifiers were retrieved. The index is trusted to be complete;
//! nothing reconciles its output with a direct scan.

use std::fmt;
use crate::fetching::arrow_fetcher::ArrowFetcher;
use crate::fetching::sql_fetcher::SqlFetcher;
use crate::fetching::ColumnFetcher;
use crate::predicate::bbox_predicate::BboxPredicate;
use crate::utils::file_interaction_local_and_cloud::StoreAccess;
use crate::{BenchmarkConfig, DatasetSource};

/// Column holding the identifier of each building.
pub const ID_COLUMN: &str = "id";

/// Index column holding the data file of each entry.
pub const FILENAME_COLUMN: &str = "filename";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ArrowIndexed,
    ArrowDirect,
    SqlDirect,
    SqlIndexed,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::ArrowIndexed,
        Strategy::ArrowDirect,
        Strategy::SqlDirect,
        Strategy::SqlIndexed,
    ];

    /// Parses a command-line flag.
    ///
    /// ```
    /// use bbox_bench::strategies::Strategy;
    ///
    /// assert_eq!(Strategy::from_flag("--duckdb-index").unwrap(), Strategy::SqlIndexed);
    /// assert!(Strategy::from_flag("--bogus").is_err());
    /// ```
    pub fn from_flag(flag: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Strategy::ALL
            .into_iter()
            .find(|s| s.flag() == flag)
            .ok_or_else(|| format!("Invalid option: {}", flag).into())
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Strategy::ArrowIndexed => "--pyarrow-index",
            Strategy::ArrowDirect => "--pyarrow-no-index",
            Strategy::SqlDirect => "--duckdb-no-index",
            Strategy::SqlIndexed => "--duckdb-index",
        }
    }

    /// Runs the strategy once and returns the number of identifiers retrieved.
    pub async fn run(&self, harness: &Harness) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            Strategy::ArrowIndexed => harness.arrow_indexed().await,
            Strategy::ArrowDirect => harness.arrow_direct().await,
            Strategy::SqlDirect => harness.sql_direct().await,
            Strategy::SqlIndexed => harness.sql_indexed().await,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// Shared state for one benchmark invocation: the configuration, the predicate built
/// once from its bounding box, and one fetcher per filesystem binding.
pub struct Harness {
    config: BenchmarkConfig,
    predicate: BboxPredicate,
    anonymous: ArrowFetcher,
    credentialed: ArrowFetcher,
    sql: SqlFetcher,
}

impl Harness {
    /// # Errors
    ///
    /// Returns an error if the embedded SQL engine cannot be opened.
    pub fn new(config: BenchmarkConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let predicate = BboxPredicate::intersecting(&config.bbox);
        let anonymous = ArrowFetcher::new(StoreAccess::anonymous(config.region.clone()));
        let credentialed = ArrowFetcher::new(StoreAccess::credentialed(config.region.clone()));
        let sql = SqlFetcher::open(config.region.clone())?;

        Ok(Self {
            config,
            predicate,
            anonymous,
            credentialed,
            sql,
        })
    }

    async fn arrow_indexed(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        // The index lives behind a non-public location
        let filenames = self.credentialed
            .fetch_column(&self.config.index_source(), FILENAME_COLUMN, &self.predicate)
            .await?;
        let source = self.indexed_source(filenames);
        let ids = self.anonymous
            .fetch_column(&source, ID_COLUMN, &self.predicate)
            .await?;
        Ok(ids.len())
    }

    async fn arrow_direct(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let ids = self.anonymous
            .fetch_column(&self.config.direct_source(), ID_COLUMN, &self.predicate)
            .await?;
        Ok(ids.len())
    }

    async fn sql_direct(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let ids = self.sql
            .fetch_column(&self.config.direct_glob(), ID_COLUMN, &self.predicate)
            .await?;
        Ok(ids.len())
    }

    async fn sql_indexed(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let filenames = self.sql
            .fetch_column(&self.config.index_source(), FILENAME_COLUMN, &self.predicate)
            .await?;
        let source = self.indexed_source(filenames);
        let ids = self.sql
            .fetch_column(&source, ID_COLUMN, &self.predicate)
            .await?;
        Ok(ids.len())
    }

    /// Files named by the index, in the order it returned them.
    ///
    /// A file appears once per matching index row; null filenames are skipped.
    fn indexed_source(&self, filenames: Vec<Option<String>>) -> DatasetSource {
        DatasetSource::from_index_filenames(
            filenames.into_iter().flatten().collect(),
            &self.config.filename_prefix,
        )
    }
}
