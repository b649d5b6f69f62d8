//! bbox-bench - Direct vs Index-Assisted Bounding-Box Reads over Parquet
//!
//! A small measurement harness that retrieves the identifiers of every building footprint
//! intersecting a fixed bounding box from a large, partitioned Parquet dataset in object
//! storage, and reports how long that takes.
//!
//! # Overview
//!
//! Four strategies cross two independent axes:
//!
//! | Strategy | Engine | Access pattern |
//! |---|---|---|
//! | `--pyarrow-no-index` | Arrow/Parquet reader over `object_store` | full scan, predicate pushed down |
//! | `--pyarrow-index` | Arrow/Parquet reader over `object_store` | spatial index → matching files only |
//! | `--duckdb-no-index` | embedded DuckDB | full scan of a glob |
//! | `--duckdb-index` | embedded DuckDB | spatial index → bracketed file list |
//!
//! Every strategy applies the same intersection predicate (see
//! [`predicate::bbox_predicate::BboxPredicate`]) and returns the number of identifiers
//! retrieved. [`timing::time_it`] runs a strategy a fixed number of times and reports the
//! median wall-clock duration.
//!
//! # Quick Start
//!
//! ```no_run
//! use bbox_bench::{run_benchmark, BenchmarkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let args = vec!["bbox-bench".to_string(), "--duckdb-no-index".to_string()];
//!     let median = run_benchmark(&args, BenchmarkConfig::default(), &mut std::io::stdout()).await?;
//!     assert!(median >= 0.0);
//!     Ok(())
//! }
//! ```
pub mod predicate;
pub mod fetching;
pub mod strategies;
pub mod timing;
pub mod utils;
#[cfg(test)]
pub mod unit_tests;

use std::io::Write;
use crate::predicate::bbox_predicate::BoundingBox;
use crate::strategies::{Harness, Strategy};
use crate::timing::time_it;

// ============================================================================
// Public Types
// ============================================================================

/// A collection of Parquet files to read.
///
/// Locations are either `s3://bucket/key` URIs or local filesystem paths.
///
/// # Examples
///
/// ```
/// use bbox_bench::DatasetSource;
///
/// // A single file, or a directory that is discovered recursively
/// let source = DatasetSource::Path("s3://bucket/release/theme=buildings".to_string());
///
/// // Files returned by the spatial index, qualified with a scheme
/// let source = DatasetSource::from_index_filenames(
///     vec!["bucket/a.parquet".to_string(), "bucket/b.parquet".to_string()],
///     "s3://",
/// );
/// assert_eq!(
///     source,
///     DatasetSource::Paths(vec!["s3://bucket/a.parquet".to_string(), "s3://bucket/b.parquet".to_string()])
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// A single Parquet file, or a directory/prefix whose Parquet files are discovered
    Path(String),
    /// An ordered list of Parquet files
    Paths(Vec<String>),
    /// A glob pattern such as `s3://bucket/dir/*.parquet`
    Glob(String),
}

impl DatasetSource {
    /// Builds a file list from `filename` values read out of the spatial index.
    ///
    /// The index stores locations without a scheme, so `prefix` is prepended to every name
    /// that does not already carry one.
    pub fn from_index_filenames(filenames: Vec<String>, prefix: &str) -> Self {
        let paths = filenames
            .into_iter()
            .map(|name| {
                if name.contains("://") {
                    name
                } else {
                    format!("{}{}", prefix, name)
                }
            })
            .collect();
        DatasetSource::Paths(paths)
    }

    /// Returns true if any location of this source lives in S3.
    pub fn is_remote(&self) -> bool {
        match self {
            DatasetSource::Path(p) | DatasetSource::Glob(p) => p.starts_with("s3://"),
            DatasetSource::Paths(paths) => paths.iter().any(|p| p.starts_with("s3://")),
        }
    }
}

/// Everything a benchmark run reads from its environment.
///
/// The defaults describe the Overture Maps buildings release and the pre-built spatial
/// index; tests substitute small local fixtures.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    /// Query rectangle shared by all strategies
    pub bbox: BoundingBox,

    /// Root of the target dataset (directory or prefix of Parquet files)
    pub dataset_uri: String,

    /// The spatial index Parquet file with `filename`, `id` and `bbox` columns
    pub index_uri: String,

    /// Region for S3 access; `None` leaves the store defaults untouched
    pub region: Option<String>,

    /// Prepended to each index `filename` before it is opened
    pub filename_prefix: String,

    /// Number of timed runs
    pub repetitions: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            bbox: BoundingBox::new(-71.068, 42.353, -71.058, 42.363),
            dataset_uri: "s3://overturemaps-us-west-2/release/2024-08-20.0/theme=buildings/type=building".to_string(),
            index_uri: "s3://omf-internal-usw2/testing/jwasserman/gpqindex/_index.parquet".to_string(),
            region: Some("us-west-2".to_string()),
            filename_prefix: "s3://".to_string(),
            repetitions: 5,
        }
    }
}

impl BenchmarkConfig {
    /// The target dataset as a directory to discover.
    pub fn direct_source(&self) -> DatasetSource {
        DatasetSource::Path(self.dataset_uri.clone())
    }

    /// The target dataset as a glob over its Parquet files.
    pub fn direct_glob(&self) -> DatasetSource {
        DatasetSource::Glob(format!("{}/*.parquet", self.dataset_uri.trim_end_matches('/')))
    }

    pub fn index_source(&self) -> DatasetSource {
        DatasetSource::Path(self.index_uri.clone())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Selects a strategy from `args[1]`, times it and reports the median.
///
/// Writes one `Run <i>: <seconds> s` line per run followed by `Median time is <seconds>`
/// to `out`, and returns the median in seconds.
///
/// # Errors
///
/// Returns an error, before any run starts, if the option is missing or unrecognized.
/// Any failure during a run aborts the whole measurement and is returned unchanged.
pub async fn run_benchmark<W: Write>(
    args: &[String],
    config: BenchmarkConfig,
    out: &mut W,
) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
    let flag = args.get(1).ok_or("missing option")?;
    let strategy = Strategy::from_flag(flag)?;

    let repetitions = config.repetitions;
    let harness = Harness::new(config)?;

    let result = time_it(|| strategy.run(&harness), repetitions, out).await?;

    writeln!(out, "Median time is {}", result.median)?;
    out.flush()?;
    Ok(result.median)
}
