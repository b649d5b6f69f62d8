//! Column fetcher built on an embedded DuckDB connection.
//!
//! Each fetch issues
//!
//! ```sql
//! SET s3_region='<region>';
//! SELECT "<column>" FROM read_parquet(<source>) WHERE <predicate>;
//! ```
//!
//! where `<source>` is a single quoted URI or a bracketed list of quoted URIs. Locations and
//! identifiers are escaped, so filenames containing quotes cannot break out of the literal.

use std::cell::Cell;
use duckdb::Connection;
use duckdb::types::Value;
use crate::fetching::ColumnFetcher;
use crate::predicate::bbox_predicate::BboxPredicate;
use crate::DatasetSource;

/// Reads one column through DuckDB's `read_parquet` with the predicate as a WHERE clause.
///
/// The connection is in-memory and lives as long as the fetcher, so extension loading and
/// session settings persist across fetches.
pub struct SqlFetcher {
    conn: Connection,
    region: Option<String>,
    httpfs_loaded: Cell<bool>,
}

impl SqlFetcher {
    /// Opens an in-memory DuckDB connection.
    ///
    /// `region`, when set, is applied with `SET s3_region` before every query that reads
    /// from S3.
    pub fn open(region: Option<String>) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            region,
            httpfs_loaded: Cell::new(false),
        })
    }

    /// The session-level region statement, if a region is configured.
    pub fn region_statement(&self) -> Option<String> {
        self.region
            .as_ref()
            .map(|region| format!("SET s3_region={};", quote_literal(region)))
    }

    /// Runs the query for an already rendered `read_parquet` argument.
    ///
    /// `source_literal` is `'uri'` or `['uri', ...]`; see [`source_literal`].
    pub fn fetch_literal(
        &self,
        source_literal: &str,
        column: &str,
        predicate: &BboxPredicate,
        remote: bool,
    ) -> Result<Vec<Option<String>>, Box<dyn std::error::Error + Send + Sync>> {
        if remote {
            self.prepare_remote()?;
        }

        let sql = select_statement(source_literal, column, predicate);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, Value>(0))?;

        let mut values = Vec::new();
        for row in rows {
            values.push(value_to_string(row?));
        }
        Ok(values)
    }

    fn prepare_remote(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.httpfs_loaded.get() {
            self.conn.execute_batch("INSTALL httpfs; LOAD httpfs;")?;
            self.httpfs_loaded.set(true);
        }
        if let Some(statement) = self.region_statement() {
            self.conn.execute_batch(&statement)?;
        }
        Ok(())
    }
}

impl ColumnFetcher for SqlFetcher {
    async fn fetch_column(
        &self,
        source: &DatasetSource,
        column: &str,
        predicate: &BboxPredicate,
    ) -> Result<Vec<Option<String>>, Box<dyn std::error::Error + Send + Sync>> {
        // read_parquet([]) is rejected by the engine; no files means no rows
        if let DatasetSource::Paths(paths) = source {
            if paths.is_empty() {
                return Ok(Vec::new());
            }
        }

        self.fetch_literal(&source_literal(source), column, predicate, source.is_remote())
    }
}

/// Renders `source` as the argument of `read_parquet`.
///
/// ```
/// use bbox_bench::fetching::sql_fetcher::source_literal;
/// use bbox_bench::DatasetSource;
///
/// assert_eq!(source_literal(&DatasetSource::Glob("s3://b/d/*.parquet".to_string())), "'s3://b/d/*.parquet'");
/// assert_eq!(
///     source_literal(&DatasetSource::Paths(vec!["s3://b/a.parquet".to_string(), "s3://b/it's.parquet".to_string()])),
///     "['s3://b/a.parquet','s3://b/it''s.parquet']"
/// );
/// assert_eq!(source_literal(&DatasetSource::Paths(vec![])), "[]");
/// ```
pub fn source_literal(source: &DatasetSource) -> String {
    match source {
        DatasetSource::Path(location) | DatasetSource::Glob(location) => quote_literal(location),
        DatasetSource::Paths(locations) => {
            let quoted: Vec<String> = locations.iter().map(|l| quote_literal(l)).collect();
            format!("[{}]", quoted.join(","))
        }
    }
}

/// `SELECT "<column>" FROM read_parquet(<source>) WHERE <predicate>`
pub fn select_statement(source_literal: &str, column: &str, predicate: &BboxPredicate) -> String {
    format!(
        "SELECT {} FROM read_parquet({}) WHERE {}",
        quote_identifier(column),
        source_literal,
        predicate.to_sql()
    )
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Double-quoted SQL identifier with embedded quotes doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s),
        Value::Boolean(v) => Some(v.to_string()),
        Value::TinyInt(v) => Some(v.to_string()),
        Value::SmallInt(v) => Some(v.to_string()),
        Value::Int(v) => Some(v.to_string()),
        Value::BigInt(v) => Some(v.to_string()),
        Value::HugeInt(v) => Some(v.to_string()),
        Value::UTinyInt(v) => Some(v.to_string()),
        Value::USmallInt(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::UBigInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        other => Some(format!("{:?}", other)),
    }
}
