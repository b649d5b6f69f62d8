//! Column fetcher built on the Arrow Parquet reader over `object_store`.
//!
//! For every file of the source, in scan order:
//!
//! 1. Read the footer and locate the `bbox.*` leaves and the requested column
//! 2. **Row group pruning**: drop row groups whose `bbox` statistics rule out any match
//! 3. **Row filter**: evaluate the predicate on the `bbox` leaves of the remaining row groups
//!    before the requested column is decoded
//! 4. **Column projection**: decode only the requested column for the surviving rows
//!
//! Values are appended in the order the reader yields them.

use std::collections::HashMap;
use std::sync::Arc;
use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use futures::StreamExt;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ArrowPredicateFn, RowFilter};
use parquet::arrow::async_reader::{ParquetObjectReader, ParquetRecordBatchStreamBuilder};
use parquet::file::metadata::ParquetMetaData;
use parquet::file::statistics::Statistics;
use parquet::schema::types::SchemaDescriptor;
use crate::fetching::dataset_files::{resolve_files, DatasetFile};
use crate::fetching::ColumnFetcher;
use crate::predicate::bbox_predicate::{BboxField, BboxPredicate};
use crate::utils::file_interaction_local_and_cloud::StoreAccess;
use crate::DatasetSource;

/// Rows per decoded batch.
const BATCH_SIZE: usize = 8192;

/// Reads one column from Parquet files with the bounding-box predicate pushed down.
///
/// # Examples
///
/// ```no_run
/// use bbox_bench::fetching::ColumnFetcher;
/// use bbox_bench::fetching::arrow_fetcher::ArrowFetcher;
/// use bbox_bench::predicate::bbox_predicate::{BboxPredicate, BoundingBox};
/// use bbox_bench::utils::file_interaction_local_and_cloud::StoreAccess;
/// use bbox_bench::DatasetSource;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let fetcher = ArrowFetcher::new(StoreAccess::anonymous(Some("us-west-2".to_string())));
///     let predicate = BboxPredicate::intersecting(&BoundingBox::new(-71.068, 42.353, -71.058, 42.363));
///
///     let source = DatasetSource::Path(
///         "s3://overturemaps-us-west-2/release/2024-08-20.0/theme=buildings/type=building".to_string(),
///     );
///     let ids = fetcher.fetch_column(&source, "id", &predicate).await?;
///     println!("{} buildings", ids.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ArrowFetcher {
    access: StoreAccess,
}

impl ArrowFetcher {
    pub fn new(access: StoreAccess) -> Self {
        Self { access }
    }

    /// Reads `column` from a single file, keeping only rows that satisfy `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has no `column` or no `bbox` struct
    /// with the fields the predicate references, or the column cannot be cast to UTF-8.
    pub async fn fetch_file(
        &self,
        file: &DatasetFile,
        column: &str,
        predicate: &BboxPredicate,
    ) -> Result<Vec<Option<String>>, Box<dyn std::error::Error + Send + Sync>> {
        let object_reader = ParquetObjectReader::new(Arc::clone(&file.store), file.meta.location.clone())
            .with_file_size(file.meta.size);
        let builder = ParquetRecordBatchStreamBuilder::new(object_reader).await?;

        let metadata = Arc::clone(builder.metadata());
        let schema_descr = metadata.file_metadata().schema_descr();

        let column_leaves = leaves_for_column(schema_descr, column);
        if column_leaves.is_empty() {
            return Err(format!("column '{}' not found in {}", column, file.meta.location).into());
        }

        let bbox_leaves = bbox_leaf_indices(schema_descr, predicate)
            .map_err(|e| format!("{} in {}", e, file.meta.location))?;

        let row_groups = matching_row_groups(&metadata, &bbox_leaves, predicate);
        if row_groups.is_empty() {
            return Ok(Vec::new());
        }

        let filter_mask = ProjectionMask::leaves(schema_descr, bbox_leaves.values().copied());
        let filter_predicate = predicate.clone();
        let row_filter = RowFilter::new(vec![Box::new(ArrowPredicateFn::new(
            filter_mask,
            move |batch: RecordBatch| filter_predicate.evaluate_batch(&batch),
        ))]);

        let mut stream = builder
            .with_projection(ProjectionMask::leaves(schema_descr, column_leaves))
            .with_row_groups(row_groups)
            .with_row_filter(row_filter)
            .with_batch_size(BATCH_SIZE)
            .build()?;

        let mut values = Vec::new();
        while let Some(batch_result) = stream.next().await {
            let batch = batch_result?;
            append_as_strings(batch.column(0), &mut values)?;
        }

        Ok(values)
    }
}

impl ColumnFetcher for ArrowFetcher {
    async fn fetch_column(
        &self,
        source: &DatasetSource,
        column: &str,
        predicate: &BboxPredicate,
    ) -> Result<Vec<Option<String>>, Box<dyn std::error::Error + Send + Sync>> {
        let files = resolve_files(source, &self.access).await?;

        let mut values = Vec::new();
        for file in &files {
            values.extend(self.fetch_file(file, column, predicate).await?);
        }
        Ok(values)
    }
}

/// Leaf indices of `column`, which may name a top-level column or a dotted nested path.
fn leaves_for_column(schema_descr: &SchemaDescriptor, column: &str) -> Vec<usize> {
    let nested_prefix = format!("{}.", column);
    schema_descr
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, descr)| {
            let path = descr.path().string();
            path == column || path.starts_with(&nested_prefix)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Leaf index of every `bbox` sub-field the predicate references.
pub fn bbox_leaf_indices(
    schema_descr: &SchemaDescriptor,
    predicate: &BboxPredicate,
) -> Result<HashMap<BboxField, usize>, Box<dyn std::error::Error + Send + Sync>> {
    let mut leaves = HashMap::new();
    for field in predicate.fields() {
        let path = field.column_path();
        let idx = schema_descr
            .columns()
            .iter()
            .position(|descr| descr.path().string() == path)
            .ok_or_else(|| format!("column '{}' not found", path))?;
        leaves.insert(field, idx);
    }
    Ok(leaves)
}

/// Row groups whose `bbox` statistics leave room for at least one match.
///
/// Row groups without usable statistics are always kept.
pub fn matching_row_groups(
    metadata: &ParquetMetaData,
    bbox_leaves: &HashMap<BboxField, usize>,
    predicate: &BboxPredicate,
) -> Vec<usize> {
    (0..metadata.num_row_groups())
        .filter(|&rg_idx| {
            let row_group = metadata.row_group(rg_idx);
            predicate.may_match(&|field: BboxField| {
                let leaf = *bbox_leaves.get(&field)?;
                statistics_bounds(row_group.column(leaf).statistics()?)
            })
        })
        .collect()
}

/// `(min, max)` of numeric column chunk statistics as `f64`.
fn statistics_bounds(stats: &Statistics) -> Option<(f64, f64)> {
    match stats {
        Statistics::Float(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        Statistics::Double(s) => Some((*s.min_opt()?, *s.max_opt()?)),
        Statistics::Int32(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        Statistics::Int64(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        _ => None,
    }
}

fn append_as_strings(array: &ArrayRef, out: &mut Vec<Option<String>>) -> Result<(), ArrowError> {
    let strings = match array.data_type() {
        DataType::Utf8 => Arc::clone(array),
        _ => cast(array, &DataType::Utf8)?,
    };
    out.extend(strings.as_string::<i32>().iter().map(|v| v.map(str::to_string)));
    Ok(())
}
