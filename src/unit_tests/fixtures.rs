//! Small synthetic building datasets written to a scratch directory.
//!
//! Buildings carry an `id` and a `bbox` struct of `Float32` bounds, the layout of the
//! Overture release. The index carries `filename`, `id` and `bbox`, one row per file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use arrow::array::{ArrayRef, Float32Array, RecordBatch, StringArray, StructArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Fields, Schema};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use crate::predicate::bbox_predicate::BoundingBox;
use crate::BenchmarkConfig;

/// The query rectangle of the benchmark, around Boston Common.
pub const BOSTON: [f64; 4] = [-71.068, 42.353, -71.058, 42.363];

/// Scratch directory removed on drop.
pub struct FixtureDir {
    root: PathBuf,
}

impl FixtureDir {
    /// Creates an empty directory unique to `name` and this process.
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("bbox-bench-{}-{}", name, std::process::id()));
        if root.exists() {
            fs::remove_dir_all(&root).unwrap();
        }
        fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    pub fn root(&self) -> String {
        self.root.to_string_lossy().to_string()
    }

    /// Absolute path of `relative` inside the directory, as a string.
    pub fn path(&self, relative: &str) -> String {
        self.root.join(relative).to_string_lossy().to_string()
    }
}

impl Drop for FixtureDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

pub fn bbox_fields() -> Fields {
    Fields::from(vec![
        Field::new("xmin", DataType::Float32, false),
        Field::new("xmax", DataType::Float32, false),
        Field::new("ymin", DataType::Float32, false),
        Field::new("ymax", DataType::Float32, false),
    ])
}

/// A `bbox` struct array; `None` entries become null structs.
pub fn bbox_array(boxes: &[Option<BoundingBox>]) -> StructArray {
    let component = |get: fn(&BoundingBox) -> f64| -> ArrayRef {
        let values: Vec<f32> = boxes
            .iter()
            .map(|b| b.as_ref().map(|b| get(b) as f32).unwrap_or(0.0))
            .collect();
        Arc::new(Float32Array::from(values))
    };

    let columns = vec![
        component(|b| b.xmin),
        component(|b| b.xmax),
        component(|b| b.ymin),
        component(|b| b.ymax),
    ];
    let nulls = if boxes.iter().any(Option::is_none) {
        Some(NullBuffer::from(boxes.iter().map(Option::is_some).collect::<Vec<bool>>()))
    } else {
        None
    };

    StructArray::try_new(bbox_fields(), columns, nulls).unwrap()
}

/// Buildings table: `id`, `bbox`.
pub fn building_batch(rows: &[(&str, BoundingBox)]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("bbox", DataType::Struct(bbox_fields()), true),
    ]));
    let ids: Vec<&str> = rows.iter().map(|(id, _)| *id).collect();
    let boxes: Vec<Option<BoundingBox>> = rows.iter().map(|(_, b)| Some(*b)).collect();

    RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from(ids)) as ArrayRef,
        Arc::new(bbox_array(&boxes)) as ArrayRef,
    ]).unwrap()
}

/// Index table: `filename`, `id`, `bbox`.
pub fn index_batch(rows: &[(&str, &str, BoundingBox)]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("filename", DataType::Utf8, false),
        Field::new("id", DataType::Utf8, false),
        Field::new("bbox", DataType::Struct(bbox_fields()), true),
    ]));
    let filenames: Vec<&str> = rows.iter().map(|(f, _, _)| *f).collect();
    let ids: Vec<&str> = rows.iter().map(|(_, id, _)| *id).collect();
    let boxes: Vec<Option<BoundingBox>> = rows.iter().map(|(_, _, b)| Some(*b)).collect();

    RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from(filenames)) as ArrayRef,
        Arc::new(StringArray::from(ids)) as ArrayRef,
        Arc::new(bbox_array(&boxes)) as ArrayRef,
    ]).unwrap()
}

/// Writes `batch` to `path`, creating parent directories.
pub fn write_parquet(
    path: &str,
    batch: &RecordBatch,
    max_row_group_size: Option<usize>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }

    let mut props = WriterProperties::builder();
    if let Some(size) = max_row_group_size {
        props = props.set_max_row_group_size(size);
    }

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props.build()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// One building inside [`BOSTON`] and two outside it.
pub fn boston_buildings() -> Vec<(&'static str, BoundingBox)> {
    vec![
        ("inside-common", BoundingBox::new(-71.066, 42.355, -71.064, 42.357)),
        ("cambridge", BoundingBox::new(-71.110, 42.370, -71.105, 42.375)),
        ("south-boston", BoundingBox::new(-71.050, 42.330, -71.045, 42.335)),
    ]
}

/// Dataset layout used by the end-to-end tests:
///
/// ```text
/// <root>/dataset/part-0.parquet   the three Boston buildings (one match)
/// <root>/dataset/part-1.parquet   two buildings far away (no match)
/// <root>/index/_index.parquet     one row per data file
/// ```
///
/// Returns a config pointing at it.
pub fn write_boston_dataset(dir: &FixtureDir) -> Result<BenchmarkConfig, Box<dyn std::error::Error + Send + Sync>> {
    let part0 = dir.path("dataset/part-0.parquet");
    let part1 = dir.path("dataset/part-1.parquet");

    write_parquet(&part0, &building_batch(&boston_buildings()), Some(1))?;
    write_parquet(&part1, &building_batch(&[
        ("paris", BoundingBox::new(2.34, 48.85, 2.36, 48.86)),
        ("tokyo", BoundingBox::new(139.69, 35.68, 139.70, 35.69)),
    ]), None)?;

    let index = index_batch(&[
        (part0.as_str(), "part-0", BoundingBox::new(-71.110, 42.330, -71.045, 42.375)),
        (part1.as_str(), "part-1", BoundingBox::new(2.34, 35.68, 139.70, 48.86)),
    ]);
    write_parquet(&dir.path("index/_index.parquet"), &index, None)?;

    Ok(BenchmarkConfig {
        bbox: BoundingBox::from(BOSTON),
        dataset_uri: dir.path("dataset"),
        index_uri: dir.path("index/_index.parquet"),
        region: None,
        filename_prefix: String::new(),
        repetitions: 3,
    })
}
