//! Bounding-box intersection predicate.
//!
//! A query rectangle is turned into a small expression tree of comparisons over the
//! `bbox` struct column (`bbox.xmin`, `bbox.xmax`, `bbox.ymin`, `bbox.ymax`). The same tree
//! is then rendered or evaluated in every form a backend needs:
//!
//! - **Arrow**: [`BboxPredicate::evaluate`] produces a row mask over a `bbox` struct array,
//!   used as a pushed-down row filter by the Parquet reader
//! - **SQL**: [`BboxPredicate::to_sql`] renders a WHERE-clause fragment with the bounds
//!   interpolated as literals
//! - **Statistics**: [`BboxPredicate::may_match`] decides from column min/max whether a
//!   row group can contain a match at all
//!
//! Because all three walk the same tree, the backends always apply an identical test.
//!
//! # Examples
//!
//! ```
//! use bbox_bench::predicate::bbox_predicate::{BboxPredicate, BoundingBox};
//!
//! let query = BoundingBox::new(-71.068, 42.353, -71.058, 42.363);
//! let predicate = BboxPredicate::intersecting(&query);
//!
//! assert_eq!(
//!     predicate.to_sql(),
//!     "bbox.xmin < -71.058 AND bbox.xmax > -71.068 AND bbox.ymin < 42.363 AND bbox.ymax > 42.353"
//! );
//! assert!(predicate.matches(&BoundingBox::new(-71.06, 42.36, -71.059, 42.361)));
//! ```

use std::fmt;
use arrow::array::{Array, AsArray, BooleanArray, Float64Array, RecordBatch, StructArray};
use arrow::compute::kernels::cmp::{gt, lt};
use arrow::compute::{and, cast, is_not_null, prep_null_mask_filter};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;

/// Name of the struct column holding each row's extent.
pub const BBOX_COLUMN: &str = "bbox";

/// An axis-aligned rectangle `(xmin, ymin, xmax, ymax)` in the dataset's coordinate system.
///
/// No ordering of the bounds is enforced. An inverted box is accepted as-is and simply
/// produces a predicate that matches nothing (or, for some stored extents, everything).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }
}

/// `[xmin, ymin, xmax, ymax]`
impl From<[f64; 4]> for BoundingBox {
    fn from(bounds: [f64; 4]) -> Self {
        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }
}

/// One of the four sub-fields of the `bbox` struct column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BboxField {
    Xmin,
    Xmax,
    Ymin,
    Ymax,
}

impl BboxField {
    pub const ALL: [BboxField; 4] = [BboxField::Xmin, BboxField::Xmax, BboxField::Ymin, BboxField::Ymax];

    /// Sub-field name as stored in the Parquet schema.
    pub fn name(&self) -> &'static str {
        match self {
            BboxField::Xmin => "xmin",
            BboxField::Xmax => "xmax",
            BboxField::Ymin => "ymin",
            BboxField::Ymax => "ymax",
        }
    }

    /// Dotted Parquet column path, e.g. `bbox.xmin`.
    pub fn column_path(&self) -> String {
        format!("{}.{}", BBOX_COLUMN, self.name())
    }

    pub fn of(&self, bbox: &BoundingBox) -> f64 {
        match self {
            BboxField::Xmin => bbox.xmin,
            BboxField::Xmax => bbox.xmax,
            BboxField::Ymin => bbox.ymin,
            BboxField::Ymax => bbox.ymax,
        }
    }
}

impl fmt::Display for BboxField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strict comparison operators; the intersection test never needs equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
        }
    }

    fn apply(&self, stored: f64, value: f64) -> bool {
        match self {
            CmpOp::Lt => stored < value,
            CmpOp::Gt => stored > value,
        }
    }
}

/// Boolean expression over the `bbox` struct column.
#[derive(Debug, Clone, PartialEq)]
pub enum BboxPredicate {
    /// `bbox.<field> <op> <value>`
    Compare {
        field: BboxField,
        op: CmpOp,
        value: f64,
    },
    And(Box<BboxPredicate>, Box<BboxPredicate>),
}

impl BboxPredicate {
    /// Builds the intersection test against `query`:
    ///
    /// ```text
    /// bbox.xmin < query.xmax AND bbox.xmax > query.xmin AND
    /// bbox.ymin < query.ymax AND bbox.ymax > query.ymin
    /// ```
    ///
    /// The bounds are not validated.
    pub fn intersecting(query: &BoundingBox) -> Self {
        Self::compare(BboxField::Xmin, CmpOp::Lt, query.xmax)
            .and(Self::compare(BboxField::Xmax, CmpOp::Gt, query.xmin))
            .and(Self::compare(BboxField::Ymin, CmpOp::Lt, query.ymax))
            .and(Self::compare(BboxField::Ymax, CmpOp::Gt, query.ymin))
    }

    pub fn compare(field: BboxField, op: CmpOp, value: f64) -> Self {
        BboxPredicate::Compare { field, op, value }
    }

    pub fn and(self, other: BboxPredicate) -> Self {
        BboxPredicate::And(Box::new(self), Box::new(other))
    }

    /// Distinct sub-fields referenced by the expression, in order of first appearance.
    pub fn fields(&self) -> Vec<BboxField> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, out: &mut Vec<BboxField>) {
        match self {
            BboxPredicate::Compare { field, .. } => {
                if !out.contains(field) {
                    out.push(*field);
                }
            }
            BboxPredicate::And(left, right) => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }

    /// Evaluates the predicate against a single stored extent.
    pub fn matches(&self, stored: &BoundingBox) -> bool {
        match self {
            BboxPredicate::Compare { field, op, value } => op.apply(field.of(stored), *value),
            BboxPredicate::And(left, right) => left.matches(stored) && right.matches(stored),
        }
    }

    /// Returns `false` only when the `(min, max)` statistics for each field prove that no
    /// row can satisfy the predicate.
    ///
    /// `bounds` yields the statistics for a field, or `None` when they are unavailable, in
    /// which case the comparison is assumed satisfiable.
    pub fn may_match<F>(&self, bounds: &F) -> bool
    where
        F: Fn(BboxField) -> Option<(f64, f64)>,
    {
        match self {
            BboxPredicate::Compare { field, op, value } => match (bounds(*field), op) {
                (Some((min, _)), CmpOp::Lt) => min < *value,
                (Some((_, max)), CmpOp::Gt) => max > *value,
                (None, _) => true,
            },
            BboxPredicate::And(left, right) => left.may_match(bounds) && right.may_match(bounds),
        }
    }

    /// Evaluates the predicate over a `bbox` struct array.
    ///
    /// Sub-fields of any numeric type are compared as `Float64`. Rows whose `bbox` is null,
    /// or whose comparison yields null, are reported as `false`.
    pub fn evaluate(&self, bbox: &StructArray) -> Result<BooleanArray, ArrowError> {
        let mask = self.evaluate_node(bbox)?;
        let mask = if mask.null_count() > 0 {
            prep_null_mask_filter(&mask)
        } else {
            mask
        };
        if bbox.null_count() == 0 {
            return Ok(mask);
        }
        and(&mask, &is_not_null(bbox)?)
    }

    /// Evaluates the predicate over the `bbox` column of a record batch.
    pub fn evaluate_batch(&self, batch: &RecordBatch) -> Result<BooleanArray, ArrowError> {
        let column = batch.column_by_name(BBOX_COLUMN).ok_or_else(|| {
            ArrowError::SchemaError(format!("column '{}' not found", BBOX_COLUMN))
        })?;
        let bbox = column.as_struct_opt().ok_or_else(|| {
            ArrowError::SchemaError(format!(
                "column '{}' is {}, expected a struct",
                BBOX_COLUMN,
                column.data_type()
            ))
        })?;
        self.evaluate(bbox)
    }

    fn evaluate_node(&self, bbox: &StructArray) -> Result<BooleanArray, ArrowError> {
        match self {
            BboxPredicate::Compare { field, op, value } => {
                let child = bbox.column_by_name(field.name()).ok_or_else(|| {
                    ArrowError::SchemaError(format!("field '{}' not found", field.column_path()))
                })?;
                let values = cast(child, &DataType::Float64)?;
                let scalar = Float64Array::new_scalar(*value);
                match op {
                    CmpOp::Lt => lt(&values, &scalar),
                    CmpOp::Gt => gt(&values, &scalar),
                }
            }
            BboxPredicate::And(left, right) => {
                and(&left.evaluate_node(bbox)?, &right.evaluate_node(bbox)?)
            }
        }
    }

    /// Renders the predicate as a SQL WHERE-clause fragment.
    pub fn to_sql(&self) -> String {
        match self {
            BboxPredicate::Compare { field, op, value } => {
                format!("{} {} {}", field.column_path(), op.symbol(), sql_number(*value))
            }
            BboxPredicate::And(left, right) => {
                format!("{} AND {}", left.to_sql(), right.to_sql())
            }
        }
    }
}

/// Numeric literal for SQL; non-finite values become typed string casts, since a bare
/// `inf` or `NaN` would be parsed as a column reference.
fn sql_number(value: f64) -> String {
    if value.is_nan() {
        "'nan'::DOUBLE".to_string()
    } else if value == f64::INFINITY {
        "'inf'::DOUBLE".to_string()
    } else if value == f64::NEG_INFINITY {
        "'-inf'::DOUBLE".to_string()
    } else {
        value.to_string()
    }
}

impl fmt::Display for BboxPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
