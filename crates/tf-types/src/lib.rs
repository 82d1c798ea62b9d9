#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One materialized row of a nested sub-frame, in column insertion order.
pub type NestedRow = Vec<(String, Scalar)>;

/// The two distinct missing markers carried by every column.
///
/// `Null` is an explicit null written into a cell; `Absent` marks a value
/// that was never supplied (a row that lacked the column, an out-of-range
/// lag slot, an unmatched join side). The two are never interchangeable:
/// the missing-data verbs can target either kind on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKind {
    Null,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
    Nested,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Missing(MissingKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    /// A whole sub-frame held as a single cell, already flattened to a
    /// plain row-array so JSON expansion needs no engine types.
    Nested(Vec<NestedRow>),
}

impl Scalar {
    #[must_use]
    pub fn null() -> Self {
        Self::Missing(MissingKind::Null)
    }

    #[must_use]
    pub fn absent() -> Self {
        Self::Missing(MissingKind::Absent)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Missing(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Nested(_) => DType::Nested,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Missing(MissingKind::Null))
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Missing(MissingKind::Absent))
    }

    /// Numeric view of the cell; `None` for missing and non-numeric values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            Self::Missing(_) | Self::Utf8(_) | Self::Nested(_) => None,
        }
    }

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        self.as_f64().ok_or_else(|| TypeError::NonNumericValue {
            dtype: self.dtype(),
            rendered: self.label(),
        })
    }

    /// Display form used when a scalar becomes a column name
    /// (pivot_wider, transpose labels) or a key rendering in messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Missing(MissingKind::Null) => "null".to_owned(),
            Self::Missing(MissingKind::Absent) => "NA".to_owned(),
            Self::Bool(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Float64(v) => v.to_string(),
            Self::Utf8(v) => v.clone(),
            Self::Nested(rows) => format!("<frame:{} rows>", rows.len()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("value {rendered:?} of dtype {dtype:?} is not numeric")]
    NonNumericValue { dtype: DType, rendered: String },
}

/// Widening lattice for column dtype inference. Never fails: values that
/// share no common numeric type infer `Mixed`, since cells stay dynamically
/// typed and every verb re-checks at the point of use.
#[must_use]
pub fn common_dtype(left: DType, right: DType) -> DType {
    use DType::{Bool, Float64, Int64, Mixed, Nested, Null, Utf8};

    match (left, right) {
        (Null, other) | (other, Null) => other,
        (Bool, Bool) => Bool,
        (Int64, Int64) | (Bool, Int64) | (Int64, Bool) => Int64,
        (Float64, Float64)
        | (Bool, Float64)
        | (Float64, Bool)
        | (Int64, Float64)
        | (Float64, Int64) => Float64,
        (Utf8, Utf8) => Utf8,
        (Nested, Nested) => Nested,
        (Utf8, _) | (_, Utf8) | (Nested, _) | (_, Nested) | (Mixed, _) | (_, Mixed) => Mixed,
    }
}

#[must_use]
pub fn infer_dtype(values: &[Scalar]) -> DType {
    values
        .iter()
        .fold(DType::Null, |acc, value| common_dtype(acc, value.dtype()))
}

/// Hashable form of a scalar, used as a key component by grouping,
/// distinct, joins, and pivoting. Floats hash by bit pattern (all NaNs
/// collapse to one key); `Int64(5)` and `Float64(5.0)` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScalar {
    Missing(MissingKind),
    Bool(bool),
    Int64(i64),
    FloatBits(u64),
    Utf8(String),
    Nested(String),
}

impl KeyScalar {
    #[must_use]
    pub fn from_scalar(value: &Scalar) -> Self {
        match value {
            Scalar::Missing(kind) => Self::Missing(*kind),
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int64(*v),
            Scalar::Float64(v) => Self::FloatBits(if v.is_nan() {
                f64::NAN.to_bits()
            } else {
                v.to_bits()
            }),
            Scalar::Utf8(v) => Self::Utf8(v.clone()),
            Scalar::Nested(rows) => Self::Nested(format!("{rows:?}")),
        }
    }
}

/// Build the key tuple for one row of key scalars.
#[must_use]
pub fn key_tuple(values: &[&Scalar]) -> Vec<KeyScalar> {
    values.iter().map(|v| KeyScalar::from_scalar(v)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Total order over scalars used by arrange, the slice-min/max family, and
/// ranking. Missing (either kind) sorts below every present value; present
/// values compare numerically when both are numeric, lexicographically for
/// strings, and by dtype precedence (numeric < string < nested) across
/// types so mixed columns still sort deterministically.
#[must_use]
pub fn compare_scalars(left: &Scalar, right: &Scalar) -> Ordering {
    match (left.is_missing(), right.is_missing()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a.total_cmp(&b);
    }

    match (left, right) {
        (Scalar::Utf8(a), Scalar::Utf8(b)) => a.cmp(b),
        (Scalar::Nested(a), Scalar::Nested(b)) => a.len().cmp(&b.len()),
        _ => type_precedence(left).cmp(&type_precedence(right)),
    }
}

fn type_precedence(value: &Scalar) -> u8 {
    match value {
        Scalar::Missing(_) => 0,
        Scalar::Bool(_) | Scalar::Int64(_) | Scalar::Float64(_) => 1,
        Scalar::Utf8(_) => 2,
        Scalar::Nested(_) => 3,
    }
}
