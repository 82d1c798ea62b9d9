#![forbid(unsafe_code)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tf_types::{DType, Scalar, infer_dtype};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("column {column:?} has length {actual} but the store expects {expected}")]
    ShapeMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("unknown column {name:?}; available columns: {}", available.join(", "))]
    UnknownColumn { name: String, available: Vec<String> },
    #[error("duplicate column name {name:?}")]
    DuplicateColumn { name: String },
    #[error("row {row} rejected by schema validator: {reason}")]
    SchemaRejected { row: usize, reason: String },
}

/// Row-level schema hook consulted once per raw row at store construction.
/// The validator may rewrite the row (coercions, renames) or reject it.
pub trait RowValidator {
    fn validate(
        &self,
        row: Vec<(String, Scalar)>,
    ) -> Result<Vec<(String, Scalar)>, SchemaViolation>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub reason: String,
}

impl SchemaViolation {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl<F> RowValidator for F
where
    F: Fn(Vec<(String, Scalar)>) -> Result<Vec<(String, Scalar)>, SchemaViolation>,
{
    fn validate(
        &self,
        row: Vec<(String, Scalar)>,
    ) -> Result<Vec<(String, Scalar)>, SchemaViolation> {
        self(row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityMask {
    bits: Vec<bool>,
}

impl ValidityMask {
    #[must_use]
    pub fn from_values(values: &[Scalar]) -> Self {
        let bits = values.iter().map(|value| !value.is_missing()).collect();
        Self { bits }
    }

    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    #[must_use]
    pub fn all_present(&self) -> bool {
        self.bits.iter().all(|bit| *bit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

impl Column {
    #[must_use]
    pub fn from_values(values: Vec<Scalar>) -> Self {
        let dtype = infer_dtype(&values);
        let validity = ValidityMask::from_values(&values);
        Self {
            dtype,
            values,
            validity,
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    #[must_use]
    pub fn validity(&self) -> &ValidityMask {
        &self.validity
    }

    /// Gather by positions; `None` slots become absent markers. The only
    /// way joins and reshapes inject missing cells.
    #[must_use]
    pub fn gather(&self, positions: &[Option<usize>]) -> Self {
        let values = positions
            .iter()
            .map(|slot| match slot {
                Some(idx) => self
                    .values
                    .get(*idx)
                    .cloned()
                    .unwrap_or_else(Scalar::absent),
                None => Scalar::absent(),
            })
            .collect::<Vec<_>>();
        Self::from_values(values)
    }

    #[must_use]
    pub fn take(&self, rows: &[usize]) -> Self {
        let values = rows
            .iter()
            .map(|idx| {
                self.values
                    .get(*idx)
                    .cloned()
                    .unwrap_or_else(Scalar::absent)
            })
            .collect::<Vec<_>>();
        Self::from_values(values)
    }
}

/// The owning columnar container: insertion-ordered named columns of equal
/// length. Stores are immutable after construction; every "mutation"
/// constructs a new store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    names: Vec<String>,
    columns: HashMap<String, Column>,
    len: usize,
}

impl Store {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            columns: HashMap::new(),
            len: 0,
        }
    }

    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Vec<Scalar>)>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::empty();
        let mut first = true;
        for (name, values) in columns {
            if store.columns.contains_key(&name) {
                return Err(StoreError::DuplicateColumn { name });
            }
            if first {
                store.len = values.len();
                first = false;
            } else if values.len() != store.len {
                return Err(StoreError::ShapeMismatch {
                    column: name,
                    expected: store.len,
                    actual: values.len(),
                });
            }
            store.names.push(name.clone());
            store.columns.insert(name, Column::from_values(values));
        }
        Ok(store)
    }

    /// Build from row-arrays. Column order is first-seen across rows; cells
    /// a row does not supply become absent markers. The optional validator
    /// sees each raw row before it lands in any column.
    pub fn from_rows(
        rows: Vec<Vec<(String, Scalar)>>,
        validator: Option<&dyn RowValidator>,
    ) -> Result<Self, StoreError> {
        let mut names = Vec::<String>::new();
        let mut buffers = HashMap::<String, Vec<Scalar>>::new();
        let total = rows.len();

        for (row_idx, raw) in rows.into_iter().enumerate() {
            let row = match validator {
                Some(v) => v
                    .validate(raw)
                    .map_err(|violation| StoreError::SchemaRejected {
                        row: row_idx,
                        reason: violation.reason,
                    })?,
                None => raw,
            };

            for (name, value) in row {
                let buffer = buffers.entry(name.clone()).or_insert_with(|| {
                    names.push(name.clone());
                    // Rows seen before this column existed hold no value.
                    vec![Scalar::absent(); row_idx]
                });
                if buffer.len() > row_idx {
                    // A duplicate cell within one row keeps the last write.
                    buffer[row_idx] = value;
                } else {
                    buffer.resize(row_idx, Scalar::absent());
                    buffer.push(value);
                }
            }
        }

        let mut columns = HashMap::with_capacity(names.len());
        for name in &names {
            let mut values = buffers.remove(name).unwrap_or_default();
            values.resize(total, Scalar::absent());
            columns.insert(name.clone(), Column::from_values(values));
        }

        Ok(Self {
            names,
            columns,
            len: total,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, StoreError> {
        self.get(name).ok_or_else(|| self.unknown_column(name))
    }

    #[must_use]
    pub fn unknown_column(&self, name: &str) -> StoreError {
        StoreError::UnknownColumn {
            name: name.to_owned(),
            available: self.names.clone(),
        }
    }

    /// New store with `name` set to `values`; replaces in place when the
    /// name exists, appends otherwise. Fails when lengths disagree — except
    /// on an empty store, where the first column fixes the length.
    pub fn with_column(&self, name: &str, values: Vec<Scalar>) -> Result<Self, StoreError> {
        if !self.names.is_empty() && values.len() != self.len {
            return Err(StoreError::ShapeMismatch {
                column: name.to_owned(),
                expected: self.len,
                actual: values.len(),
            });
        }

        let mut out = self.clone();
        out.len = values.len();
        if !out.columns.contains_key(name) {
            out.names.push(name.to_owned());
        }
        out.columns
            .insert(name.to_owned(), Column::from_values(values));
        Ok(out)
    }

    pub fn without_columns(&self, names: &[&str]) -> Result<Self, StoreError> {
        for name in names {
            if !self.columns.contains_key(*name) {
                return Err(self.unknown_column(name));
            }
        }
        let mut out = self.clone();
        out.names.retain(|n| !names.contains(&n.as_str()));
        for name in names {
            out.columns.remove(*name);
        }
        Ok(out)
    }

    /// Projection preserving the order given by the caller.
    pub fn select(&self, names: &[&str]) -> Result<Self, StoreError> {
        let mut out = Self::empty();
        out.len = self.len;
        for name in names {
            let column = self.column(name)?;
            if out.columns.contains_key(*name) {
                return Err(StoreError::DuplicateColumn {
                    name: (*name).to_owned(),
                });
            }
            out.names.push((*name).to_owned());
            out.columns.insert((*name).to_owned(), column.clone());
        }
        Ok(out)
    }

    pub fn rename(&self, mapping: &[(&str, &str)]) -> Result<Self, StoreError> {
        let mut out = self.clone();
        for (from, to) in mapping {
            if !out.columns.contains_key(*from) {
                return Err(self.unknown_column(from));
            }
            if *from == *to {
                continue;
            }
            if out.columns.contains_key(*to) {
                return Err(StoreError::DuplicateColumn {
                    name: (*to).to_owned(),
                });
            }
            let column = out
                .columns
                .remove(*from)
                .unwrap_or_else(|| Column::from_values(Vec::new()));
            out.columns.insert((*to).to_owned(), column);
            for name in &mut out.names {
                if name == from {
                    *name = (*to).to_owned();
                }
            }
        }
        Ok(out)
    }

    /// New store holding exactly `rows`, in the given order.
    #[must_use]
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let mut out = Self::empty();
        out.len = rows.len();
        for name in &self.names {
            if let Some(column) = self.columns.get(name) {
                out.names.push(name.clone());
                out.columns.insert(name.clone(), column.take(rows));
            }
        }
        out
    }

    #[must_use]
    pub fn row_ref(&self, row: usize) -> RowRef<'_> {
        RowRef { store: self, row }
    }

    #[must_use]
    pub fn row_values(&self, row: usize) -> Vec<(String, Scalar)> {
        self.names
            .iter()
            .map(|name| {
                let value = self
                    .columns
                    .get(name)
                    .and_then(|column| column.value(row))
                    .cloned()
                    .unwrap_or_else(Scalar::absent);
                (name.clone(), value)
            })
            .collect()
    }
}

/// Zero-copy view over a single store row, handed to verb callbacks.
/// Columns the row does not carry read as `None`, which is also what a
/// mutate callback sees for columns computed later in the same call.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    store: &'a Store,
    row: usize,
}

impl<'a> RowRef<'a> {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a Scalar> {
        self.store.get(name).and_then(|column| column.value(self.row))
    }

    /// Cell access that treats an unknown column as an absent value,
    /// mirroring dynamic row objects.
    #[must_use]
    pub fn value(&self, name: &str) -> Scalar {
        self.get(name).cloned().unwrap_or_else(Scalar::absent)
    }

    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Scalar::as_f64)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&'a str> {
        match self.get(name) {
            Some(Scalar::Utf8(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn row_index(&self) -> usize {
        self.row
    }

    #[must_use]
    pub fn to_owned_row(&self) -> Vec<(String, Scalar)> {
        self.store.row_values(self.row)
    }
}

#[cfg(test)]
mod tests {
    use tf_types::{DType, Scalar};

    use super::{SchemaViolation, Store, StoreError};

    fn int_column(values: &[i64]) -> Vec<Scalar> {
        values.iter().copied().map(Scalar::Int64).collect()
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let err = Store::from_columns(vec![
            ("a".to_owned(), int_column(&[1, 2])),
            ("b".to_owned(), int_column(&[1])),
        ])
        .expect_err("ragged input must fail");
        assert!(matches!(err, StoreError::ShapeMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn from_rows_marks_unsupplied_cells_absent() {
        let rows = vec![
            vec![("a".to_owned(), Scalar::Int64(1))],
            vec![
                ("a".to_owned(), Scalar::Int64(2)),
                ("b".to_owned(), Scalar::Int64(20)),
            ],
        ];
        let store = Store::from_rows(rows, None).expect("store builds");
        assert_eq!(store.names(), &["a".to_owned(), "b".to_owned()]);
        let b = store.column("b").expect("b exists");
        assert!(b.values()[0].is_absent());
        assert_eq!(b.values()[1], Scalar::Int64(20));
    }

    #[test]
    fn validator_rejection_names_the_row() {
        let validator = |row: Vec<(String, Scalar)>| {
            if row.iter().any(|(_, v)| v.is_missing()) {
                Err(SchemaViolation::new("missing cell"))
            } else {
                Ok(row)
            }
        };
        let rows = vec![
            vec![("a".to_owned(), Scalar::Int64(1))],
            vec![("a".to_owned(), Scalar::null())],
        ];
        let err = Store::from_rows(rows, Some(&validator)).expect_err("row 1 must be rejected");
        assert_eq!(
            err.to_string(),
            "row 1 rejected by schema validator: missing cell"
        );
    }

    #[test]
    fn with_column_then_drop_restores_the_original_store() {
        let store = Store::from_columns(vec![("a".to_owned(), int_column(&[1, 2, 3]))])
            .expect("store builds");
        let extended = store
            .with_column("b", int_column(&[4, 5, 6]))
            .expect("lengths match");
        let restored = extended.without_columns(&["b"]).expect("b exists");
        assert_eq!(restored, store);
    }

    #[test]
    fn with_column_rejects_length_mismatch() {
        let store = Store::from_columns(vec![("a".to_owned(), int_column(&[1, 2, 3]))])
            .expect("store builds");
        let err = store
            .with_column("b", int_column(&[1]))
            .expect_err("length mismatch must fail");
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn unknown_column_message_enumerates_available_names() {
        let store = Store::from_columns(vec![
            ("height".to_owned(), int_column(&[1])),
            ("mass".to_owned(), int_column(&[2])),
        ])
        .expect("store builds");
        let err = store.column("weight").expect_err("unknown column");
        assert_eq!(
            err.to_string(),
            "unknown column \"weight\"; available columns: height, mass"
        );
    }

    #[test]
    fn select_orders_columns_as_requested() {
        let store = Store::from_columns(vec![
            ("a".to_owned(), int_column(&[1])),
            ("b".to_owned(), int_column(&[2])),
            ("c".to_owned(), int_column(&[3])),
        ])
        .expect("store builds");
        let out = store.select(&["c", "a"]).expect("both exist");
        assert_eq!(out.names(), &["c".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn heterogeneous_columns_infer_mixed_dtype() {
        let store = Store::from_columns(vec![(
            "v".to_owned(),
            vec![Scalar::Int64(1), Scalar::Utf8("x".to_owned())],
        )])
        .expect("store builds");
        assert_eq!(store.column("v").expect("v").dtype(), DType::Mixed);
    }

    #[test]
    fn rename_preserves_column_order() {
        let store = Store::from_columns(vec![
            ("a".to_owned(), int_column(&[1])),
            ("b".to_owned(), int_column(&[2])),
        ])
        .expect("store builds");
        let out = store.rename(&[("a", "x")]).expect("a exists");
        assert_eq!(out.names(), &["x".to_owned(), "b".to_owned()]);
        assert!(out.get("a").is_none());
    }
}
