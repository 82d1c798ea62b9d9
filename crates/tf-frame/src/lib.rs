#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::{Map, Value};
use tf_columnar::{RowRef, RowValidator, Store, StoreError};
use tf_types::{NestedRow, Scalar};
use tf_view::{View, ViewError, group_by, regroup};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("expected {expected} values for the visible rows but got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// The client-facing handle: an immutable store shared through `Arc` plus
/// a view describing visibility, order, and grouping. Every verb returns a
/// new handle; mask-only verbs share the store.
#[derive(Debug, Clone)]
pub struct DataFrame {
    store: Arc<Store>,
    view: View,
}

impl DataFrame {
    pub fn from_rows(
        rows: Vec<Vec<(String, Scalar)>>,
        validator: Option<&dyn RowValidator>,
    ) -> Result<Self, FrameError> {
        let store = Store::from_rows(rows, validator)?;
        Ok(Self::from_store(store))
    }

    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Vec<Scalar>)>,
    ) -> Result<Self, FrameError> {
        Ok(Self::from_store(Store::from_columns(columns)?))
    }

    #[must_use]
    pub fn from_store(store: Store) -> Self {
        Self {
            store: Arc::new(store),
            view: View::all(),
        }
    }

    pub fn from_parts(store: Arc<Store>, view: View) -> Result<Self, FrameError> {
        view.check_against(&store)?;
        Ok(Self { store, view })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::from_store(Store::empty())
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn store_arc(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Same store, different view. The caller is responsible for only
    /// passing views built against this frame's store.
    #[must_use]
    pub fn with_view(&self, view: View) -> Self {
        Self {
            store: Arc::clone(&self.store),
            view,
        }
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.view.visible_len(self.store.len())
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.store.ncols()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.store.names()
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.view.is_grouped()
    }

    #[must_use]
    pub fn visible_rows(&self) -> Vec<usize> {
        self.view.materialize(self.store.len())
    }

    /// Column values gathered in view order.
    pub fn values(&self, name: &str) -> Result<Vec<Scalar>, FrameError> {
        let column = self.store.column(name)?;
        Ok(self
            .visible_rows()
            .iter()
            .map(|&row| column.value(row).cloned().unwrap_or_else(Scalar::absent))
            .collect())
    }

    /// The i-th visible row as owned (name, value) pairs.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<Vec<(String, Scalar)>> {
        let rows = self.visible_rows();
        rows.get(i).map(|&row| self.store.row_values(row))
    }

    #[must_use]
    pub fn row_ref(&self, store_row: usize) -> RowRef<'_> {
        self.store.row_ref(store_row)
    }

    /// Collapse the view into a fresh store holding exactly the visible
    /// rows in view order; grouping (if any) is rebuilt over the result.
    pub fn materialize(&self) -> Result<Self, FrameError> {
        if self.view.mask().is_none() && !self.view.is_grouped() {
            return Ok(self.clone());
        }
        let rows = self.visible_rows();
        let store = self.store.take_rows(&rows);
        let group_columns = self.grouping_columns();
        let refs = group_columns.iter().map(String::as_str).collect::<Vec<_>>();
        let view = regroup(&store, (0..store.len()).collect(), &refs)?;
        Ok(Self {
            store: Arc::new(store),
            view,
        })
    }

    #[must_use]
    pub fn grouping_columns(&self) -> Vec<String> {
        self.view
            .grouping()
            .map(|g| g.columns.clone())
            .unwrap_or_default()
    }

    /// The explicit replacement for in-place column assignment: a new
    /// handle whose store carries `values` under `name`, positionally
    /// aligned with the visible rows.
    pub fn with_column(&self, name: &str, values: Vec<Scalar>) -> Result<Self, FrameError> {
        if values.len() != self.nrows() {
            return Err(FrameError::LengthMismatch {
                expected: self.nrows(),
                actual: values.len(),
            });
        }
        let base = self.materialize()?;
        let store = base.store.with_column(name, values)?;
        let group_columns = base.grouping_columns();
        let refs = group_columns.iter().map(String::as_str).collect::<Vec<_>>();
        let view = regroup(&store, (0..store.len()).collect(), &refs)?;
        Ok(Self {
            store: Arc::new(store),
            view,
        })
    }

    pub fn without_columns(&self, names: &[&str]) -> Result<Self, FrameError> {
        let store = self.store.without_columns(names)?;
        Ok(self.rewrap_columns_changed(store))
    }

    pub fn select(&self, names: &[&str]) -> Result<Self, FrameError> {
        let store = self.store.select(names)?;
        Ok(self.rewrap_columns_changed(store))
    }

    pub fn rename(&self, mapping: &[(&str, &str)]) -> Result<Self, FrameError> {
        let store = self.store.rename(mapping)?;
        let mut frame = self.rewrap_columns_changed(store);
        // Follow renamed grouping columns rather than dropping the grouping.
        let old_groups = self.grouping_columns();
        if !old_groups.is_empty() && !frame.is_grouped() {
            let renamed = old_groups
                .iter()
                .map(|name| {
                    mapping
                        .iter()
                        .find(|(from, _)| from == name)
                        .map_or(name.clone(), |(_, to)| (*to).to_owned())
                })
                .collect::<Vec<_>>();
            let refs = renamed.iter().map(String::as_str).collect::<Vec<_>>();
            if refs.iter().all(|name| frame.store.has_column(name)) {
                frame = frame.group_by(&refs)?;
            }
        }
        Ok(frame)
    }

    /// Column-set changes keep the mask (store length is unchanged) and
    /// keep the grouping only while every grouping column survives.
    fn rewrap_columns_changed(&self, store: Store) -> Self {
        let group_columns = self.grouping_columns();
        let keep_grouping = !group_columns.is_empty()
            && group_columns.iter().all(|name| store.has_column(name));
        let view = if keep_grouping {
            self.view.clone()
        } else {
            self.view.ungrouped()
        };
        Self {
            store: Arc::new(store),
            view,
        }
    }

    pub fn group_by(&self, columns: &[&str]) -> Result<Self, FrameError> {
        let view = group_by(&self.store, &self.view, columns)?;
        Ok(self.with_view(view))
    }

    #[must_use]
    pub fn ungroup(&self) -> Self {
        self.with_view(self.view.ungrouped())
    }

    /// Sub-frames sharing this store, one per group in group order. Each
    /// carries the group's key tuple.
    #[must_use]
    pub fn group_frames(&self) -> Vec<(Vec<Scalar>, Self)> {
        match self.view.grouping() {
            Some(grouping) => grouping
                .groups
                .iter()
                .map(|group| {
                    (
                        group.key.clone(),
                        self.with_view(View::masked(group.rows.clone())),
                    )
                })
                .collect(),
            None => vec![(Vec::new(), self.ungroup())],
        }
    }

    /// The complete boundary contract for external readers/writers.
    #[must_use]
    pub fn to_rows(&self) -> Vec<NestedRow> {
        self.visible_rows()
            .iter()
            .map(|&row| self.store.row_values(row))
            .collect()
    }

    #[must_use]
    pub fn to_columns(&self) -> Vec<(String, Vec<Scalar>)> {
        let rows = self.visible_rows();
        self.store
            .names()
            .iter()
            .map(|name| {
                let column = self.store.get(name);
                let values = rows
                    .iter()
                    .map(|&row| {
                        column
                            .and_then(|c| c.value(row))
                            .cloned()
                            .unwrap_or_else(Scalar::absent)
                    })
                    .collect();
                (name.clone(), values)
            })
            .collect()
    }

    /// JSON encoding of the visible rows. Nested sub-frame cells expand
    /// recursively into plain row-arrays; absent cells are omitted from
    /// their row object (explicit nulls encode as JSON null).
    #[must_use]
    pub fn to_json(&self) -> Value {
        rows_to_json(&self.to_rows())
    }

    /// Visible values compare equal, column for column, row for row.
    /// Masked-out store rows never participate.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.column_names() == other.column_names() && self.to_columns() == other.to_columns()
    }
}

fn rows_to_json(rows: &[NestedRow]) -> Value {
    Value::Array(rows.iter().map(row_to_json).collect())
}

fn row_to_json(row: &NestedRow) -> Value {
    let mut object = Map::new();
    for (name, value) in row {
        if value.is_absent() {
            continue;
        }
        object.insert(name.clone(), scalar_to_json(value));
    }
    Value::Object(object)
}

fn scalar_to_json(value: &Scalar) -> Value {
    match value {
        Scalar::Missing(_) => Value::Null,
        Scalar::Bool(v) => Value::Bool(*v),
        Scalar::Int64(v) => Value::from(*v),
        // Non-finite floats have no JSON representation.
        Scalar::Float64(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Scalar::Utf8(v) => Value::String(v.clone()),
        Scalar::Nested(rows) => rows_to_json(rows),
    }
}
