#![forbid(unsafe_code)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tf_columnar::{Store, StoreError};
use tf_types::{KeyScalar, Scalar};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("row index {index} is out of bounds for a store of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// One bucket of a grouping: the distinct key tuple and the store row
/// indices that carry it, in view order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: Vec<Scalar>,
    pub rows: Vec<usize>,
}

/// Ordered partition of a view's visible rows. Group order is first
/// appearance of each distinct key tuple while scanning the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub columns: Vec<String>,
    pub groups: Vec<Group>,
}

/// A logical, copy-free window over a store: which rows are visible, in
/// what order, and optionally how they partition into groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct View {
    rows: Option<Vec<usize>>,
    grouping: Option<Grouping>,
}

impl View {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn masked(rows: Vec<usize>) -> Self {
        Self {
            rows: Some(rows),
            grouping: None,
        }
    }

    /// A masked view carrying an already-built grouping. The caller
    /// guarantees the groups partition exactly the masked rows.
    #[must_use]
    pub fn grouped(rows: Vec<usize>, grouping: Grouping) -> Self {
        Self {
            rows: Some(rows),
            grouping: Some(grouping),
        }
    }

    #[must_use]
    pub fn mask(&self) -> Option<&[usize]> {
        self.rows.as_deref()
    }

    #[must_use]
    pub fn grouping(&self) -> Option<&Grouping> {
        self.grouping.as_ref()
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.grouping.is_some()
    }

    /// Visible row indices in view order.
    #[must_use]
    pub fn materialize(&self, store_len: usize) -> Vec<usize> {
        match &self.rows {
            Some(rows) => rows.clone(),
            None => (0..store_len).collect(),
        }
    }

    #[must_use]
    pub fn visible_len(&self, store_len: usize) -> usize {
        match &self.rows {
            Some(rows) => rows.len(),
            None => store_len,
        }
    }

    /// Drop any grouping, keeping the mask.
    #[must_use]
    pub fn ungrouped(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            grouping: None,
        }
    }

    /// Every index in the mask and in every group must address a store row.
    pub fn check_against(&self, store: &Store) -> Result<(), ViewError> {
        let len = store.len();
        if let Some(rows) = &self.rows {
            for index in rows {
                if *index >= len {
                    return Err(ViewError::IndexOutOfBounds { index: *index, len });
                }
            }
        }
        if let Some(grouping) = &self.grouping {
            for name in &grouping.columns {
                if !store.has_column(name) {
                    return Err(ViewError::Store(store.unknown_column(name)));
                }
            }
            for group in &grouping.groups {
                for index in &group.rows {
                    if *index >= len {
                        return Err(ViewError::IndexOutOfBounds { index: *index, len });
                    }
                }
            }
        }
        Ok(())
    }

    /// Per-group row blocks in group order, or one block of all visible
    /// rows when ungrouped. The unit the group-aware verbs iterate over.
    #[must_use]
    pub fn blocks(&self, store_len: usize) -> Vec<Vec<usize>> {
        match &self.grouping {
            Some(grouping) => grouping.groups.iter().map(|g| g.rows.clone()).collect(),
            None => vec![self.materialize(store_len)],
        }
    }
}

/// Attach a grouping to a view, scanning visible rows in view order and
/// bucketing by first-seen key tuple.
pub fn group_by(store: &Store, view: &View, columns: &[&str]) -> Result<View, ViewError> {
    let key_columns = columns
        .iter()
        .map(|name| store.column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let visible = view.materialize(store.len());
    let mut buckets = HashMap::<Vec<KeyScalar>, usize>::new();
    let mut groups = Vec::<Group>::new();

    for &row in &visible {
        let key_values = key_columns
            .iter()
            .map(|column| {
                column
                    .value(row)
                    .cloned()
                    .unwrap_or_else(Scalar::absent)
            })
            .collect::<Vec<_>>();
        let key = key_values
            .iter()
            .map(KeyScalar::from_scalar)
            .collect::<Vec<_>>();

        match buckets.get(&key) {
            Some(&slot) => groups[slot].rows.push(row),
            None => {
                buckets.insert(key, groups.len());
                groups.push(Group {
                    key: key_values,
                    rows: vec![row],
                });
            }
        }
    }

    Ok(View {
        rows: Some(visible),
        grouping: Some(Grouping {
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            groups,
        }),
    })
}

/// Rebuild a view over `rows` (already in the desired order), regrouping by
/// `columns`. Used after verbs that materialize or reorder rows.
pub fn regroup(store: &Store, rows: Vec<usize>, columns: &[&str]) -> Result<View, ViewError> {
    let masked = View::masked(rows);
    if columns.is_empty() {
        return Ok(masked);
    }
    group_by(store, &masked, columns)
}
