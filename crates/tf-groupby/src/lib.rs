#![forbid(unsafe_code)]

//! Aggregation engine: `summarise` collapses a frame (or each group of a
//! grouped frame) into one row per reducer evaluation; `count` and
//! `cross_tabulate` are the tally sugars built on top of it.

use tf_columnar::StoreError;
use tf_frame::{DataFrame, FrameError};
use tf_reshape::{PivotWider, ReshapeError, pivot_wider};
use tf_types::{Scalar, TypeError};
use tf_view::{View, ViewError};
use thiserror::Error;

pub mod reduce;

#[derive(Debug, Error)]
pub enum GroupByError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Reshape(#[from] ReshapeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// One aggregation: sees the (sub-)frame itself, so `nrows`, column
/// access, and further verb chaining all work inside, and returns the
/// single cell for its output column. Returning a `Nested` scalar embeds
/// a whole sub-frame as the cell.
pub type Reducer = Box<dyn Fn(&DataFrame) -> Result<Scalar, GroupByError>>;

/// Collapse the frame to one row per reducer evaluation.
///
/// Ungrouped: exactly one output row over the whole view, even when zero
/// rows are visible (reducers run over the empty sub-frame and normally
/// answer with a missing marker). Grouped: one row per group in group
/// order with the grouping columns prepended; a grouping with no groups
/// yields zero rows but the full column set. Reducers observe within-group
/// row order exactly as the view established it. The result is ungrouped.
pub fn summarise(
    df: &DataFrame,
    entries: Vec<(String, Reducer)>,
) -> Result<DataFrame, GroupByError> {
    let store = df.store_arc();

    if let Some(grouping) = df.view().grouping() {
        let mut columns: Vec<(String, Vec<Scalar>)> = grouping
            .columns
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        let base = columns.len();
        for (name, _) in &entries {
            columns.push((name.clone(), Vec::new()));
        }

        for group in &grouping.groups {
            let sub = DataFrame::from_parts(store.clone(), View::masked(group.rows.clone()))?;
            for (slot, key) in group.key.iter().enumerate() {
                columns[slot].1.push(key.clone());
            }
            for (offset, (_, reducer)) in entries.iter().enumerate() {
                columns[base + offset].1.push(reducer(&sub)?);
            }
        }
        return Ok(DataFrame::from_columns(columns)?);
    }

    let mut columns = Vec::with_capacity(entries.len());
    for (name, reducer) in &entries {
        columns.push((name.clone(), vec![reducer(df)?]));
    }
    Ok(DataFrame::from_columns(columns)?)
}

/// One row per first-seen distinct combination of `columns` with its
/// visible-row count in column `n`; with no columns, a single row counting
/// everything visible. Any existing grouping is ignored.
pub fn count(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, GroupByError> {
    let flat = df.ungroup();
    let keyed = if columns.is_empty() {
        flat
    } else {
        flat.group_by(columns)?
    };
    summarise(&keyed, vec![("n".to_owned(), reduce::nrows())])
}

/// Contingency table: one row per first-seen value of `rows`, one count
/// column per first-seen value of `columns` (named via `Scalar::label`).
/// Combinations that never occur count zero rather than missing, so every
/// cell is an `Int64`. Any existing grouping is ignored.
pub fn cross_tabulate(
    df: &DataFrame,
    rows: &str,
    columns: &str,
) -> Result<DataFrame, GroupByError> {
    let tally = count(df, &[rows, columns])?;
    let wide = pivot_wider(&tally, &PivotWider::new(columns, "n"))?;
    let filled = wide.to_columns().into_iter().map(|(name, values)| {
        let values = if name == rows {
            values
        } else {
            values
                .into_iter()
                .map(|cell| {
                    if cell.is_missing() {
                        Scalar::Int64(0)
                    } else {
                        cell
                    }
                })
                .collect()
        };
        (name, values)
    });
    Ok(DataFrame::from_columns(filled)?)
}
