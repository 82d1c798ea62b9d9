//! Async twins of the row verbs. Each one snapshots the rows it needs,
//! fans out through the scheduler, then reuses the synchronous verb (or
//! the synchronous assembly) so the materialized result is exactly what
//! the sync path would have produced.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tf_frame::DataFrame;
use tf_types::Scalar;
use tf_verbs::{Mutation, for_each_row};

use crate::scheduler::run_units;
use crate::{AsyncError, AsyncOptions, OwnedRow, UnitError};

/// Async reducer for [`summarise_async`]: owns its sub-frame so the unit
/// can cross a task boundary.
pub type AsyncReducer =
    Arc<dyn Fn(DataFrame) -> BoxFuture<'static, Result<Scalar, UnitError>> + Send + Sync>;

/// One unit per visible row; the computed column lands exactly where the
/// synchronous `mutate` would put it, whatever order the units finished.
pub async fn mutate_async<F, Fut>(
    df: &DataFrame,
    name: &str,
    f: F,
    options: &AsyncOptions,
) -> Result<DataFrame, AsyncError>
where
    F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Scalar, UnitError>> + Send + 'static,
{
    // Mask order, matching how the sync mutate walks the materialized rows.
    let rows = df
        .visible_rows()
        .into_iter()
        .enumerate()
        .map(|(position, row)| (df.store().row_values(row), position))
        .collect::<Vec<_>>();
    let values = run_row_units(rows, f, options).await?;
    Ok(tf_verbs::mutate_one(df, name, Mutation::values(values))?)
}

/// One unit per visible row deciding keep/drop; the surviving mask (and
/// any grouping) matches the synchronous `filter`.
pub async fn filter_async<F, Fut>(
    df: &DataFrame,
    pred: F,
    options: &AsyncOptions,
) -> Result<DataFrame, AsyncError>
where
    F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, UnitError>> + Send + 'static,
{
    let decisions = run_row_units(block_order_rows(df), pred, options).await?;
    Ok(tf_verbs::filter(df, |_, position| decisions[position])?)
}

/// Visit every visible row concurrently; completion order is unspecified
/// but every row is visited exactly once (or the pipeline rejects).
pub async fn for_each_row_async<F, Fut>(
    df: &DataFrame,
    f: F,
    options: &AsyncOptions,
) -> Result<(), AsyncError>
where
    F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    run_row_units(block_order_rows(df), f, options).await?;
    Ok(())
}

/// Row snapshots in the order the sync `filter`/`for_each_row` would visit
/// them (grouped: group order, then within-group order).
fn block_order_rows(df: &DataFrame) -> Vec<(Vec<(String, Scalar)>, usize)> {
    let mut rows = Vec::new();
    for_each_row(df, |row, position| rows.push((row.to_owned_row(), position)));
    rows
}

async fn run_row_units<T, F, Fut>(
    rows: Vec<(Vec<(String, Scalar)>, usize)>,
    f: F,
    options: &AsyncOptions,
) -> Result<Vec<T>, AsyncError>
where
    T: Send + 'static,
    F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, UnitError>> + Send + 'static,
{
    let f = Arc::new(f);
    let units = rows
        .into_iter()
        .map(|(cells, position)| {
            let f = Arc::clone(&f);
            move || f(OwnedRow::new(cells.clone()), position)
        })
        .collect::<Vec<_>>();
    run_units(units, options).await
}

/// One unit per (group × reducer); ungrouped frames count as one group.
/// Assembly matches the synchronous `summarise`: grouping columns
/// prepended, one row per group in group order, ungrouped output.
pub async fn summarise_async(
    df: &DataFrame,
    entries: Vec<(String, AsyncReducer)>,
    options: &AsyncOptions,
) -> Result<DataFrame, AsyncError> {
    let grouping = df.view().grouping().cloned();
    let subs = df
        .group_frames()
        .into_iter()
        .map(|(_, sub)| sub)
        .collect::<Vec<_>>();

    let mut units = Vec::with_capacity(subs.len() * entries.len());
    for sub in &subs {
        for (_, reducer) in &entries {
            let reducer = Arc::clone(reducer);
            let sub = sub.clone();
            units.push(move || reducer(sub.clone()));
        }
    }
    let cells = run_units(units, options).await?;

    let width = entries.len();
    let mut columns: Vec<(String, Vec<Scalar>)> = match &grouping {
        Some(grouping) => grouping
            .columns
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect(),
        None => Vec::new(),
    };
    let base = columns.len();
    for (name, _) in &entries {
        columns.push((name.clone(), Vec::new()));
    }

    let group_count = match &grouping {
        Some(grouping) => grouping.groups.len(),
        None => 1,
    };
    for group_idx in 0..group_count {
        if let Some(grouping) = &grouping {
            for (slot, key) in grouping.groups[group_idx].key.iter().enumerate() {
                columns[slot].1.push(key.clone());
            }
        }
        for offset in 0..width {
            columns[base + offset]
                .1
                .push(cells[group_idx * width + offset].clone());
        }
    }

    Ok(DataFrame::from_columns(columns)?)
}
