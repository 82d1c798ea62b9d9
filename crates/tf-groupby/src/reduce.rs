//! Stock reducers. Each constructor captures its column name and returns
//! a boxed [`Reducer`](crate::Reducer); missing cells are skipped, and a
//! reducer with nothing to aggregate answers with an explicit null rather
//! than failing.

use std::cmp::Ordering;

use tf_types::{Scalar, compare_scalars};

use crate::Reducer;

/// Visible row count, the reducer behind `count`.
#[must_use]
pub fn nrows() -> Reducer {
    Box::new(|sub| Ok(Scalar::Int64(sub.nrows() as i64)))
}

/// Sum of the column's present numeric values.
#[must_use]
pub fn sum(column: &str) -> Reducer {
    fold_numeric(column, |values| values.iter().sum())
}

/// Arithmetic mean of the present numeric values.
#[must_use]
pub fn mean(column: &str) -> Reducer {
    fold_numeric(column, |values| {
        values.iter().sum::<f64>() / values.len() as f64
    })
}

fn fold_numeric(column: &str, fold: fn(&[f64]) -> f64) -> Reducer {
    let column = column.to_owned();
    Box::new(move |sub| {
        let mut values = Vec::new();
        for cell in sub.values(&column)? {
            if !cell.is_missing() {
                values.push(cell.to_f64()?);
            }
        }
        if values.is_empty() {
            return Ok(Scalar::null());
        }
        Ok(Scalar::Float64(fold(&values)))
    })
}

/// Smallest present value, carried as-is (no numeric coercion).
#[must_use]
pub fn min(column: &str) -> Reducer {
    extremum(column, Ordering::Less)
}

/// Largest present value.
#[must_use]
pub fn max(column: &str) -> Reducer {
    extremum(column, Ordering::Greater)
}

fn extremum(column: &str, keep: Ordering) -> Reducer {
    let column = column.to_owned();
    Box::new(move |sub| {
        let mut best: Option<Scalar> = None;
        for cell in sub.values(&column)? {
            if cell.is_missing() {
                continue;
            }
            match &best {
                Some(b) if compare_scalars(&cell, b) != keep => {}
                _ => best = Some(cell),
            }
        }
        Ok(best.unwrap_or_else(Scalar::null))
    })
}

/// First visible value in view order, missing or not.
#[must_use]
pub fn first(column: &str) -> Reducer {
    let column = column.to_owned();
    Box::new(move |sub| {
        Ok(sub
            .values(&column)?
            .into_iter()
            .next()
            .unwrap_or_else(Scalar::null))
    })
}

/// Last visible value in view order.
#[must_use]
pub fn last(column: &str) -> Reducer {
    let column = column.to_owned();
    Box::new(move |sub| {
        Ok(sub
            .values(&column)?
            .into_iter()
            .next_back()
            .unwrap_or_else(Scalar::null))
    })
}
