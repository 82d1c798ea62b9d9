//! Window, ranking, and cumulative functions over value slices.
//!
//! Everything here is a pure `&[Scalar] -> Vec<Scalar>` transform so the
//! results compose with [`mutate`](crate::mutate) or stand alone;
//! [`over_groups`] runs any of them per group on a grouped frame and
//! scatters the results back to view positions.

use std::cmp::Ordering;
use std::sync::Arc;

use tf_frame::DataFrame;
use tf_types::{Scalar, SortDirection, compare_scalars};
use tf_view::regroup;

use crate::VerbError;

/// Shift values down by `offset`: row `i` takes the value `offset` rows
/// earlier. Slots with no earlier value get `default`, or `Missing(Absent)`
/// without one. A negative offset is rejected, not silently flipped.
pub fn lag(
    values: &[Scalar],
    offset: i64,
    default: Option<Scalar>,
) -> Result<Vec<Scalar>, VerbError> {
    let k = check_offset(offset)?;
    let fill = default.unwrap_or_else(Scalar::absent);
    Ok((0..values.len())
        .map(|i| {
            i.checked_sub(k)
                .map_or_else(|| fill.clone(), |j| values[j].clone())
        })
        .collect())
}

/// Mirror of [`lag`]: row `i` takes the value `offset` rows later.
pub fn lead(
    values: &[Scalar],
    offset: i64,
    default: Option<Scalar>,
) -> Result<Vec<Scalar>, VerbError> {
    let k = check_offset(offset)?;
    let fill = default.unwrap_or_else(Scalar::absent);
    Ok((0..values.len())
        .map(|i| values.get(i + k).cloned().unwrap_or_else(|| fill.clone()))
        .collect())
}

fn check_offset(offset: i64) -> Result<usize, VerbError> {
    usize::try_from(offset).map_err(|_| VerbError::NegativeOffset { offset })
}

/// Competition rank with ties averaged (`Float64` output). Missing inputs
/// produce missing outputs and never consume a rank.
#[must_use]
pub fn rank(values: &[Scalar], direction: SortDirection) -> Vec<Scalar> {
    let order = present_order(values, direction);
    let mut out = missing_passthrough(values);
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len()
            && compare_scalars(&values[order[j]], &values[order[i]]) == Ordering::Equal
        {
            j += 1;
        }
        // Ranks i+1..=j averaged across the tie run.
        let shared = (i + j + 1) as f64 / 2.0;
        for &slot in &order[i..j] {
            out[slot] = Scalar::Float64(shared);
        }
        i = j;
    }
    out
}

/// Rank with no gaps after ties (`Int64` output): distinct values get
/// consecutive ranks starting at 1.
#[must_use]
pub fn dense_rank(values: &[Scalar], direction: SortDirection) -> Vec<Scalar> {
    let order = present_order(values, direction);
    let mut out = missing_passthrough(values);
    let mut current = 0_i64;
    for (pos, &slot) in order.iter().enumerate() {
        if pos == 0
            || compare_scalars(&values[slot], &values[order[pos - 1]]) != Ordering::Equal
        {
            current += 1;
        }
        out[slot] = Scalar::Int64(current);
    }
    out
}

/// Fraction of present values the direction orders at or before each value,
/// in `(0, 1]`. Missing inputs produce missing outputs.
#[must_use]
pub fn percentile_rank(values: &[Scalar], direction: SortDirection) -> Vec<Scalar> {
    let order = present_order(values, direction);
    let n = order.len();
    let mut out = missing_passthrough(values);
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && compare_scalars(&values[order[j]], &values[order[i]]) == Ordering::Equal {
            j += 1;
        }
        let fraction = j as f64 / n as f64;
        for &slot in &order[i..j] {
            out[slot] = Scalar::Float64(fraction);
        }
        i = j;
    }
    out
}

/// Running sum (`Float64`). Missing slots stay missing and leave the
/// accumulator unchanged; a present non-numeric value is a type error.
pub fn cumsum(values: &[Scalar]) -> Result<Vec<Scalar>, VerbError> {
    numeric_scan(values, 0.0, |acc, v| acc + v)
}

/// Running product (`Float64`), same missing treatment as [`cumsum`].
pub fn cumprod(values: &[Scalar]) -> Result<Vec<Scalar>, VerbError> {
    numeric_scan(values, 1.0, |acc, v| acc * v)
}

fn numeric_scan(
    values: &[Scalar],
    seed: f64,
    step: fn(f64, f64) -> f64,
) -> Result<Vec<Scalar>, VerbError> {
    let mut acc = seed;
    values
        .iter()
        .map(|v| {
            if v.is_missing() {
                return Ok(v.clone());
            }
            acc = step(acc, v.to_f64()?);
            Ok(Scalar::Float64(acc))
        })
        .collect()
}

/// Running minimum; the winning scalar is carried as-is, no numeric
/// coercion. Missing slots stay missing and do not compete.
#[must_use]
pub fn cummin(values: &[Scalar]) -> Vec<Scalar> {
    ordering_scan(values, Ordering::Less)
}

/// Running maximum, the mirror of [`cummin`].
#[must_use]
pub fn cummax(values: &[Scalar]) -> Vec<Scalar> {
    ordering_scan(values, Ordering::Greater)
}

fn ordering_scan(values: &[Scalar], keep: Ordering) -> Vec<Scalar> {
    let mut best: Option<Scalar> = None;
    values
        .iter()
        .map(|v| {
            if v.is_missing() {
                return v.clone();
            }
            match &best {
                Some(b) if compare_scalars(v, b) != keep => {}
                _ => best = Some(v.clone()),
            }
            best.clone().unwrap_or_else(Scalar::absent)
        })
        .collect()
}

/// Apply a slice transform to `source` per group (the whole view when
/// ungrouped) and store the scattered results as column `target`. The
/// transform sees each group's values in within-group order.
pub fn over_groups(
    df: &DataFrame,
    source: &str,
    target: &str,
    f: impl Fn(&[Scalar]) -> Result<Vec<Scalar>, VerbError>,
) -> Result<DataFrame, VerbError> {
    let base = df.materialize()?;
    let store = base.store();
    let column = store.column(source)?;

    let mut out = vec![Scalar::absent(); store.len()];
    for block in base.view().blocks(store.len()) {
        let input = block
            .iter()
            .map(|&row| column.value(row).cloned().unwrap_or_else(Scalar::absent))
            .collect::<Vec<_>>();
        let result = f(&input)?;
        for (&row, value) in block.iter().zip(result) {
            out[row] = value;
        }
    }

    let store = store.with_column(target, out)?;
    let group_columns = base.grouping_columns();
    let refs = group_columns.iter().map(String::as_str).collect::<Vec<_>>();
    let view = regroup(&store, (0..store.len()).collect(), &refs)?;
    Ok(DataFrame::from_parts(Arc::new(store), view)?)
}

/// Indices of present values, stably sorted by `direction`.
fn present_order(values: &[Scalar], direction: SortDirection) -> Vec<usize> {
    let mut order = (0..values.len())
        .filter(|&i| !values[i].is_missing())
        .collect::<Vec<_>>();
    order.sort_by(|&a, &b| direction.apply(compare_scalars(&values[a], &values[b])));
    order
}

/// Output vector seeded with the input's missing markers.
fn missing_passthrough(values: &[Scalar]) -> Vec<Scalar> {
    values
        .iter()
        .map(|v| if v.is_missing() { v.clone() } else { Scalar::absent() })
        .collect()
}
