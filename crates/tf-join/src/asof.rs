//! Numeric as-of join: for each left row, pick the closest right row along
//! an ordering column, optionally within a tolerance and never across
//! `group_by` partitions.

use std::collections::{HashMap, HashSet};

use tf_columnar::Column;
use tf_frame::DataFrame;
use tf_types::{KeyScalar, Scalar};

use crate::JoinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsofDirection {
    /// Largest right key `<=` the left key.
    #[default]
    Backward,
    /// Smallest right key `>=` the left key.
    Forward,
    /// Whichever side is closer; exact ties resolve backward.
    Nearest,
}

#[derive(Debug, Clone)]
pub struct AsofOptions {
    pub direction: AsofDirection,
    /// Maximum |left - right| key distance; beyond it a candidate does not
    /// count as a match.
    pub tolerance: Option<f64>,
    /// Same-named partition columns on both sides; matches never cross a
    /// partition.
    pub group_by: Vec<String>,
    /// Suffix for right columns colliding with left names.
    pub suffix: String,
}

impl AsofOptions {
    #[must_use]
    pub fn new(direction: AsofDirection) -> Self {
        Self {
            direction,
            tolerance: None,
            group_by: Vec::new(),
            suffix: "_y".to_owned(),
        }
    }
}

impl Default for AsofOptions {
    fn default() -> Self {
        Self::new(AsofDirection::Backward)
    }
}

/// Left join along numeric ordering columns `left_on`/`right_on`: every
/// left row survives, paired with at most one right row per the options.
/// The output carries all left columns, then the right columns minus the
/// right ordering and partition columns, collisions suffixed.
pub fn asof_join(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &str,
    right_on: &str,
    options: &AsofOptions,
) -> Result<DataFrame, JoinError> {
    let lstore = left.store();
    let rstore = right.store();
    let left_key = lstore.column(left_on)?;
    let right_key = rstore.column(right_on)?;
    let left_parts = partition_columns(left, &options.group_by)?;
    let right_parts = partition_columns(right, &options.group_by)?;

    // Right rows bucketed by partition, each bucket stably ordered by key.
    let mut buckets = HashMap::<Vec<KeyScalar>, Vec<(f64, usize)>>::new();
    for row in right.visible_rows() {
        let Some(key) = numeric_key(right_key, row)? else {
            continue;
        };
        buckets
            .entry(partition_key(&right_parts, row))
            .or_default()
            .push((key, row));
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    let mut picks = Vec::<Option<usize>>::new();
    let mut lrows = Vec::<usize>::new();
    for row in left.visible_rows() {
        lrows.push(row);
        let Some(target) = numeric_key(left_key, row)? else {
            picks.push(None);
            continue;
        };
        let pick = buckets
            .get(&partition_key(&left_parts, row))
            .and_then(|bucket| pick_in(bucket, target, options));
        picks.push(pick);
    }

    assemble_asof(left, right, &lrows, &picks, right_on, options)
}

fn pick_in(bucket: &[(f64, usize)], target: f64, options: &AsofOptions) -> Option<usize> {
    // First slot strictly above the target; everything before it is <=.
    let split = bucket.partition_point(|(key, _)| *key <= target);
    let backward = split.checked_sub(1).map(|i| bucket[i]);
    let forward = bucket.get(split).copied();

    let within = |candidate: (f64, usize)| -> Option<(f64, usize)> {
        let distance = (candidate.0 - target).abs();
        match options.tolerance {
            Some(tolerance) if distance > tolerance => None,
            _ => Some(candidate),
        }
    };

    let chosen = match options.direction {
        AsofDirection::Backward => backward.and_then(within),
        AsofDirection::Forward => forward.and_then(within),
        AsofDirection::Nearest => match (backward.and_then(within), forward.and_then(within)) {
            (Some(b), Some(f)) => {
                if (f.0 - target).abs() < (target - b.0).abs() {
                    Some(f)
                } else {
                    Some(b)
                }
            }
            (one, other) => one.or(other),
        },
    };
    chosen.map(|(_, row)| row)
}

fn numeric_key(column: &Column, row: usize) -> Result<Option<f64>, JoinError> {
    match column.value(row) {
        Some(cell) if cell.is_missing() => Ok(None),
        Some(cell) => Ok(Some(cell.to_f64()?)),
        None => Ok(None),
    }
}

fn partition_columns<'a>(
    df: &'a DataFrame,
    names: &[String],
) -> Result<Vec<&'a Column>, JoinError> {
    names
        .iter()
        .map(|name| Ok(df.store().column(name)?))
        .collect()
}

fn partition_key(columns: &[&Column], row: usize) -> Vec<KeyScalar> {
    columns
        .iter()
        .map(|column| {
            column
                .value(row)
                .map_or(KeyScalar::from_scalar(&Scalar::absent()), |cell| {
                    KeyScalar::from_scalar(cell)
                })
        })
        .collect()
}

fn assemble_asof(
    left: &DataFrame,
    right: &DataFrame,
    lrows: &[usize],
    picks: &[Option<usize>],
    right_on: &str,
    options: &AsofOptions,
) -> Result<DataFrame, JoinError> {
    let lstore = left.store();
    let rstore = right.store();
    let dropped = options
        .group_by
        .iter()
        .map(String::as_str)
        .chain([right_on])
        .collect::<HashSet<_>>();

    let mut columns = Vec::<(String, Vec<Scalar>)>::new();
    for name in lstore.names() {
        let column = lstore.column(name)?;
        let values = lrows
            .iter()
            .map(|&row| column.value(row).cloned().unwrap_or_else(Scalar::absent))
            .collect();
        columns.push((name.clone(), values));
    }
    for name in rstore.names() {
        if dropped.contains(name.as_str()) {
            continue;
        }
        let gathered = rstore.column(name)?.gather(picks);
        let out_name = if lstore.has_column(name) {
            format!("{name}{}", options.suffix)
        } else {
            name.clone()
        };
        columns.push((out_name, gathered.values().to_vec()));
    }
    Ok(DataFrame::from_columns(columns)?)
}
