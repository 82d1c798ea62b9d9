use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use tf_frame::DataFrame;
use tf_types::compare_scalars;
use tf_view::{Group, Grouping, View};

use crate::VerbError;

/// Rows `[start, end)` of the visible window; grouped frames slice each
/// group independently and stay grouped. Out-of-range bounds clamp.
pub fn slice(df: &DataFrame, start: usize, end: usize) -> Result<DataFrame, VerbError> {
    per_block(df, move |rows| {
        let lo = start.min(rows.len());
        let hi = end.clamp(lo, rows.len());
        rows[lo..hi].to_vec()
    })
}

pub fn head(df: &DataFrame, n: usize) -> Result<DataFrame, VerbError> {
    per_block(df, move |rows| rows[..n.min(rows.len())].to_vec())
}

pub fn tail(df: &DataFrame, n: usize) -> Result<DataFrame, VerbError> {
    per_block(df, move |rows| rows[rows.len() - n.min(rows.len())..].to_vec())
}

/// The `n` rows with the smallest values of `column`, ordered by that
/// column (stable ties, missing last). Per group when grouped.
pub fn slice_min(df: &DataFrame, column: &str, n: usize) -> Result<DataFrame, VerbError> {
    slice_by_rank(df, column, n, |ordering| ordering)
}

/// Mirror of [`slice_min`]: the `n` largest values, missing still last.
pub fn slice_max(df: &DataFrame, column: &str, n: usize) -> Result<DataFrame, VerbError> {
    slice_by_rank(df, column, n, Ordering::reverse)
}

fn slice_by_rank(
    df: &DataFrame,
    column: &str,
    n: usize,
    orient: fn(Ordering) -> Ordering,
) -> Result<DataFrame, VerbError> {
    let col = df.store().column(column)?.clone();
    per_block(df, move |rows| {
        let mut rows = rows.to_vec();
        rows.sort_by(|&a, &b| {
            let left = col.value(a);
            let right = col.value(b);
            match (
                left.is_none_or(|v| v.is_missing()),
                right.is_none_or(|v| v.is_missing()),
            ) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => match (left, right) {
                    (Some(l), Some(r)) => orient(compare_scalars(l, r)),
                    _ => Ordering::Equal,
                },
            }
        });
        rows.truncate(n);
        rows
    })
}

/// Sample `n` visible rows without replacement (per group when grouped).
/// A seed makes the draw reproducible; without one the process RNG
/// decides. Sampled order is the shuffle order, as a sample should be.
pub fn sample(df: &DataFrame, n: usize, seed: Option<u64>) -> Result<DataFrame, VerbError> {
    let mut rng: Box<dyn RngCore> = match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::rng()),
    };
    per_block(df, move |rows| {
        let mut rows = rows.to_vec();
        rows.shuffle(&mut rng);
        rows.truncate(n);
        rows
    })
}

/// Shared driver for the slice family: apply `pick` to each group block
/// (or the whole visible window), concatenate in group order, and rebuild
/// the grouping over the survivors. Mask-only.
fn per_block(
    df: &DataFrame,
    mut pick: impl FnMut(&[usize]) -> Vec<usize>,
) -> Result<DataFrame, VerbError> {
    if let Some(grouping) = df.view().grouping() {
        let mut out_rows = Vec::new();
        let mut out_groups = Vec::<Group>::new();
        for group in &grouping.groups {
            let rows = pick(&group.rows);
            if rows.is_empty() {
                continue;
            }
            out_rows.extend(rows.iter().copied());
            out_groups.push(Group {
                key: group.key.clone(),
                rows,
            });
        }
        let view = View::grouped(
            out_rows,
            Grouping {
                columns: grouping.columns.clone(),
                groups: out_groups,
            },
        );
        return Ok(df.with_view(view));
    }

    let visible = df.visible_rows();
    Ok(df.with_view(View::masked(pick(&visible))))
}

#[cfg(test)]
mod tests {
    use tf_frame::DataFrame;
    use tf_types::Scalar;

    use super::{head, sample, slice, slice_max, slice_min, tail};

    fn cars() -> DataFrame {
        DataFrame::from_columns(vec![
            (
                "cyl".to_owned(),
                vec![
                    Scalar::Int64(4),
                    Scalar::Int64(6),
                    Scalar::Int64(4),
                    Scalar::Int64(6),
                    Scalar::Int64(4),
                ],
            ),
            (
                "mpg".to_owned(),
                vec![
                    Scalar::Float64(26.0),
                    Scalar::Float64(21.0),
                    Scalar::Float64(30.4),
                    Scalar::null(),
                    Scalar::Float64(22.8),
                ],
            ),
        ])
        .expect("fixture builds")
    }

    #[test]
    fn slice_clamps_out_of_range_bounds() {
        let df = cars();
        assert_eq!(slice(&df, 1, 3).expect("slice").nrows(), 2);
        assert_eq!(slice(&df, 3, 99).expect("slice").nrows(), 2);
        assert_eq!(slice(&df, 9, 12).expect("slice").nrows(), 0);
    }

    #[test]
    fn head_and_tail_keep_view_order() {
        let df = cars();
        assert_eq!(
            head(&df, 2).expect("head").values("mpg").expect("mpg"),
            vec![Scalar::Float64(26.0), Scalar::Float64(21.0)]
        );
        assert_eq!(
            tail(&df, 2).expect("tail").values("mpg").expect("mpg"),
            vec![Scalar::null(), Scalar::Float64(22.8)]
        );
    }

    #[test]
    fn slice_min_orders_by_value_and_skips_missing_first() {
        let df = cars();
        let out = slice_min(&df, "mpg", 2).expect("slice_min");
        assert_eq!(
            out.values("mpg").expect("mpg"),
            vec![Scalar::Float64(21.0), Scalar::Float64(22.8)]
        );
        // Missing never beats a present value even for the max side.
        let out = slice_max(&df, "mpg", 4).expect("slice_max");
        assert_eq!(
            out.values("mpg").expect("mpg"),
            vec![
                Scalar::Float64(30.4),
                Scalar::Float64(26.0),
                Scalar::Float64(22.8),
                Scalar::Float64(21.0),
            ]
        );
    }

    #[test]
    fn grouped_slice_min_applies_per_group_in_group_order() {
        let df = cars().group_by(&["cyl"]).expect("grouping");
        let out = slice_min(&df, "mpg", 1).expect("slice_min");
        assert!(out.is_grouped());
        assert_eq!(
            out.values("mpg").expect("mpg"),
            vec![Scalar::Float64(22.8), Scalar::Float64(21.0)]
        );
        assert_eq!(
            out.values("cyl").expect("cyl"),
            vec![Scalar::Int64(4), Scalar::Int64(6)]
        );
    }

    #[test]
    fn seeded_sample_is_reproducible() {
        let df = cars();
        let a = sample(&df, 3, Some(42)).expect("sample");
        let b = sample(&df, 3, Some(42)).expect("sample");
        assert!(a.semantic_eq(&b));
        assert_eq!(a.nrows(), 3);
    }

    #[test]
    fn grouped_sample_never_crosses_groups() {
        let df = cars().group_by(&["cyl"]).expect("grouping");
        let out = sample(&df, 1, Some(7)).expect("sample");
        assert_eq!(out.nrows(), 2);
        assert_eq!(
            out.values("cyl").expect("cyl"),
            vec![Scalar::Int64(4), Scalar::Int64(6)]
        );
    }
}
