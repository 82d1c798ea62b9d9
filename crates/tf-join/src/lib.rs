#![forbid(unsafe_code)]

//! Join engine: keyed hash joins (inner/left/right/outer), the cross
//! product, and numeric as-of joins.
//!
//! All variants consume the inputs' views: only visible rows participate,
//! in view order, and the output is a fresh ungrouped frame. Missing-valued
//! keys never match; the variants that keep unmatched rows still surface
//! them, with the other side absent.

use std::collections::{HashMap, HashSet};

use tf_columnar::{Column, StoreError};
use tf_frame::{DataFrame, FrameError};
use tf_types::{KeyScalar, Scalar, TypeError};
use tf_view::ViewError;
use thiserror::Error;

mod asof;

pub use asof::{AsofDirection, AsofOptions, asof_join};

#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// Left-to-right key column pairing. `same` joins on identically named
/// columns; `mapped` gives an explicit left→right mapping. The output
/// carries key columns under their left names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeys {
    pairs: Vec<(String, String)>,
}

impl JoinKeys {
    #[must_use]
    pub fn same(columns: &[&str]) -> Self {
        Self {
            pairs: columns
                .iter()
                .map(|c| ((*c).to_owned(), (*c).to_owned()))
                .collect(),
        }
    }

    #[must_use]
    pub fn mapped(pairs: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs
                .iter()
                .map(|(l, r)| ((*l).to_owned(), (*r).to_owned()))
                .collect(),
        }
    }
}

/// Collision policy for non-key columns sharing a name across inputs.
/// Without suffixes the right side's column wins and the left copy is
/// dropped; with suffixes both survive, each under its suffixed name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOptions {
    pub suffixes: Option<(String, String)>,
}

impl JoinOptions {
    #[must_use]
    pub fn suffixed(left: &str, right: &str) -> Self {
        Self {
            suffixes: Some((left.to_owned(), right.to_owned())),
        }
    }
}

pub fn inner_join(
    left: &DataFrame,
    right: &DataFrame,
    keys: &JoinKeys,
    options: &JoinOptions,
) -> Result<DataFrame, JoinError> {
    let pairs = match_pairs(left, right, keys, false)?;
    assemble(left, right, &pairs, keys, options)
}

/// Every left row survives; unmatched left rows carry an absent right side.
pub fn left_join(
    left: &DataFrame,
    right: &DataFrame,
    keys: &JoinKeys,
    options: &JoinOptions,
) -> Result<DataFrame, JoinError> {
    let pairs = match_pairs(left, right, keys, true)?;
    assemble(left, right, &pairs, keys, options)
}

/// Mirror of [`left_join`]: probes left-by-right so every right row
/// survives, output in right view order.
pub fn right_join(
    left: &DataFrame,
    right: &DataFrame,
    keys: &JoinKeys,
    options: &JoinOptions,
) -> Result<DataFrame, JoinError> {
    let swapped = JoinKeys {
        pairs: keys.pairs.iter().map(|(l, r)| (r.clone(), l.clone())).collect(),
    };
    let mirrored = match_pairs(right, left, &swapped, true)?;
    let pairs = mirrored
        .iter()
        .map(|(r, l)| (*l, *r))
        .collect::<Vec<_>>();
    assemble(left, right, &pairs, keys, options)
}

/// Both sides' unmatched rows survive: left-join pairs first, then the
/// right rows no left row reached, in right view order.
pub fn outer_join(
    left: &DataFrame,
    right: &DataFrame,
    keys: &JoinKeys,
    options: &JoinOptions,
) -> Result<DataFrame, JoinError> {
    let mut pairs = match_pairs(left, right, keys, true)?;
    let reached = pairs
        .iter()
        .filter_map(|(_, r)| *r)
        .collect::<HashSet<_>>();
    for row in right.visible_rows() {
        if !reached.contains(&row) {
            pairs.push((None, Some(row)));
        }
    }
    assemble(left, right, &pairs, keys, options)
}

/// Full left×right product in left-major, right-minor order. `max_rows`
/// truncates the product in that order.
pub fn cross_join(
    left: &DataFrame,
    right: &DataFrame,
    max_rows: Option<usize>,
    options: &JoinOptions,
) -> Result<DataFrame, JoinError> {
    let cap = max_rows.unwrap_or(usize::MAX);
    let mut pairs = Vec::new();
    'product: for l in left.visible_rows() {
        for r in right.visible_rows() {
            if pairs.len() == cap {
                break 'product;
            }
            pairs.push((Some(l), Some(r)));
        }
    }
    assemble(left, right, &pairs, &JoinKeys { pairs: Vec::new() }, options)
}

/// One `(left, right)` slot pair per output row. `None` marks the side a
/// row has no partner on.
type Pairs = Vec<(Option<usize>, Option<usize>)>;

/// Hash join core: index the probe side by key tuple (probe view order
/// preserved within a key), then sweep the drive side in view order,
/// emitting one pair per match. Rows whose key tuple contains a missing
/// cell never enter the index and never match.
fn match_pairs(
    drive: &DataFrame,
    probe: &DataFrame,
    keys: &JoinKeys,
    keep_unmatched: bool,
) -> Result<Pairs, JoinError> {
    let drive_cols = key_columns(drive, keys.pairs.iter().map(|(l, _)| l.as_str()))?;
    let probe_cols = key_columns(probe, keys.pairs.iter().map(|(_, r)| r.as_str()))?;

    let mut index = HashMap::<Vec<KeyScalar>, Vec<usize>>::new();
    for row in probe.visible_rows() {
        if let Some(key) = row_key(&probe_cols, row) {
            index.entry(key).or_default().push(row);
        }
    }

    let mut pairs = Pairs::new();
    for row in drive.visible_rows() {
        let matches = row_key(&drive_cols, row).and_then(|key| index.get(&key));
        match matches {
            Some(found) => pairs.extend(found.iter().map(|&p| (Some(row), Some(p)))),
            None if keep_unmatched => pairs.push((Some(row), None)),
            None => {}
        }
    }
    Ok(pairs)
}

fn key_columns<'a>(
    df: &'a DataFrame,
    names: impl Iterator<Item = &'a str>,
) -> Result<Vec<&'a Column>, JoinError> {
    names
        .map(|name| Ok(df.store().column(name)?))
        .collect::<Result<Vec<_>, JoinError>>()
}

/// `None` when any key cell is missing; such rows never match.
fn row_key(columns: &[&Column], row: usize) -> Option<Vec<KeyScalar>> {
    let mut key = Vec::with_capacity(columns.len());
    for column in columns {
        let cell = column.value(row)?;
        if cell.is_missing() {
            return None;
        }
        key.push(KeyScalar::from_scalar(cell));
    }
    Some(key)
}

/// Build the output frame from slot pairs: key columns first-class under
/// their left names (filled from whichever side is present), then left
/// non-key columns, then right non-key columns, collisions resolved per
/// [`JoinOptions`].
fn assemble(
    left: &DataFrame,
    right: &DataFrame,
    pairs: &Pairs,
    keys: &JoinKeys,
    options: &JoinOptions,
) -> Result<DataFrame, JoinError> {
    let lstore = left.store();
    let rstore = right.store();
    let lpos = pairs.iter().map(|(l, _)| *l).collect::<Vec<_>>();
    let rpos = pairs.iter().map(|(_, r)| *r).collect::<Vec<_>>();

    let right_key_names = keys
        .pairs
        .iter()
        .map(|(_, r)| r.as_str())
        .collect::<HashSet<_>>();
    let right_nonkey = rstore
        .names()
        .iter()
        .filter(|name| !right_key_names.contains(name.as_str()))
        .collect::<Vec<_>>();
    let collisions = right_nonkey
        .iter()
        .filter(|name| lstore.has_column(name))
        .map(|name| (*name).clone())
        .collect::<HashSet<_>>();

    let mut columns = Vec::<(String, Vec<Scalar>)>::new();
    for name in lstore.names() {
        if let Some((_, right_name)) = keys.pairs.iter().find(|(l, _)| l == name) {
            let lcol = lstore.column(name)?;
            let rcol = rstore.column(right_name)?;
            let values = pairs
                .iter()
                .map(|(l, r)| match (l, r) {
                    (Some(l), _) => lcol.value(*l).cloned().unwrap_or_else(Scalar::absent),
                    (None, Some(r)) => rcol.value(*r).cloned().unwrap_or_else(Scalar::absent),
                    (None, None) => Scalar::absent(),
                })
                .collect();
            columns.push((name.clone(), values));
            continue;
        }
        let gathered = lstore.column(name)?.gather(&lpos);
        if collisions.contains(name) {
            match &options.suffixes {
                Some((ls, _)) => {
                    columns.push((format!("{name}{ls}"), gathered.values().to_vec()));
                }
                // Right overrides: the left copy is dropped outright.
                None => {}
            }
            continue;
        }
        columns.push((name.clone(), gathered.values().to_vec()));
    }

    for name in right_nonkey {
        let gathered = rstore.column(name)?.gather(&rpos);
        let out_name = match (&options.suffixes, collisions.contains(name)) {
            (Some((_, rs)), true) => format!("{name}{rs}"),
            _ => name.clone(),
        };
        columns.push((out_name, gathered.values().to_vec()));
    }

    Ok(DataFrame::from_columns(columns)?)
}

#[cfg(test)]
mod tests {
    use tf_frame::DataFrame;
    use tf_types::Scalar;

    use super::{
        JoinKeys, JoinOptions, cross_join, inner_join, left_join, outer_join, right_join,
    };

    fn utf8(values: &[&str]) -> Vec<Scalar> {
        values.iter().map(|s| Scalar::Utf8((*s).to_owned())).collect()
    }

    fn orders() -> DataFrame {
        DataFrame::from_columns(vec![
            ("customer".to_owned(), utf8(&["ann", "ann", "bob", "eve"])),
            (
                "amount".to_owned(),
                vec![
                    Scalar::Int64(5),
                    Scalar::Int64(7),
                    Scalar::Int64(3),
                    Scalar::Int64(9),
                ],
            ),
        ])
        .expect("fixture builds")
    }

    fn cities() -> DataFrame {
        DataFrame::from_columns(vec![
            ("customer".to_owned(), utf8(&["ann", "bob", "kim"])),
            ("city".to_owned(), utf8(&["oslo", "lyon", "kyiv"])),
        ])
        .expect("fixture builds")
    }

    #[test]
    fn inner_join_amplifies_cardinality() {
        let out = inner_join(
            &orders(),
            &cities(),
            &JoinKeys::same(&["customer"]),
            &JoinOptions::default(),
        )
        .expect("join");
        assert_eq!(out.nrows(), 3);
        assert_eq!(
            out.values("city").expect("city"),
            utf8(&["oslo", "oslo", "lyon"])
        );
    }

    #[test]
    fn left_join_keeps_unmatched_left_rows_absent_right() {
        let out = left_join(
            &orders(),
            &cities(),
            &JoinKeys::same(&["customer"]),
            &JoinOptions::default(),
        )
        .expect("join");
        assert_eq!(out.nrows(), 4);
        assert!(out.values("city").expect("city")[3].is_absent());
    }

    #[test]
    fn right_join_mirrors_in_right_view_order() {
        let out = right_join(
            &orders(),
            &cities(),
            &JoinKeys::same(&["customer"]),
            &JoinOptions::default(),
        )
        .expect("join");
        assert_eq!(
            out.values("customer").expect("customer"),
            utf8(&["ann", "ann", "bob", "kim"])
        );
        assert!(out.values("amount").expect("amount")[3].is_absent());
    }

    #[test]
    fn outer_join_keeps_both_sides() {
        let out = outer_join(
            &orders(),
            &cities(),
            &JoinKeys::same(&["customer"]),
            &JoinOptions::default(),
        )
        .expect("join");
        // 3 matches + unmatched eve + unmatched kim.
        assert_eq!(out.nrows(), 5);
        assert_eq!(
            out.values("customer").expect("customer"),
            utf8(&["ann", "ann", "bob", "eve", "kim"])
        );
    }

    #[test]
    fn missing_keys_never_match_but_left_join_keeps_them() {
        let left = DataFrame::from_columns(vec![(
            "k".to_owned(),
            vec![Scalar::Int64(1), Scalar::null()],
        )])
        .expect("left");
        let right = DataFrame::from_columns(vec![
            ("k".to_owned(), vec![Scalar::Int64(1), Scalar::null()]),
            ("v".to_owned(), vec![Scalar::Int64(10), Scalar::Int64(20)]),
        ])
        .expect("right");

        let inner = inner_join(
            &left,
            &right,
            &JoinKeys::same(&["k"]),
            &JoinOptions::default(),
        )
        .expect("inner");
        assert_eq!(inner.nrows(), 1);

        let kept = left_join(
            &left,
            &right,
            &JoinKeys::same(&["k"]),
            &JoinOptions::default(),
        )
        .expect("left");
        assert_eq!(kept.nrows(), 2);
        assert!(kept.values("v").expect("v")[1].is_absent());
    }

    #[test]
    fn collision_default_is_right_overrides() {
        let left = DataFrame::from_columns(vec![
            ("k".to_owned(), vec![Scalar::Int64(1)]),
            ("v".to_owned(), vec![Scalar::Int64(1)]),
        ])
        .expect("left");
        let right = DataFrame::from_columns(vec![
            ("k".to_owned(), vec![Scalar::Int64(1)]),
            ("v".to_owned(), vec![Scalar::Int64(2)]),
        ])
        .expect("right");

        let out = inner_join(
            &left,
            &right,
            &JoinKeys::same(&["k"]),
            &JoinOptions::default(),
        )
        .expect("join");
        assert_eq!(out.values("v").expect("v"), vec![Scalar::Int64(2)]);

        let suffixed = inner_join(
            &left,
            &right,
            &JoinKeys::same(&["k"]),
            &JoinOptions::suffixed("_x", "_y"),
        )
        .expect("join");
        assert_eq!(suffixed.values("v_x").expect("v_x"), vec![Scalar::Int64(1)]);
        assert_eq!(suffixed.values("v_y").expect("v_y"), vec![Scalar::Int64(2)]);
    }

    #[test]
    fn mapped_keys_join_differently_named_columns() {
        let right = DataFrame::from_columns(vec![
            ("name".to_owned(), utf8(&["ann", "bob"])),
            ("city".to_owned(), utf8(&["oslo", "lyon"])),
        ])
        .expect("right");
        let out = inner_join(
            &orders(),
            &right,
            &JoinKeys::mapped(&[("customer", "name")]),
            &JoinOptions::default(),
        )
        .expect("join");
        assert_eq!(out.nrows(), 3);
        assert!(out.store().has_column("customer"));
        assert!(!out.store().has_column("name"));
    }

    #[test]
    fn cross_join_truncates_left_major() {
        let left = DataFrame::from_columns(vec![(
            "a".to_owned(),
            vec![Scalar::Int64(1), Scalar::Int64(2)],
        )])
        .expect("left");
        let right = DataFrame::from_columns(vec![(
            "b".to_owned(),
            vec![Scalar::Int64(10), Scalar::Int64(20)],
        )])
        .expect("right");

        let out = cross_join(&left, &right, Some(3), &JoinOptions::default()).expect("cross");
        assert_eq!(out.nrows(), 3);
        assert_eq!(
            out.values("a").expect("a"),
            vec![Scalar::Int64(1), Scalar::Int64(1), Scalar::Int64(2)]
        );
        assert_eq!(
            out.values("b").expect("b"),
            vec![Scalar::Int64(10), Scalar::Int64(20), Scalar::Int64(10)]
        );
    }
}
