#![forbid(unsafe_code)]

//! Reshape engine: long↔wide pivots, whole-frame transposition, and row
//! concatenation. Every operation consumes the input's view and produces a
//! fresh ungrouped frame.

use std::collections::{HashMap, HashSet};

use tf_columnar::StoreError;
use tf_frame::{DataFrame, FrameError};
use tf_types::{KeyScalar, Scalar, key_tuple};
use tf_view::ViewError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error(
        "expected_columns does not match the data: missing [{}], extra [{}]",
        missing.join(", "),
        extra.join(", ")
    )]
    ExpectedColumnsMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },
    #[error(
        "{count} values collide for key ({key}) under name {name:?}; supply a values_fn to aggregate them"
    )]
    AmbiguousCell {
        key: String,
        name: String,
        count: usize,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// Long-to-wide pivot configuration. `names_from` values become output
/// column names (first-seen order, optionally prefixed); `values_from`
/// cells fill them. Remaining columns identify output rows.
pub struct PivotWider {
    pub names_from: String,
    pub values_from: String,
    /// When given, must equal the distinct `names_from` label set
    /// (order-insensitive); a mismatch is rejected naming the missing and
    /// extra labels. Compared before `names_prefix` applies.
    pub expected_columns: Option<Vec<String>>,
    /// Aggregates colliding cells for one (row, name) slot. Without it,
    /// more than one colliding value is an error.
    pub values_fn: Option<Box<dyn Fn(&[Scalar]) -> Scalar>>,
    pub names_prefix: Option<String>,
}

impl PivotWider {
    #[must_use]
    pub fn new(names_from: impl Into<String>, values_from: impl Into<String>) -> Self {
        Self {
            names_from: names_from.into(),
            values_from: values_from.into(),
            expected_columns: None,
            values_fn: None,
            names_prefix: None,
        }
    }
}

pub fn pivot_wider(df: &DataFrame, spec: &PivotWider) -> Result<DataFrame, ReshapeError> {
    let store = df.store();
    let names_col = store.column(&spec.names_from)?;
    let values_col = store.column(&spec.values_from)?;

    let id_names = store
        .names()
        .iter()
        .filter(|n| **n != spec.names_from && **n != spec.values_from)
        .cloned()
        .collect::<Vec<_>>();
    let id_cols = id_names
        .iter()
        .map(|n| store.column(n))
        .collect::<Result<Vec<_>, _>>()?;

    // First-seen output rows by id tuple, first-seen output columns by label.
    let mut row_slots = HashMap::<Vec<KeyScalar>, usize>::new();
    let mut row_keys = Vec::<Vec<Scalar>>::new();
    let mut label_slots = HashMap::<String, usize>::new();
    let mut labels = Vec::<String>::new();
    let mut cells = HashMap::<(usize, usize), Vec<Scalar>>::new();

    for row in df.visible_rows() {
        let key = id_cols
            .iter()
            .map(|c| c.value(row).cloned().unwrap_or_else(Scalar::absent))
            .collect::<Vec<_>>();
        let hashable = key_tuple(&key.iter().collect::<Vec<_>>());
        let slot = *row_slots.entry(hashable).or_insert_with(|| {
            row_keys.push(key);
            row_keys.len() - 1
        });

        let label = names_col
            .value(row)
            .cloned()
            .unwrap_or_else(Scalar::absent)
            .label();
        let column = *label_slots.entry(label.clone()).or_insert_with(|| {
            labels.push(label);
            labels.len() - 1
        });

        cells
            .entry((slot, column))
            .or_default()
            .push(values_col.value(row).cloned().unwrap_or_else(Scalar::absent));
    }

    if let Some(expected) = &spec.expected_columns {
        check_expected(expected, &labels)?;
    }

    let mut columns = Vec::<(String, Vec<Scalar>)>::new();
    for (idx, name) in id_names.iter().enumerate() {
        let values = row_keys.iter().map(|key| key[idx].clone()).collect();
        columns.push((name.clone(), values));
    }
    for (column, label) in labels.iter().enumerate() {
        let mut values = Vec::with_capacity(row_keys.len());
        for slot in 0..row_keys.len() {
            let cell = match cells.get(&(slot, column)) {
                None => Scalar::absent(),
                Some(bucket) if bucket.len() == 1 => bucket[0].clone(),
                Some(bucket) => match &spec.values_fn {
                    Some(f) => f(bucket),
                    None => {
                        return Err(ReshapeError::AmbiguousCell {
                            key: row_keys[slot]
                                .iter()
                                .map(Scalar::label)
                                .collect::<Vec<_>>()
                                .join(", "),
                            name: label.clone(),
                            count: bucket.len(),
                        });
                    }
                },
            };
            values.push(cell);
        }
        let out_name = match &spec.names_prefix {
            Some(prefix) => format!("{prefix}{label}"),
            None => label.clone(),
        };
        columns.push((out_name, values));
    }

    Ok(DataFrame::from_columns(columns)?)
}

fn check_expected(expected: &[String], actual: &[String]) -> Result<(), ReshapeError> {
    let want = expected.iter().collect::<HashSet<_>>();
    let have = actual.iter().collect::<HashSet<_>>();
    let mut missing = expected
        .iter()
        .filter(|label| !have.contains(label))
        .cloned()
        .collect::<Vec<_>>();
    let mut extra = actual
        .iter()
        .filter(|label| !want.contains(label))
        .cloned()
        .collect::<Vec<_>>();
    if missing.is_empty() && extra.is_empty() {
        return Ok(());
    }
    missing.sort();
    extra.sort();
    Err(ReshapeError::ExpectedColumnsMismatch { missing, extra })
}

/// Wide-to-long pivot: per visible row, one output row per column in
/// `cols`, the column's name landing in `names_to` and its cell in
/// `values_to`; all other columns are carried through unchanged.
pub fn pivot_longer(
    df: &DataFrame,
    cols: &[&str],
    names_to: &str,
    values_to: &str,
) -> Result<DataFrame, ReshapeError> {
    let store = df.store();
    let melt_cols = cols
        .iter()
        .map(|name| Ok(((*name).to_owned(), store.column(name)?)))
        .collect::<Result<Vec<_>, ReshapeError>>()?;
    let melted = cols.iter().copied().collect::<HashSet<_>>();
    let carried = store
        .names()
        .iter()
        .filter(|n| !melted.contains(n.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    let mut columns = carried
        .iter()
        .map(|n| (n.clone(), Vec::<Scalar>::new()))
        .collect::<Vec<_>>();
    columns.push((names_to.to_owned(), Vec::new()));
    columns.push((values_to.to_owned(), Vec::new()));
    let names_slot = carried.len();

    for row in df.visible_rows() {
        for (name, column) in &melt_cols {
            for (idx, carry) in carried.iter().enumerate() {
                let cell = store
                    .column(carry)?
                    .value(row)
                    .cloned()
                    .unwrap_or_else(Scalar::absent);
                columns[idx].1.push(cell);
            }
            columns[names_slot].1.push(Scalar::Utf8(name.clone()));
            columns[names_slot + 1]
                .1
                .push(column.value(row).cloned().unwrap_or_else(Scalar::absent));
        }
    }

    Ok(DataFrame::from_columns(columns)?)
}

/// The label column a transpose writes former column names into, and the
/// one `transpose` consumes when told to.
pub const TRANSPOSE_LABEL: &str = "column";

/// Flip the frame: data columns become rows. Former column names land in a
/// leading `"column"` label column; new column names come from the
/// `labels_from` column (stringified) or, without one, positional
/// `"0".."n-1"`.
///
/// When the former data-column names are exactly the positional defaults
/// the redundant label column is omitted, which makes a double transpose
/// reproduce the original frame exactly.
pub fn transpose(df: &DataFrame, labels_from: Option<&str>) -> Result<DataFrame, ReshapeError> {
    let store = df.store();
    let rows = df.visible_rows();

    let label_values = match labels_from {
        Some(name) => {
            let column = store.column(name)?;
            rows.iter()
                .map(|&row| {
                    column
                        .value(row)
                        .cloned()
                        .unwrap_or_else(Scalar::absent)
                        .label()
                })
                .collect::<Vec<_>>()
        }
        None => (0..rows.len()).map(|i| i.to_string()).collect(),
    };

    let data_names = store
        .names()
        .iter()
        .filter(|n| Some(n.as_str()) != labels_from)
        .cloned()
        .collect::<Vec<_>>();

    let mut columns = Vec::<(String, Vec<Scalar>)>::new();
    if !is_positional(&data_names) {
        let labels = data_names
            .iter()
            .map(|n| Scalar::Utf8(n.clone()))
            .collect::<Vec<_>>();
        columns.push((TRANSPOSE_LABEL.to_owned(), labels));
    }
    for (idx, label) in label_values.iter().enumerate() {
        let row = rows[idx];
        let values = data_names
            .iter()
            .map(|name| {
                Ok(store
                    .column(name)?
                    .value(row)
                    .cloned()
                    .unwrap_or_else(Scalar::absent))
            })
            .collect::<Result<Vec<_>, ReshapeError>>()?;
        columns.push((label.clone(), values));
    }

    Ok(DataFrame::from_columns(columns)?)
}

fn is_positional(names: &[String]) -> bool {
    names
        .iter()
        .enumerate()
        .all(|(idx, name)| *name == idx.to_string())
}

/// Concatenate frames row-wise. The output column set is the union in
/// first-seen order; cells a frame never had come out absent.
pub fn bind_rows(frames: &[DataFrame]) -> Result<DataFrame, ReshapeError> {
    let mut rows = Vec::new();
    for frame in frames {
        rows.extend(frame.to_rows());
    }
    Ok(DataFrame::from_rows(rows, None)?)
}

#[cfg(test)]
mod tests {
    use tf_frame::DataFrame;
    use tf_types::Scalar;

    use super::{PivotWider, ReshapeError, bind_rows, pivot_longer, pivot_wider, transpose};

    fn utf8(values: &[&str]) -> Vec<Scalar> {
        values.iter().map(|s| Scalar::Utf8((*s).to_owned())).collect()
    }

    fn long() -> DataFrame {
        DataFrame::from_columns(vec![
            ("student".to_owned(), utf8(&["amy", "amy", "bo", "bo"])),
            ("subject".to_owned(), utf8(&["math", "art", "math", "art"])),
            (
                "grade".to_owned(),
                vec![
                    Scalar::Int64(90),
                    Scalar::Int64(85),
                    Scalar::Int64(70),
                    Scalar::Int64(95),
                ],
            ),
        ])
        .expect("fixture builds")
    }

    #[test]
    fn wider_spreads_first_seen_names_and_rows() {
        let out = pivot_wider(&long(), &PivotWider::new("subject", "grade")).expect("wider");
        assert_eq!(
            out.column_names(),
            vec!["student".to_owned(), "math".to_owned(), "art".to_owned()]
        );
        assert_eq!(
            out.values("math").expect("math"),
            vec![Scalar::Int64(90), Scalar::Int64(70)]
        );
    }

    #[test]
    fn wider_missing_combinations_come_out_absent() {
        let df = long().with_view(tf_view::View::masked(vec![0, 1, 2]));
        let out = pivot_wider(&df, &PivotWider::new("subject", "grade")).expect("wider");
        assert!(out.values("art").expect("art")[1].is_absent());
    }

    #[test]
    fn wider_collisions_error_without_values_fn() {
        let df = DataFrame::from_columns(vec![
            ("k".to_owned(), utf8(&["a", "a"])),
            ("name".to_owned(), utf8(&["x", "x"])),
            ("v".to_owned(), vec![Scalar::Int64(1), Scalar::Int64(2)]),
        ])
        .expect("fixture builds");
        let err = pivot_wider(&df, &PivotWider::new("name", "v")).expect_err("must fail");
        assert!(matches!(err, ReshapeError::AmbiguousCell { count: 2, .. }));

        let mut spec = PivotWider::new("name", "v");
        spec.values_fn = Some(Box::new(|bucket| {
            Scalar::Int64(bucket.iter().filter_map(Scalar::as_f64).sum::<f64>() as i64)
        }));
        let out = pivot_wider(&df, &spec).expect("aggregated");
        assert_eq!(out.values("x").expect("x"), vec![Scalar::Int64(3)]);
    }

    #[test]
    fn wider_validates_expected_columns_order_insensitively() {
        let mut spec = PivotWider::new("subject", "grade");
        spec.expected_columns = Some(vec!["art".to_owned(), "math".to_owned()]);
        pivot_wider(&long(), &spec).expect("matching set passes");

        spec.expected_columns = Some(vec!["math".to_owned(), "gym".to_owned()]);
        let err = pivot_wider(&long(), &spec).expect_err("must fail");
        match err {
            ReshapeError::ExpectedColumnsMismatch { missing, extra } => {
                assert_eq!(missing, vec!["gym".to_owned()]);
                assert_eq!(extra, vec!["art".to_owned()]);
            }
            other => panic!("wrong error: {other}"),
        }
    }

    #[test]
    fn wider_applies_names_prefix_after_validation() {
        let mut spec = PivotWider::new("subject", "grade");
        spec.expected_columns = Some(vec!["math".to_owned(), "art".to_owned()]);
        spec.names_prefix = Some("grade_".to_owned());
        let out = pivot_wider(&long(), &spec).expect("wider");
        assert!(out.store().has_column("grade_math"));
    }

    #[test]
    fn longer_melts_each_named_column_per_row() {
        let wide = pivot_wider(&long(), &PivotWider::new("subject", "grade")).expect("wider");
        let back = pivot_longer(&wide, &["math", "art"], "subject", "grade").expect("longer");
        assert_eq!(back.nrows(), 4);
        assert!(back.semantic_eq(&long()));
    }

    #[test]
    fn longer_rejects_unknown_columns() {
        let err = pivot_longer(&long(), &["nope"], "n", "v").expect_err("must fail");
        assert!(err.to_string().contains("available columns"));
    }

    #[test]
    fn transpose_round_trips_exactly() {
        let df = DataFrame::from_columns(vec![
            ("a".to_owned(), vec![Scalar::Int64(1), Scalar::Int64(2)]),
            ("b".to_owned(), vec![Scalar::Int64(3), Scalar::Int64(4)]),
        ])
        .expect("fixture builds");

        let flipped = transpose(&df, None).expect("transpose");
        assert_eq!(
            flipped.column_names(),
            vec!["column".to_owned(), "0".to_owned(), "1".to_owned()]
        );
        assert_eq!(flipped.values("column").expect("column"), utf8(&["a", "b"]));

        let back = transpose(&flipped, Some("column")).expect("transpose back");
        assert!(back.semantic_eq(&df));
        assert_eq!(back.column_names(), df.column_names());
    }

    #[test]
    fn bind_rows_unions_columns_with_absent_fill() {
        let a = DataFrame::from_columns(vec![(
            "x".to_owned(),
            vec![Scalar::Int64(1)],
        )])
        .expect("a");
        let b = DataFrame::from_columns(vec![
            ("x".to_owned(), vec![Scalar::Int64(2)]),
            ("y".to_owned(), vec![Scalar::Int64(3)]),
        ])
        .expect("b");

        let out = bind_rows(&[a, b]).expect("bind_rows");
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.column_names(), vec!["x".to_owned(), "y".to_owned()]);
        assert!(out.values("y").expect("y")[0].is_absent());
    }
}
