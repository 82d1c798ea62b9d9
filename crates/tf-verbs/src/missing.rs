use std::sync::Arc;

use tf_frame::DataFrame;
use tf_types::Scalar;
use tf_view::regroup;

use crate::VerbError;

fn resolve(df: &DataFrame, columns: &[&str]) -> Result<Vec<String>, VerbError> {
    let store = df.store();
    if columns.is_empty() {
        return Ok(store.names().to_vec());
    }
    for name in columns {
        store.column(name)?;
    }
    Ok(columns.iter().map(|c| (*c).to_owned()).collect())
}

/// Drop rows where any of `columns` (all columns when empty) is missing,
/// whichever missing marker it carries. Mask-only.
pub fn remove_missing(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, VerbError> {
    drop_rows_where(df, columns, Scalar::is_missing)
}

/// Drop rows holding an explicit null in any named column; absent cells
/// do not count.
pub fn remove_null(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, VerbError> {
    drop_rows_where(df, columns, Scalar::is_null)
}

/// The structural counterpart of [`remove_null`]: only absent cells drop
/// a row.
pub fn remove_absent(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, VerbError> {
    drop_rows_where(df, columns, Scalar::is_absent)
}

fn drop_rows_where(
    df: &DataFrame,
    columns: &[&str],
    hit: fn(&Scalar) -> bool,
) -> Result<DataFrame, VerbError> {
    let names = resolve(df, columns)?;
    crate::filter(df, |row, _| !names.iter().any(|name| hit(&row.value(name))))
}

/// Substitute a default into missing cells of the named columns. Only
/// missing cells change: falsy present values (`0`, `false`, `""`) are
/// values and stay put. Columns not named are untouched.
pub fn replace_missing(
    df: &DataFrame,
    defaults: &[(&str, Scalar)],
) -> Result<DataFrame, VerbError> {
    rewrite_columns(
        df,
        defaults.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        |name, values| {
            let default = defaults
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, d)| d.clone())
                .unwrap_or_else(Scalar::null);
            for cell in values.iter_mut() {
                if cell.is_missing() {
                    *cell = default.clone();
                }
            }
        },
    )
}

/// Each missing cell takes the nearest earlier non-missing value in view
/// order; a leading missing run stays missing. The scan ignores group
/// boundaries.
pub fn fill_forward(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, VerbError> {
    rewrite_columns(df, resolve(df, columns)?, |_, values| {
        let mut last: Option<Scalar> = None;
        for cell in values.iter_mut() {
            if cell.is_missing() {
                if let Some(v) = &last {
                    *cell = v.clone();
                }
            } else {
                last = Some(cell.clone());
            }
        }
    })
}

/// Mirror of [`fill_forward`]: missing cells take the nearest later
/// non-missing value; a trailing missing run stays missing.
pub fn fill_backward(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, VerbError> {
    rewrite_columns(df, resolve(df, columns)?, |_, values| {
        let mut next: Option<Scalar> = None;
        for cell in values.iter_mut().rev() {
            if cell.is_missing() {
                if let Some(v) = &next {
                    *cell = v.clone();
                }
            } else {
                next = Some(cell.clone());
            }
        }
    })
}

/// Materialize the visible rows, rewrite each named column's values in
/// place via `edit`, and regroup. Shared by the value-producing
/// missing-data verbs.
fn rewrite_columns<S: AsRef<str>>(
    df: &DataFrame,
    names: impl IntoIterator<Item = S>,
    mut edit: impl FnMut(&str, &mut Vec<Scalar>),
) -> Result<DataFrame, VerbError> {
    let base = df.materialize()?;
    let mut store = base.store().clone();
    for name in names {
        let name = name.as_ref();
        let mut values = store.column(name)?.values().to_vec();
        edit(name, &mut values);
        store = store.with_column(name, values)?;
    }
    let group_columns = base.grouping_columns();
    let refs = group_columns.iter().map(String::as_str).collect::<Vec<_>>();
    let view = regroup(&store, (0..store.len()).collect(), &refs)?;
    Ok(DataFrame::from_parts(Arc::new(store), view)?)
}
