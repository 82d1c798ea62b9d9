use std::collections::HashSet;

use tf_frame::DataFrame;
use tf_types::{KeyScalar, MissingKind, Scalar, key_tuple};
use tf_view::{Group, Grouping, View};

use crate::VerbError;

/// Keep the first visible row for each distinct key tuple and project the
/// result down to the key columns. `columns` selects which columns form
/// the key; empty means all columns in store order. Rows keep their view
/// order. Per group when grouped: the same key may appear once in every
/// group, and the grouping columns survive alongside the selected ones.
pub fn distinct(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, VerbError> {
    let store = df.store();
    let names: Vec<String> = if columns.is_empty() {
        store.names().to_vec()
    } else {
        columns.iter().map(|c| (*c).to_owned()).collect()
    };
    let key_columns = names
        .iter()
        .map(|name| store.column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut keep_first = |rows: &[usize]| -> Vec<usize> {
        let mut seen = HashSet::<Vec<KeyScalar>>::new();
        let mut kept = Vec::new();
        const ABSENT: Scalar = Scalar::Missing(MissingKind::Absent);
        for &row in rows {
            let cells = key_columns
                .iter()
                .map(|column| column.value(row).unwrap_or(&ABSENT))
                .collect::<Vec<_>>();
            if seen.insert(key_tuple(&cells)) {
                kept.push(row);
            }
        }
        kept
    };

    let deduped = if let Some(grouping) = df.view().grouping() {
        let mut out_rows = Vec::new();
        let mut out_groups = Vec::<Group>::new();
        for group in &grouping.groups {
            let rows = keep_first(&group.rows);
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
        df.with_view(view)
    } else {
        let visible = df.visible_rows();
        df.with_view(View::masked(keep_first(&visible)))
    };

    // Grouping columns first, then the key columns not already among them.
    let mut out_names = deduped.grouping_columns();
    for name in &names {
        if !out_names.contains(name) {
            out_names.push(name.clone());
        }
    }
    let refs = out_names.iter().map(String::as_str).collect::<Vec<_>>();
    Ok(deduped.select(&refs)?)
}
