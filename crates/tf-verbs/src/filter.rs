use tf_columnar::RowRef;
use tf_frame::DataFrame;
use tf_view::{Group, Grouping, View};

use crate::VerbError;

/// Keep the visible rows the predicate accepts. Mask-only: the result
/// shares the store. The predicate receives a row view and the row's
/// position in the view; closures capture the frame itself when a
/// predicate needs relative comparisons against whole columns.
///
/// On a grouped frame the predicate runs within each group; surviving
/// rows keep their per-group order and the groups keep their order, with
/// fully emptied groups dropped.
pub fn filter<F>(df: &DataFrame, mut pred: F) -> Result<DataFrame, VerbError>
where
    F: FnMut(RowRef<'_>, usize) -> bool,
{
    let store_len = df.store().len();

    if let Some(grouping) = df.view().grouping() {
        let mut position = 0;
        let mut kept_groups = Vec::<Group>::new();
        let mut kept_rows = Vec::<usize>::new();
        for group in &grouping.groups {
            let mut rows = Vec::new();
            for &row in &group.rows {
                if pred(df.row_ref(row), position) {
                    rows.push(row);
                }
                position += 1;
            }
            if !rows.is_empty() {
                kept_rows.extend(rows.iter().copied());
                kept_groups.push(Group {
                    key: group.key.clone(),
                    rows,
                });
            }
        }
        let view = View::grouped(
            kept_rows,
            Grouping {
                columns: grouping.columns.clone(),
                groups: kept_groups,
            },
        );
        return Ok(df.with_view(view));
    }

    let visible = df.view().materialize(store_len);
    let mut kept = Vec::new();
    for (position, &row) in visible.iter().enumerate() {
        if pred(df.row_ref(row), position) {
            kept.push(row);
        }
    }
    Ok(df.with_view(View::masked(kept)))
}
