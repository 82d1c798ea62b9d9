#![forbid(unsafe_code)]

//! tidyframe: an in-memory columnar data-manipulation engine.
//!
//! Data lives in immutable columnar stores; verbs operate on copy-free
//! views over them (masks and groupings), so a filter or a sort never
//! touches the data. The verb vocabulary follows the grammar-of-data
//! school: `filter`, `mutate`, `arrange`, the slice family, `distinct`,
//! missing-data handling, window functions, `summarise`/`count`, the join
//! family, and long↔wide reshapes. Async twins of the row verbs run
//! row-level callbacks concurrently with bounded parallelism and retry,
//! materializing in synchronous order.
//!
//! This crate is the facade: everything public in the engine crates is
//! re-exported here, plus a few conveniences that only make sense at the
//! top level.

pub use tf_async::{
    AsyncError, AsyncOptions, AsyncReducer, OwnedRow, PendingFrame, RetryPolicy, UnitError,
    filter_async, for_each_row_async, mutate_async, summarise_async,
};
pub use tf_columnar::{
    Column, RowRef, RowValidator, SchemaViolation, Store, StoreError, ValidityMask,
};
pub use tf_frame::{DataFrame, FrameError};
pub use tf_groupby::{GroupByError, Reducer, count, cross_tabulate, reduce, summarise};
pub use tf_join::{
    AsofDirection, AsofOptions, JoinError, JoinKeys, JoinOptions, asof_join, cross_join,
    inner_join, left_join, outer_join, right_join,
};
pub use tf_reshape::{
    PivotWider, ReshapeError, TRANSPOSE_LABEL, bind_rows, pivot_longer, pivot_wider,
};
pub use tf_types::{
    DType, KeyScalar, MissingKind, NestedRow, Scalar, SortDirection, TypeError, common_dtype,
    compare_scalars, infer_dtype,
};
pub use tf_verbs::{
    Mutation, VerbError, arrange, distinct, fill_backward, fill_forward, filter, for_each_row,
    head, mutate, mutate_one, remove_absent, remove_missing, remove_null, replace_missing,
    sample, slice, slice_max, slice_min, tail, window,
};
pub use tf_view::{Group, Grouping, View, ViewError, group_by, regroup};

/// Transpose with label auto-detection: a frame whose first column is the
/// `"column"` label (as written by a previous transpose) is flipped back
/// using those labels; anything else gets positional column names.
pub fn transpose(df: &DataFrame) -> Result<DataFrame, ReshapeError> {
    let labels_from = match df.column_names().first() {
        Some(name) if name == TRANSPOSE_LABEL => Some(TRANSPOSE_LABEL),
        _ => None,
    };
    tf_reshape::transpose(df, labels_from)
}

/// The names most pipelines want in scope.
pub mod prelude {
    pub use crate::{
        AsyncOptions, DataFrame, JoinKeys, JoinOptions, Mutation, PendingFrame, PivotWider,
        RetryPolicy, Scalar, SortDirection, arrange, bind_rows, count, cross_tabulate, distinct,
        filter, head,
        inner_join, left_join, mutate, mutate_one, pivot_longer, pivot_wider, reduce, slice,
        summarise, tail, transpose,
    };
}
