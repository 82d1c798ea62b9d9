#![forbid(unsafe_code)]

mod arrange;
mod distinct;
mod filter;
mod missing;
mod mutate;
mod slice;
pub mod window;

use tf_columnar::{RowRef, StoreError};
use tf_frame::{DataFrame, FrameError};
use tf_types::TypeError;
use tf_view::ViewError;
use thiserror::Error;

pub use arrange::arrange;
pub use distinct::distinct;
pub use filter::filter;
pub use missing::{
    fill_backward, fill_forward, remove_absent, remove_missing, remove_null, replace_missing,
};
pub use mutate::{Mutation, mutate, mutate_one};
pub use slice::{head, sample, slice, slice_max, slice_min, tail};

#[derive(Debug, Error)]
pub enum VerbError {
    #[error("lag/lead offset must be non-negative, got {offset}")]
    NegativeOffset { offset: i64 },
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// Visit every visible row in view order (grouped frames: group order,
/// then within-group order). The synchronous twin of the async per-row
/// pipeline.
pub fn for_each_row<F>(df: &DataFrame, mut f: F)
where
    F: FnMut(RowRef<'_>, usize),
{
    let mut position = 0;
    for block in df.view().blocks(df.store().len()) {
        for row in block {
            f(df.row_ref(row), position);
            position += 1;
        }
    }
}
