#![forbid(unsafe_code)]

//! Deferred pipeline: async twins of the row verbs plus the
//! [`PendingFrame`] chain that holds a whole pipeline until awaited.
//!
//! The sync verbs never touch any of this; callers opt into the scheduler
//! by picking the `_async` entry points. Each verb decomposes into
//! independent units (one per row, or one per group × reducer), runs them
//! concurrently up to [`AsyncOptions::concurrency`], and writes results
//! back by original index, so the materialized order always equals what
//! the synchronous verb would have produced.

use tf_columnar::StoreError;
use tf_frame::FrameError;
use tf_types::Scalar;
use tf_verbs::VerbError;
use tf_view::ViewError;
use thiserror::Error;

mod ops;
mod pending;
mod retry;
mod scheduler;

pub use ops::{AsyncReducer, filter_async, for_each_row_async, mutate_async, summarise_async};
pub use pending::PendingFrame;
pub use retry::RetryPolicy;

/// What a failed unit carries back to the pipeline.
pub type UnitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum AsyncError {
    /// A unit exhausted its retries. `index` is the unit's position in
    /// the synchronous order (row position, or group × reducer slot).
    #[error("unit {index} failed: {source}")]
    Unit {
        index: usize,
        #[source]
        source: UnitError,
    },
    /// A worker task died outside the unit's own error path (panic or
    /// runtime shutdown).
    #[error("worker task failed: {reason}")]
    Task { reason: String },
    #[error(transparent)]
    Verb(#[from] VerbError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// Scheduler knobs shared by every async verb.
#[derive(Debug, Clone, Copy)]
pub struct AsyncOptions {
    /// Units in flight at once. Clamped to at least 1.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retry: RetryPolicy::None,
        }
    }
}

/// Owned row snapshot handed to async callbacks; the borrowed `RowRef`
/// cannot cross a task boundary. Accessors mirror `RowRef`.
#[derive(Debug, Clone)]
pub struct OwnedRow {
    cells: Vec<(String, Scalar)>,
}

impl OwnedRow {
    #[must_use]
    pub fn new(cells: Vec<(String, Scalar)>) -> Self {
        Self { cells }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.cells
            .iter()
            .find(|(cell, _)| cell == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Scalar {
        self.get(name).cloned().unwrap_or_else(Scalar::absent)
    }

    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Scalar::as_f64)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Scalar::Utf8(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn cells(&self) -> &[(String, Scalar)] {
        &self.cells
    }
}
