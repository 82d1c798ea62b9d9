use std::sync::Arc;

use tf_columnar::RowRef;
use tf_frame::{DataFrame, FrameError};
use tf_types::Scalar;
use tf_view::regroup;

use crate::VerbError;

/// One mutate entry: a per-row computation, a precomputed column assigned
/// positionally, or a scalar broadcast to every visible row.
pub enum Mutation {
    PerRow(Box<dyn Fn(RowRef<'_>, usize) -> Scalar>),
    Values(Vec<Scalar>),
    Broadcast(Scalar),
}

impl Mutation {
    pub fn per_row<F>(f: F) -> Self
    where
        F: Fn(RowRef<'_>, usize) -> Scalar + 'static,
    {
        Self::PerRow(Box::new(f))
    }

    #[must_use]
    pub fn values(values: Vec<Scalar>) -> Self {
        Self::Values(values)
    }

    #[must_use]
    pub fn broadcast(value: impl Into<Scalar>) -> Self {
        Self::Broadcast(value.into())
    }
}

/// Add or recompute columns. Entries evaluate left to right over the
/// visible rows; each entry lands in the working store before the next
/// one runs, so later per-row callbacks see earlier results, while reads
/// of columns computed later in the same call observe no value.
///
/// The result always owns a fresh store (visible rows materialized);
/// grouping is rebuilt over it.
pub fn mutate(df: &DataFrame, entries: Vec<(String, Mutation)>) -> Result<DataFrame, VerbError> {
    let base = df.materialize()?;
    let mut store = base.store().clone();
    let n = store.len();

    for (name, mutation) in entries {
        let values = match mutation {
            Mutation::PerRow(f) => (0..n).map(|i| f(store.row_ref(i), i)).collect::<Vec<_>>(),
            Mutation::Values(values) => {
                if values.len() != n {
                    return Err(VerbError::Frame(FrameError::LengthMismatch {
                        expected: n,
                        actual: values.len(),
                    }));
                }
                values
            }
            Mutation::Broadcast(value) => vec![value; n],
        };
        store = store.with_column(&name, values)?;
    }

    let group_columns = base.grouping_columns();
    let refs = group_columns.iter().map(String::as_str).collect::<Vec<_>>();
    let view = regroup(&store, (0..store.len()).collect(), &refs)?;
    Ok(DataFrame::from_parts(Arc::new(store), view)?)
}

/// Single-entry convenience used by most call sites.
pub fn mutate_one(
    df: &DataFrame,
    name: impl Into<String>,
    mutation: Mutation,
) -> Result<DataFrame, VerbError> {
    mutate(df, vec![(name.into(), mutation)])
}
