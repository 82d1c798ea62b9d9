//! The deferred pipeline handle. A `PendingFrame` owns a future that
//! yields the materialized frame; verbs chain by wrapping that future, and
//! nothing runs until the handle is awaited.

use std::future::{Future, IntoFuture};

use futures::future::BoxFuture;
use tf_frame::DataFrame;
use tf_types::Scalar;

use crate::ops::{AsyncReducer, filter_async, for_each_row_async, mutate_async, summarise_async};
use crate::{AsyncError, AsyncOptions, OwnedRow, UnitError};

/// A pipeline that has not run yet. Chain verbs freely, then `.await` the
/// handle to drive the whole chain; the first stage that rejects short-
/// circuits the rest.
pub struct PendingFrame {
    inner: BoxFuture<'static, Result<DataFrame, AsyncError>>,
}

impl PendingFrame {
    /// Lift an already-materialized frame into the pipeline.
    #[must_use]
    pub fn resolved(df: DataFrame) -> Self {
        Self {
            inner: Box::pin(async move { Ok(df) }),
        }
    }

    #[must_use]
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<DataFrame, AsyncError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    /// Chain an async per-row mutate.
    #[must_use]
    pub fn mutate<F, Fut>(self, name: impl Into<String>, f: F, options: AsyncOptions) -> Self
    where
        F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Scalar, UnitError>> + Send + 'static,
    {
        let name = name.into();
        Self::from_future(async move {
            let df = self.inner.await?;
            mutate_async(&df, &name, f, &options).await
        })
    }

    /// Chain an async per-row filter.
    #[must_use]
    pub fn filter<F, Fut>(self, pred: F, options: AsyncOptions) -> Self
    where
        F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, UnitError>> + Send + 'static,
    {
        Self::from_future(async move {
            let df = self.inner.await?;
            filter_async(&df, pred, &options).await
        })
    }

    /// Chain an async summarise (one unit per group × reducer).
    #[must_use]
    pub fn summarise(self, entries: Vec<(String, AsyncReducer)>, options: AsyncOptions) -> Self {
        Self::from_future(async move {
            let df = self.inner.await?;
            summarise_async(&df, entries, &options).await
        })
    }

    /// Visit every row concurrently for effects, passing the frame through
    /// unchanged.
    #[must_use]
    pub fn inspect<F, Fut>(self, f: F, options: AsyncOptions) -> Self
    where
        F: Fn(OwnedRow, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
    {
        Self::from_future(async move {
            let df = self.inner.await?;
            for_each_row_async(&df, f, &options).await?;
            Ok(df)
        })
    }

    /// Chain a synchronous verb between async stages.
    #[must_use]
    pub fn then_sync<F, E>(self, f: F) -> Self
    where
        F: FnOnce(DataFrame) -> Result<DataFrame, E> + Send + 'static,
        E: Into<AsyncError>,
    {
        Self::from_future(async move {
            let df = self.inner.await?;
            f(df).map_err(Into::into)
        })
    }
}

impl IntoFuture for PendingFrame {
    type Output = Result<DataFrame, AsyncError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}
