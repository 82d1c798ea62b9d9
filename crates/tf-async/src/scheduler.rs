//! Unit scheduler: bounded concurrency, per-unit retry, index-addressed
//! result collection, and fail-fast abort.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{AsyncError, AsyncOptions, UnitError};

/// Run every unit factory to completion and hand back results in unit
/// order, whatever order the tasks finished in. A unit factory is called
/// once per attempt, so retries re-run only their own unit.
///
/// The first unit that exhausts its retries rejects the whole batch:
/// in-flight siblings are aborted and finished sibling results dropped.
pub(crate) async fn run_units<T, F, Fut>(
    units: Vec<F>,
    options: &AsyncOptions,
) -> Result<Vec<T>, AsyncError>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, UnitError>> + Send + 'static,
{
    let total = units.len();
    let concurrency = options.concurrency.max(1);
    debug!(units = total, concurrency, "scheduling async units");

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let retry = options.retry;
    let mut set = JoinSet::new();

    for (index, unit) in units.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|closed| AsyncError::Task {
                    reason: closed.to_string(),
                })?;
            let mut attempt = 0_u32;
            loop {
                match unit().await {
                    Ok(value) => return Ok((index, value)),
                    Err(source) => {
                        attempt += 1;
                        let Some(delay) = retry.delay_for(attempt) else {
                            return Err(AsyncError::Unit { index, source });
                        };
                        warn!(
                            unit = index,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %source,
                            "unit failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        });
    }

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok((index, value))) => slots[index] = Some(value),
            Ok(Err(error)) => {
                set.abort_all();
                return Err(error);
            }
            Err(join_error) => {
                set.abort_all();
                return Err(AsyncError::Task {
                    reason: join_error.to_string(),
                });
            }
        }
    }

    let results = slots.into_iter().flatten().collect::<Vec<_>>();
    if results.len() != total {
        return Err(AsyncError::Task {
            reason: "a unit finished without reporting a result".to_owned(),
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::{AsyncError, AsyncOptions, RetryPolicy};

    use super::run_units;

    #[tokio::test]
    async fn results_come_back_in_unit_order() {
        let units = (0..20_usize)
            .map(|i| {
                move || async move {
                    // Later units finish earlier.
                    tokio::time::sleep(Duration::from_millis((20 - i) as u64)).await;
                    Ok(i * 10)
                }
            })
            .collect::<Vec<_>>();
        let out = run_units(units, &AsyncOptions::default())
            .await
            .expect("all units succeed");
        assert_eq!(out, (0..20).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_stays_bounded() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let units = (0..32_usize)
            .map(|_| {
                let live = Arc::clone(&live);
                let peak = Arc::clone(&peak);
                move || {
                    let live = Arc::clone(&live);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        live.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                }
            })
            .collect::<Vec<_>>();

        let options = AsyncOptions {
            concurrency: 4,
            retry: RetryPolicy::None,
        };
        run_units(units, &options).await.expect("units succeed");
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn retry_reruns_only_the_failed_unit() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let flaky = move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".into())
                } else {
                    Ok(7_i64)
                }
            }
        };
        let options = AsyncOptions {
            concurrency: 2,
            retry: RetryPolicy::Exponential {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                multiplier: 2.0,
                max_delay: Duration::from_millis(4),
            },
        };
        let out = run_units(vec![flaky], &options).await.expect("recovers");
        assert_eq!(out, vec![7]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_final_failure_rejects_the_batch() {
        let units = (0..4_usize)
            .map(|i| {
                move || async move {
                    if i == 2 {
                        Err("boom".into())
                    } else {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(i)
                    }
                }
            })
            .collect::<Vec<_>>();
        let err = run_units(units, &AsyncOptions::default())
            .await
            .expect_err("unit 2 fails");
        match err {
            AsyncError::Unit { index, .. } => assert_eq!(index, 2),
            other => panic!("wrong error: {other}"),
        }
    }
}
