use std::time::Duration;

/// Backoff schedule for failed units. Only the failed unit re-runs;
/// siblings are untouched by a retry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RetryPolicy {
    /// First failure is final.
    #[default]
    None,
    /// `base_delay * multiplier^(attempt-1)`, capped at `max_delay`.
    Exponential {
        max_retries: u32,
        base_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    },
    /// `base_delay * attempt`, capped at `max_delay`.
    Linear {
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
    },
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` when the
    /// budget is spent and the failure is final.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::None => None,
            Self::Exponential {
                max_retries,
                base_delay,
                multiplier,
                max_delay,
            } => (attempt <= max_retries).then(|| {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                base_delay.mul_f64(factor).min(max_delay)
            }),
            Self::Linear {
                max_retries,
                base_delay,
                max_delay,
            } => (attempt <= max_retries).then(|| (base_delay * attempt).min(max_delay)),
        }
    }
}
