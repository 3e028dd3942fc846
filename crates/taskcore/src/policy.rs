use crate::context::ExecutionContext;
use crate::executor::NodeDefinition;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry settings a node definition may override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Backoff between retriable attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    None,
    Fixed { delay: Duration },
    Exponential { initial: Duration, multiplier: f64 },
}

impl Backoff {
    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                initial.mul_f64(factor.max(1.0))
            }
        }
    }
}

/// Per-dispatch execution policy, resolved once and immutable thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExecutionPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for ResolvedExecutionPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }
}

/// Collaborator supplying the execution policy for a dispatch.
pub trait PolicyResolver: Send + Sync {
    fn resolve(&self, def: &NodeDefinition, ctx: &ExecutionContext) -> ResolvedExecutionPolicy;
}

/// Resolves from engine defaults plus per-node overrides.
pub struct DefaultPolicyResolver {
    defaults: ResolvedExecutionPolicy,
}

impl DefaultPolicyResolver {
    pub fn new(defaults: ResolvedExecutionPolicy) -> Self {
        Self { defaults }
    }
}

impl Default for DefaultPolicyResolver {
    fn default() -> Self {
        Self::new(ResolvedExecutionPolicy::default())
    }
}

impl PolicyResolver for DefaultPolicyResolver {
    fn resolve(&self, def: &NodeDefinition, _ctx: &ExecutionContext) -> ResolvedExecutionPolicy {
        let timeout = def
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.defaults.timeout);

        match &def.retry_policy {
            Some(retry) => {
                let initial = Duration::from_millis(retry.delay_ms);
                let backoff = if retry.backoff_multiplier > 1.0 {
                    Backoff::Exponential {
                        initial,
                        multiplier: retry.backoff_multiplier,
                    }
                } else if retry.delay_ms > 0 {
                    Backoff::Fixed { delay: initial }
                } else {
                    Backoff::None
                };
                ResolvedExecutionPolicy {
                    timeout,
                    max_attempts: retry.max_attempts.max(1),
                    backoff,
                }
            }
            None => ResolvedExecutionPolicy {
                timeout,
                ..self.defaults.clone()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_grows() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn fixed_backoff_is_flat() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(50),
        };
        assert_eq!(backoff.delay_for(1), backoff.delay_for(5));
    }
}
