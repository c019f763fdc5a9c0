//! One-time oracle bootstrap: pay the fee, register each account, record its indexes

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{BootstrapError, RemoteError};
use crate::models::{IndexAssignment, OracleIdentity, Wei};
use crate::registry::Registry;
use crate::services::remote_authority::RemoteAuthority;

const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_SECONDS: u64 = 8;

/// Bounded retry with exponential backoff, applied to transient failures only.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECONDS),
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    Register,
    IndexQuery,
    Duplicate,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStage::Register => f.write_str("register"),
            RegistrationStage::IndexQuery => f.write_str("index query"),
            RegistrationStage::Duplicate => f.write_str("duplicate account"),
        }
    }
}

/// An account that did not make it into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub oracle: OracleIdentity,
    pub stage: RegistrationStage,
    pub reason: String,
}

#[derive(Debug)]
pub struct BootstrapReport {
    pub registry: Registry,
    pub fee: Wei,
    pub failures: Vec<RegistrationFailure>,
}

pub struct RegistrationCoordinator {
    authority: Arc<dyn RemoteAuthority>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl RegistrationCoordinator {
    pub fn new(authority: Arc<dyn RemoteAuthority>, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            authority,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Register the first `oracle_count` accounts of `account_pool`.
    ///
    /// Only a missing registration fee fails the whole bootstrap. Any single
    /// account that cannot be registered is reported and left out of the registry.
    pub async fn bootstrap(
        &self,
        account_pool: &[OracleIdentity],
        oracle_count: usize,
    ) -> Result<BootstrapReport, BootstrapError> {
        let fee = self
            .retry
            .run("registration fee", || self.authority.registration_fee())
            .await
            .map_err(BootstrapError::FeeUnavailable)?;
        info!(fee = %fee, "registration fee obtained");

        if account_pool.len() < oracle_count {
            warn!(
                requested = oracle_count,
                available = account_pool.len(),
                "account pool smaller than requested oracle count"
            );
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for oracle in account_pool.iter().take(oracle_count) {
            if seen.insert(*oracle) {
                candidates.push(*oracle);
            } else {
                warn!(oracle = %oracle, "account listed twice in pool, skipping");
                failures.push(RegistrationFailure {
                    oracle: *oracle,
                    stage: RegistrationStage::Duplicate,
                    reason: "account listed twice".to_string(),
                });
            }
        }

        let outcomes: Vec<_> = stream::iter(candidates)
            .map(|oracle| async move { (oracle, self.register_one(oracle, fee).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut registry = Registry::new();
        for (oracle, outcome) in outcomes {
            match outcome {
                Ok(assignment) => {
                    if let Err(err) = registry.insert(oracle, assignment) {
                        failures.push(RegistrationFailure {
                            oracle,
                            stage: RegistrationStage::Duplicate,
                            reason: err.to_string(),
                        });
                    }
                }
                Err(failure) => failures.push(failure),
            }
        }

        info!(
            registered = registry.len(),
            failed = failures.len(),
            "oracle bootstrap complete"
        );

        Ok(BootstrapReport {
            registry,
            fee,
            failures,
        })
    }

    /// Registration followed by its index query, as one ordered unit.
    ///
    /// Only the send is retried. Once the node returned a transaction hash the
    /// registration is never sent again; a receipt that does not arrive in time
    /// falls through to the index query, which settles whether it was mined.
    async fn register_one(
        &self,
        oracle: OracleIdentity,
        fee: Wei,
    ) -> Result<IndexAssignment, RegistrationFailure> {
        let tx_hash = self
            .retry
            .run("register oracle", || self.authority.register_oracle(&oracle, fee))
            .await
            .map_err(|err| failure(oracle, RegistrationStage::Register, err))?;

        match self.authority.confirm_transaction(&tx_hash).await {
            Ok(()) => {}
            Err(err) if err.is_transient() => warn!(
                oracle = %oracle,
                tx_hash = %tx_hash,
                error = %err,
                "registration receipt unavailable, checking assigned indexes"
            ),
            Err(err) => return Err(failure(oracle, RegistrationStage::Register, err)),
        }

        let assignment = self
            .retry
            .run("assigned indexes", || self.authority.assigned_indexes(&oracle))
            .await
            .map_err(|err| failure(oracle, RegistrationStage::IndexQuery, err))?;

        info!(oracle = %oracle, indexes = %assignment, tx_hash = %tx_hash, "oracle registered");
        Ok(assignment)
    }
}

fn failure(oracle: OracleIdentity, stage: RegistrationStage, err: RemoteError) -> RegistrationFailure {
    warn!(oracle = %oracle, stage = %stage, error = %err, "oracle registration failed");
    RegistrationFailure {
        oracle,
        stage,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryPolicy::new(10);
        assert_eq!(retry.delay_for(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for(2), Duration::from_secs(1));
        assert_eq!(retry.delay_for(3), Duration::from_secs(2));
        assert_eq!(retry.delay_for(6), Duration::from_secs(8));
        assert_eq!(retry.delay_for(40), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retry_stops_on_revert() {
        let retry = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let mut calls = 0;
        let result: Result<(), _> = retry
            .run("test", || {
                calls += 1;
                async { Err(RemoteError::Reverted("not funded".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(RemoteError::Reverted(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_timeouts() {
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let mut calls = 0;
        let result = retry
            .run("test", || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(RemoteError::Timeout(Duration::from_millis(1)))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }
}
