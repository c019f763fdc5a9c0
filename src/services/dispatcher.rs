//! Response dispatcher: every oracle holding the requested index answers
//!
//! Each matching oracle submits its own response; the contract does the
//! consensus accounting. Submissions are independent and best-effort: a failed
//! one is logged and counted, never retried, and never holds up the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::{OracleIdentity, StatusRequestEvent, StatusResponse};
use crate::registry::{Registry, RegistryGate};
use crate::services::remote_authority::RemoteAuthority;
use crate::services::status_policy::StatusCodePolicy;

/// Running totals shared with the status endpoint.
#[derive(Debug, Default)]
pub struct DispatchStats {
    events_received: AtomicU64,
    events_unmatched: AtomicU64,
    responses_submitted: AtomicU64,
    responses_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub events_received: u64,
    pub events_unmatched: u64,
    pub responses_submitted: u64,
    pub responses_failed: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_unmatched: self.events_unmatched.load(Ordering::Relaxed),
            responses_submitted: self.responses_submitted.load(Ordering::Relaxed),
            responses_failed: self.responses_failed.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatch_id: Uuid,
    pub submitted: Vec<OracleIdentity>,
    pub failed: Vec<OracleIdentity>,
}

impl DispatchReport {
    pub fn matched(&self) -> usize {
        self.submitted.len() + self.failed.len()
    }
}

pub struct ResponseDispatcher {
    authority: Arc<dyn RemoteAuthority>,
    policy: Arc<dyn StatusCodePolicy>,
    stats: Arc<DispatchStats>,
}

impl ResponseDispatcher {
    pub fn new(authority: Arc<dyn RemoteAuthority>, policy: Arc<dyn StatusCodePolicy>) -> Self {
        Self::with_stats(authority, policy, Arc::new(DispatchStats::default()))
    }

    pub fn with_stats(
        authority: Arc<dyn RemoteAuthority>,
        policy: Arc<dyn StatusCodePolicy>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            authority,
            policy,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Submit one response per registry entry whose indexes contain the requested index.
    pub async fn handle(&self, event: &StatusRequestEvent, registry: &Registry) -> DispatchReport {
        let dispatch_id = Uuid::new_v4();
        let span = info_span!(
            "dispatch",
            %dispatch_id,
            index = %event.index,
            airline = %event.airline,
            flight = %event.flight
        );
        self.dispatch(dispatch_id, event, registry)
            .instrument(span)
            .await
    }

    async fn dispatch(
        &self,
        dispatch_id: Uuid,
        event: &StatusRequestEvent,
        registry: &Registry,
    ) -> DispatchReport {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);

        let responses: Vec<StatusResponse> = registry
            .matching(event.index)
            .map(|oracle| StatusResponse::for_event(*oracle, event, self.policy.choose()))
            .collect();

        let mut report = DispatchReport {
            dispatch_id,
            submitted: Vec::new(),
            failed: Vec::new(),
        };

        if responses.is_empty() {
            self.stats.events_unmatched.fetch_add(1, Ordering::Relaxed);
            debug!("no registered oracle holds the requested index");
            return report;
        }

        let results = join_all(responses.iter().map(|response| async move {
            (response, self.authority.submit_response(response).await)
        }))
        .await;

        for (response, result) in results {
            match result {
                Ok(tx_hash) => {
                    info!(
                        oracle = %response.oracle,
                        status = %response.status,
                        tx_hash = %tx_hash,
                        "status response submitted"
                    );
                    self.stats.responses_submitted.fetch_add(1, Ordering::Relaxed);
                    report.submitted.push(response.oracle);
                }
                Err(err) => {
                    warn!(
                        oracle = %response.oracle,
                        status = %response.status,
                        error = %err,
                        "status response failed"
                    );
                    self.stats.responses_failed.fetch_add(1, Ordering::Relaxed);
                    report.failed.push(response.oracle);
                }
            }
        }

        report
    }

    /// Wait for the registry, then handle every incoming event on its own task.
    pub async fn run(
        self: Arc<Self>,
        gate: RegistryGate,
        mut events: mpsc::Receiver<StatusRequestEvent>,
    ) {
        let registry = gate.wait_ready().await;
        info!(oracles = registry.len(), "dispatcher ready");

        while let Some(event) = events.recv().await {
            let dispatcher = self.clone();
            let registry = registry.clone();
            tokio::spawn(async move {
                dispatcher.handle(&event, &registry).await;
            });
        }

        info!("event stream ended, dispatcher stopping");
    }
}
