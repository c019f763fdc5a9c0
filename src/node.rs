//! Wires bootstrap, the readiness barrier, the event listener and the dispatcher together

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::OracleConfig;
use crate::error::RemoteError;
use crate::models::OracleIdentity;
use crate::registry::{Registry, RegistryGate};
use crate::services::dispatcher::{DispatchStats, ResponseDispatcher};
use crate::services::event_listener::EventListener;
use crate::services::registration::{RegistrationCoordinator, RetryPolicy};
use crate::services::remote_authority::RemoteAuthority;
use crate::services::status_policy::StatusCodePolicy;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const PIPELINE_SUPERVISOR_MAX_BACKOFF_SECONDS: u64 = 30;

pub struct OracleNode {
    authority: Arc<dyn RemoteAuthority>,
    config: OracleConfig,
    gate: RegistryGate,
    dispatcher: Arc<ResponseDispatcher>,
    cursor: Arc<AtomicU64>,
}

impl OracleNode {
    pub fn new(
        authority: Arc<dyn RemoteAuthority>,
        config: OracleConfig,
        policy: Arc<dyn StatusCodePolicy>,
    ) -> Self {
        let dispatcher = Arc::new(ResponseDispatcher::new(authority.clone(), policy));
        let cursor = Arc::new(AtomicU64::new(config.from_block));

        Self {
            authority,
            config,
            gate: RegistryGate::new(),
            dispatcher,
            cursor,
        }
    }

    pub fn gate(&self) -> RegistryGate {
        self.gate.clone()
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.dispatcher.stats()
    }

    /// The configured account pool, or every account the node can sign for.
    pub async fn account_pool(&self) -> Result<Vec<OracleIdentity>, RemoteError> {
        match &self.config.accounts {
            Some(accounts) => Ok(accounts.clone()),
            None => self.authority.accounts().await,
        }
    }

    /// Register the oracles and publish the registry.
    ///
    /// Never fails: without a registration fee the registry is published empty
    /// and the node keeps listening, matching nothing.
    pub async fn bootstrap(&self, account_pool: &[OracleIdentity]) -> Arc<Registry> {
        match self.authority.is_operational().await {
            Ok(true) => {}
            Ok(false) => warn!("FlightSuretyApp is not operational, registrations will likely revert"),
            Err(err) => warn!(error = %err, "could not query operational status"),
        }

        let coordinator = RegistrationCoordinator::new(
            self.authority.clone(),
            RetryPolicy::new(self.config.registration_max_attempts),
            self.config.registration_concurrency,
        );

        let registry = match coordinator.bootstrap(account_pool, self.config.oracle_count).await {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(
                        oracle = %failure.oracle,
                        stage = %failure.stage,
                        reason = %failure.reason,
                        "oracle left out of registry"
                    );
                }
                report.registry
            }
            Err(err) => {
                error!(error = %err, "oracle bootstrap failed, continuing with an empty registry");
                Registry::new()
            }
        };

        match self.gate.publish(registry) {
            Ok(registry) => {
                info!(oracles = registry.len(), "registry published");
                registry
            }
            Err(err) => {
                warn!(error = %err, "keeping previously published registry");
                self.gate.wait_ready().await
            }
        }
    }

    /// Listener feeding the dispatcher. Event delivery starts only once the
    /// registry has been published.
    pub async fn serve_requests(&self) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let dispatcher = tokio::spawn(self.dispatcher.clone().run(self.gate.clone(), rx));

        self.gate.wait_ready().await;

        let listener = EventListener::with_cursor(
            self.authority.clone(),
            self.cursor.clone(),
            self.config.poll_interval,
            self.config.max_block_range,
        );
        listener.subscribe(tx).await;

        if let Err(join_error) = dispatcher.await {
            error!(error = %join_error, "dispatcher task failed");
        }
    }

    /// Bootstrap, then keep the request pipeline alive, restarting it with
    /// backoff. A restarted listener resumes from the last delivered block.
    pub async fn run(self: Arc<Self>, account_pool: Vec<OracleIdentity>) {
        self.bootstrap(&account_pool).await;

        let mut restart_count: u32 = 0;
        loop {
            let node = self.clone();
            let handle = tokio::spawn(async move { node.serve_requests().await });

            match handle.await {
                Ok(()) => warn!("oracle request pipeline stopped; restarting"),
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!("oracle request pipeline panicked; restarting");
                    } else {
                        error!(error = %join_error, "oracle request pipeline failed; restarting");
                    }
                }
            }

            restart_count = restart_count.saturating_add(1);
            let backoff_seconds = (2u64.saturating_pow(restart_count.min(5)))
                .min(PIPELINE_SUPERVISOR_MAX_BACKOFF_SECONDS);
            warn!(restart_count, backoff_seconds, "oracle request pipeline restart backoff");
            sleep(Duration::from_secs(backoff_seconds)).await;
        }
    }
}
