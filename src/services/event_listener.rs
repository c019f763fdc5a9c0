//! Listener for `OracleRequest` events emitted by the FlightSuretyApp contract
//!
//! Polls `eth_getLogs` in bounded block ranges, starting from a configurable
//! block (0 replays the whole chain history), and hands every decoded event to
//! the dispatcher over a channel. Delivery is at-least-once: the cursor only
//! advances after a whole range has been handed over.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::RemoteError;
use crate::models::StatusRequestEvent;
use crate::services::flight_surety;
use crate::services::remote_authority::RemoteAuthority;

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("event sink closed")]
    SinkClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub delivered: usize,
    pub caught_up: bool,
}

pub struct EventListener {
    authority: Arc<dyn RemoteAuthority>,
    cursor: Arc<AtomicU64>,
    poll_interval: Duration,
    max_block_range: u64,
}

impl EventListener {
    pub fn new(
        authority: Arc<dyn RemoteAuthority>,
        from_block: u64,
        poll_interval: Duration,
        max_block_range: u64,
    ) -> Self {
        Self::with_cursor(
            authority,
            Arc::new(AtomicU64::new(from_block)),
            poll_interval,
            max_block_range,
        )
    }

    /// Resume from a cursor shared with a previous listener instance.
    pub fn with_cursor(
        authority: Arc<dyn RemoteAuthority>,
        cursor: Arc<AtomicU64>,
        poll_interval: Duration,
        max_block_range: u64,
    ) -> Self {
        Self {
            authority,
            cursor,
            poll_interval,
            max_block_range: max_block_range.max(1),
        }
    }

    /// Next block that will be queried.
    pub fn next_block(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Deliver events to `sink` until its receiver goes away.
    ///
    /// Remote failures and malformed events are logged; neither ends the loop.
    pub async fn subscribe(self, sink: mpsc::Sender<StatusRequestEvent>) {
        info!(from_block = self.next_block(), "listening for OracleRequest events");

        loop {
            match self.poll_once(&sink).await {
                Ok(outcome) if !outcome.caught_up => continue,
                Ok(_) => {}
                Err(PollError::SinkClosed) => {
                    info!("event sink closed, stopping listener");
                    return;
                }
                Err(PollError::Remote(err)) => {
                    error!(error = %err, next_block = self.next_block(), "event poll failed");
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    pub async fn poll_once(
        &self,
        sink: &mpsc::Sender<StatusRequestEvent>,
    ) -> Result<PollOutcome, PollError> {
        let latest_block = self.authority.latest_block().await?;
        let from_block = self.next_block();
        if from_block > latest_block {
            return Ok(PollOutcome {
                delivered: 0,
                caught_up: true,
            });
        }

        // Bound the range per cycle to keep requests and processing predictable.
        let to_block = latest_block.min(from_block.saturating_add(self.max_block_range - 1));
        let logs = self.authority.status_request_logs(from_block, to_block).await?;

        let mut delivered = 0;
        for log in logs {
            match flight_surety::decode_status_request(&log) {
                Ok(event) => {
                    debug!(
                        index = %event.index,
                        airline = %event.airline,
                        flight = %event.flight,
                        timestamp = event.timestamp,
                        "status request received"
                    );
                    sink.send(event).await.map_err(|_| PollError::SinkClosed)?;
                    delivered += 1;
                }
                Err(err) => warn!(
                    block = ?log.block_number,
                    tx_hash = ?log.transaction_hash,
                    error = %err,
                    "dropping malformed OracleRequest event"
                ),
            }
        }

        self.cursor.store(to_block.saturating_add(1), Ordering::SeqCst);
        if delivered > 0 {
            info!(from_block, to_block, delivered, "status requests delivered");
        }

        Ok(PollOutcome {
            delivered,
            caught_up: to_block == latest_block,
        })
    }
}
