//! Oracle registry and the readiness barrier that guards it
//!
//! The registry is written once during bootstrap and only read afterwards.
//! `RegistryGate` makes that ordering explicit: dispatch code obtains the
//! registry through [`RegistryGate::wait_ready`], which does not return until
//! bootstrap has published it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::RegistryError;
use crate::models::{IndexAssignment, OracleIdentity, OracleIndex};

/// Locally controlled oracles and the indexes assigned to each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: HashMap<OracleIdentity, IndexAssignment>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        identity: OracleIdentity,
        assignment: IndexAssignment,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(&identity) {
            return Err(RegistryError::DuplicateIdentity(identity));
        }
        self.entries.insert(identity, assignment);
        Ok(())
    }

    pub fn get(&self, identity: &OracleIdentity) -> Option<&IndexAssignment> {
        self.entries.get(identity)
    }

    /// Every oracle whose assignment contains `index`.
    pub fn matching(&self, index: OracleIndex) -> impl Iterator<Item = &OracleIdentity> + '_ {
        self.entries
            .iter()
            .filter(move |(_, assignment)| assignment.contains(index))
            .map(|(identity, _)| identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OracleIdentity, &IndexAssignment)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by identity, for display.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = self
            .entries
            .iter()
            .map(|(identity, assignment)| RegistryEntry {
                oracle: *identity,
                indexes: assignment.indexes(),
            })
            .collect();
        entries.sort_by(|a, b| a.oracle.cmp(&b.oracle));
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub oracle: OracleIdentity,
    pub indexes: [OracleIndex; 3],
}

/// Write-once publication point for the registry.
#[derive(Clone)]
pub struct RegistryGate {
    tx: Arc<watch::Sender<Option<Arc<Registry>>>>,
}

impl Default for RegistryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publish the finished registry. Only the first call succeeds.
    pub fn publish(&self, registry: Registry) -> Result<Arc<Registry>, RegistryError> {
        let registry = Arc::new(registry);
        let mut published = false;
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(registry.clone());
            published = true;
            true
        });

        if published {
            Ok(registry)
        } else {
            Err(RegistryError::AlreadyPublished)
        }
    }

    /// The registry if bootstrap has finished.
    pub fn current(&self) -> Option<Arc<Registry>> {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until bootstrap has published the registry.
    pub async fn wait_ready(&self) -> Arc<Registry> {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(registry) = rx.borrow_and_update().clone() {
                return registry;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                tracing::error!("registry gate closed before publication");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn oracle(n: u8) -> OracleIdentity {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        OracleIdentity::new(crate::models::Address::from_bytes(bytes))
    }

    fn assignment(raw: [u8; 3]) -> IndexAssignment {
        IndexAssignment::try_from(raw).unwrap()
    }

    #[test]
    fn test_matching_by_index() {
        let mut registry = Registry::new();
        registry.insert(oracle(1), assignment([1, 4, 9])).unwrap();
        registry.insert(oracle(2), assignment([2, 4, 7])).unwrap();

        let mut for_four: Vec<_> = registry.matching(OracleIndex::new(4)).copied().collect();
        for_four.sort();
        assert_eq!(for_four, vec![oracle(1), oracle(2)]);

        let for_nine: Vec<_> = registry.matching(OracleIndex::new(9)).copied().collect();
        assert_eq!(for_nine, vec![oracle(1)]);

        assert_eq!(registry.matching(OracleIndex::new(3)).count(), 0);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut registry = Registry::new();
        registry.insert(oracle(1), assignment([1, 4, 9])).unwrap();

        assert_eq!(
            registry.insert(oracle(1), assignment([0, 2, 3])),
            Err(RegistryError::DuplicateIdentity(oracle(1)))
        );
        assert_eq!(registry.get(&oracle(1)), Some(&assignment([1, 4, 9])));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let mut registry = Registry::new();
        registry.insert(oracle(2), assignment([2, 4, 7])).unwrap();
        registry.insert(oracle(1), assignment([1, 4, 9])).unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].oracle, oracle(1));
        assert_eq!(snapshot[1].oracle, oracle(2));
    }

    #[test]
    fn test_gate_publishes_once() {
        let gate = RegistryGate::new();
        assert!(!gate.is_ready());

        gate.publish(Registry::new()).unwrap();
        assert!(gate.is_ready());
        assert_eq!(gate.publish(Registry::new()), Err(RegistryError::AlreadyPublished));
    }

    #[tokio::test]
    async fn test_wait_ready_blocks_until_publication() {
        let gate = RegistryGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_ready().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let mut registry = Registry::new();
        registry.insert(oracle(1), assignment([1, 4, 9])).unwrap();
        gate.publish(registry).unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.len(), 1);
    }
}
