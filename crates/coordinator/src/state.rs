//! Persistent per-node coordination state.

use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use kine_identity::PeerIdentity;
use kine_membership::Endpoint;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// The durable record a node keeps between triggers.
///
/// Everything else is recomputed from the channel on each trigger; only the
/// aggregated peer list and the endpoint last applied to the service are
/// persisted, the latter so an unchanged endpoint suppresses the restart.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Ordered peer identities, self entry first.
    pub peers: Vec<PeerIdentity>,
    /// Endpoint last handed to the supervisor.
    pub last_endpoint: Option<Endpoint>,
}

/// Durable storage for the node state record.
///
/// The coordinator loads the record at handler entry and saves it at handler
/// exit; it holds no other mutable state across triggers.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Error surfaced by the backing store.
    type Error: Debug + std::error::Error + Send + Sync;

    /// Loads the record; `None` on first run.
    async fn load(&self) -> Result<Option<NodeState>, Self::Error>;

    /// Persists the record.
    async fn save(&self, state: &NodeState) -> Result<(), Self::Error>;
}

/// In-memory state store for tests and local development.
#[derive(Clone, Debug, Default)]
pub struct MemoryStateStore {
    state: Arc<Mutex<Option<NodeState>>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    type Error = Infallible;

    async fn load(&self) -> Result<Option<NodeState>, Self::Error> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &NodeState) -> Result<(), Self::Error> {
        *self.state.lock().await = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_is_none_until_first_save() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let state = NodeState {
            peers: vec![PeerIdentity::from_token("1:0.0.0.0:9181")],
            last_endpoint: None,
        };
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(state));
    }
}
