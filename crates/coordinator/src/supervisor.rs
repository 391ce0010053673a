//! Seam to the side-effecting service supervisor.

use std::sync::Arc;

use async_trait::async_trait;
use kine_identity::NodeId;
use kine_membership::Endpoint;
use tokio::sync::Mutex;

/// Side-effecting collaborator that installs, configures, and restarts the
/// endpoint service and reports node status.
///
/// Infallible from the coordinator's perspective; failures are the
/// supervisor's concern to surface operationally.
#[async_trait]
pub trait Supervisor: Send + Sync + 'static {
    /// Installs the service package, or upgrades it in place.
    async fn install_or_upgrade_package(&self);

    /// Applies the endpoint and node id to the service configuration.
    async fn set_configuration(&self, endpoint: &Endpoint, node_id: NodeId);

    /// Restarts the service so new configuration takes effect.
    async fn restart_service(&self);

    /// Reports the node as active.
    async fn set_active_status(&self);
}

/// One recorded supervisor invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SupervisorAction {
    /// `install_or_upgrade_package` was invoked.
    Install,
    /// `set_configuration` was invoked with these values.
    Configure {
        /// Endpoint handed to the service.
        endpoint: Endpoint,
        /// Node id handed to the service.
        node_id: NodeId,
    },
    /// `restart_service` was invoked.
    Restart,
    /// `set_active_status` was invoked.
    ActiveStatus,
}

/// Supervisor test double that records every invocation in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSupervisor {
    actions: Arc<Mutex<Vec<SupervisorAction>>>,
}

impl RecordingSupervisor {
    /// Creates a supervisor with an empty action log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded actions, in invocation order.
    pub async fn actions(&self) -> Vec<SupervisorAction> {
        self.actions.lock().await.clone()
    }

    /// Number of restarts recorded so far.
    pub async fn restart_count(&self) -> usize {
        self.actions
            .lock()
            .await
            .iter()
            .filter(|action| **action == SupervisorAction::Restart)
            .count()
    }
}

#[async_trait]
impl Supervisor for RecordingSupervisor {
    async fn install_or_upgrade_package(&self) {
        self.actions.lock().await.push(SupervisorAction::Install);
    }

    async fn set_configuration(&self, endpoint: &Endpoint, node_id: NodeId) {
        self.actions.lock().await.push(SupervisorAction::Configure {
            endpoint: endpoint.clone(),
            node_id,
        });
    }

    async fn restart_service(&self) {
        self.actions.lock().await.push(SupervisorAction::Restart);
    }

    async fn set_active_status(&self) {
        self.actions
            .lock()
            .await
            .push(SupervisorAction::ActiveStatus);
    }
}
