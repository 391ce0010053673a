//! Trigger dispatch wiring the channel, the supervisor, and the state store.

use kine_channel::{RelationId, RelationKind, SlotChannel, SlotData, fields};
use kine_identity::{NodeId, PeerIdentity};
use kine_membership::{Endpoint, MembershipSet, reconcile};
use kine_publisher::{ConsumerPublisher, DEFAULT_VERSION};
use kine_tls::CertificateClient;
use tracing::{debug, info};

use crate::error::Error;
use crate::state::{NodeState, StateStore};
use crate::supervisor::Supervisor;

/// Common name requested for this node's client certificate.
const CLIENT_CERT_COMMON_NAME: &str = "cn";

/// Client-facing etcd port consumers connect to.
const CLIENT_PORT: u16 = 2379;

/// Lifecycle triggers, dispatched by the external driver one at a time and
/// run to completion before the next. Every handler is idempotent, so a
/// trigger may be re-delivered with stale or partial channel data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Trigger {
    /// First installation of the endpoint service.
    InstallRequested,
    /// In-place upgrade; replays identity announcement and membership.
    UpgradeRequested,
    /// A cluster relation joined or its data changed.
    MembershipChanged,
    /// A certificate provider attached.
    CertificateProviderAttached,
    /// A certificate provider's slot changed; credentials may be ready.
    CredentialsAvailable,
    /// A consumer attached or its relation changed.
    ConsumerAttached,
}

/// Coordinates membership, credentials, and consumer publication for the
/// local node.
///
/// Holds no mutable state of its own; the [`NodeState`] record is loaded at
/// handler entry and saved at handler exit, and everything else is
/// recomputed from the channel on each trigger.
pub struct Coordinator<C, V, S>
where
    C: SlotChannel,
    V: Supervisor,
    S: StateStore,
{
    channel: C,
    supervisor: V,
    state_store: S,
    node_id: NodeId,
    certificates: CertificateClient<C>,
    publisher: ConsumerPublisher<C>,
}

impl<C, V, S> Coordinator<C, V, S>
where
    C: SlotChannel,
    V: Supervisor,
    S: StateStore,
{
    /// Creates a coordinator for the channel's local member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Identity`] when the local member handle carries no
    /// numeric ordinal to derive a node id from.
    pub fn new(channel: C, supervisor: V, state_store: S) -> Result<Self, Error> {
        let node_id = NodeId::derive(channel.local_member().as_str())?;
        info!(member = %channel.local_member(), %node_id, "coordinator initialized");
        Ok(Self {
            certificates: CertificateClient::new(channel.clone()),
            publisher: ConsumerPublisher::new(channel.clone()),
            channel,
            supervisor,
            state_store,
            node_id,
        })
    }

    /// The node id derived for the local member.
    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Dispatches one trigger to its handler, to completion.
    ///
    /// # Errors
    ///
    /// Returns an error on identity, channel, or state-store failure.
    /// Waiting states (missing credentials, unknown addresses, absent
    /// relations) complete with `Ok(())` and rely on re-triggering.
    pub async fn handle(&self, trigger: Trigger) -> Result<(), Error> {
        debug!(?trigger, "dispatching trigger");
        match trigger {
            Trigger::InstallRequested => self.on_install().await,
            Trigger::UpgradeRequested => self.on_upgrade().await,
            Trigger::MembershipChanged => self.on_membership_changed().await,
            Trigger::CertificateProviderAttached => {
                self.on_certificate_provider_attached().await
            }
            Trigger::CredentialsAvailable => self.on_credentials_available().await,
            Trigger::ConsumerAttached => self.on_consumer_attached().await,
        }
    }

    async fn on_install(&self) -> Result<(), Error> {
        let mut state = self.load_state().await?;
        self.supervisor.install_or_upgrade_package().await;
        self.reconfigure(&mut state).await?;
        self.save_state(&state).await
    }

    /// Upgrade replays the full membership path after reinstalling, since
    /// the previous process generation may predate the current peer set.
    async fn on_upgrade(&self) -> Result<(), Error> {
        self.on_install().await?;
        self.on_membership_changed().await
    }

    async fn on_membership_changed(&self) -> Result<(), Error> {
        let mut state = self.load_state().await?;
        for relation in self.relations(RelationKind::Cluster).await? {
            self.announce_identity(&relation).await?;
            let membership = self.aggregate_peers(&relation).await?;
            state.peers = membership.peers().to_vec();
        }
        self.reconfigure(&mut state).await?;
        self.save_state(&state).await
    }

    async fn on_certificate_provider_attached(&self) -> Result<(), Error> {
        self.certificates
            .request_client_certificate(CLIENT_CERT_COMMON_NAME, &[])
            .await?;
        Ok(())
    }

    async fn on_credentials_available(&self) -> Result<(), Error> {
        match self.certificates.credentials().await? {
            Some(bundle) => {
                info!("client credentials complete, publishing to consumers");
                self.publisher
                    .publish_credentials(&bundle.client_key, &bundle.client_cert, &bundle.root_ca)
                    .await?;
            }
            None => debug!("credentials incomplete, waiting for next trigger"),
        }
        Ok(())
    }

    /// Publishes the client-facing connection string to every consumer.
    ///
    /// Consumers dial the routable ingress address on the etcd client port;
    /// the internal dqlite endpoint never leaves the cluster.
    async fn on_consumer_attached(&self) -> Result<(), Error> {
        for relation in self.relations(RelationKind::Db).await? {
            let own = self.read_own_slot(&relation).await?;
            let Some(address) = own
                .get(fields::INGRESS_ADDRESS)
                .filter(|address| !address.is_empty())
            else {
                continue;
            };
            let connection_string = format!("http://{address}:{CLIENT_PORT}");
            self.publisher
                .publish_endpoint(&connection_string, DEFAULT_VERSION)
                .await?;
            return Ok(());
        }
        debug!("no consumer relation with a known ingress address yet");
        Ok(())
    }

    /// Announces this node's identity token, dialed by peers at the
    /// routable ingress address. Skipped while the address is not yet
    /// known; the next trigger retries.
    async fn announce_identity(&self, relation: &RelationId) -> Result<(), Error> {
        let own = self.read_own_slot(relation).await?;
        let Some(address) = own
            .get(fields::INGRESS_ADDRESS)
            .filter(|address| !address.is_empty())
        else {
            debug!("ingress address not yet known, skipping identity announcement");
            return Ok(());
        };

        let identity = PeerIdentity::format(self.node_id, address);
        let mut update = SlotData::new();
        update.insert(fields::PEER_IDENTITY.to_string(), identity.to_string());
        self.channel
            .write_own_slot(relation, update)
            .await
            .map_err(|e| Error::Channel(e.to_string()))
    }

    /// Rebuilds the membership set from the remote announcements currently
    /// visible on the relation, in sorted member order.
    async fn aggregate_peers(&self, relation: &RelationId) -> Result<MembershipSet, Error> {
        let mut announcements = Vec::new();
        for member in self
            .channel
            .remote_members(relation)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?
        {
            let slot = self
                .channel
                .read_slot(relation, &member)
                .await
                .map_err(|e| Error::Channel(e.to_string()))?;
            announcements.push(
                slot.get(fields::PEER_IDENTITY)
                    .map(|token| PeerIdentity::from_token(token.clone())),
            );
        }
        Ok(MembershipSet::rebuild(self.node_id, announcements))
    }

    /// Builds the endpoint from the current peer list and, when it differs
    /// from the last applied one, reconfigures and restarts the service.
    /// Always reports the node active afterwards.
    async fn reconfigure(&self, state: &mut NodeState) -> Result<(), Error> {
        let membership = MembershipSet::from_peers(state.peers.clone());
        let endpoint = Endpoint::from_membership(&membership);

        if reconcile(&endpoint, state.last_endpoint.as_ref()) {
            info!(%endpoint, "endpoint changed, reconfiguring service");
            self.supervisor
                .set_configuration(&endpoint, self.node_id)
                .await;
            self.supervisor.restart_service().await;
            state.last_endpoint = Some(endpoint);
        } else {
            debug!("endpoint unchanged, skipping restart");
        }
        self.supervisor.set_active_status().await;
        Ok(())
    }

    async fn relations(&self, kind: RelationKind) -> Result<Vec<RelationId>, Error> {
        self.channel
            .relations(kind)
            .await
            .map_err(|e| Error::Channel(e.to_string()))
    }

    async fn read_own_slot(&self, relation: &RelationId) -> Result<SlotData, Error> {
        self.channel
            .read_own_slot(relation)
            .await
            .map_err(|e| Error::Channel(e.to_string()))
    }

    async fn load_state(&self) -> Result<NodeState, Error> {
        let state = self
            .state_store
            .load()
            .await
            .map_err(|e| Error::State(e.to_string()))?;
        Ok(state.unwrap_or_else(|| NodeState {
            peers: MembershipSet::self_only(self.node_id).peers().to_vec(),
            last_endpoint: None,
        }))
    }

    async fn save_state(&self, state: &NodeState) -> Result<(), Error> {
        self.state_store
            .save(state)
            .await
            .map_err(|e| Error::State(e.to_string()))
    }
}
