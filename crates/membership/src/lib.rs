//! Membership aggregation and dqlite endpoint construction.
//!
//! The membership set is always rebuilt from scratch on a trigger, never
//! patched in place, so repeating the rebuild over stale or out-of-order
//! channel data converges to the same sequence. The endpoint is a pure
//! function of the set, and [`reconcile`] gates the service restart on an
//! actual change.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::fmt;

use kine_identity::{NodeId, PeerIdentity};
use serde::{Deserialize, Serialize};

/// Address the self entry binds to. The local process listens on all
/// interfaces while peers dial it by routable address.
pub const SELF_BIND_ADDRESS: &str = "0.0.0.0";

const ENDPOINT_PREFIX: &str = "dqlite://?peer=";

/// Ordered sequence of peer identity tokens, self entry first.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MembershipSet(Vec<PeerIdentity>);

impl MembershipSet {
    /// Builds a fresh set: the local node bound to all interfaces first,
    /// then each announced remote identity verbatim, in the order supplied.
    /// Members without an announcement are skipped.
    ///
    /// Identities are not deduplicated by node id; two peers whose ordinals
    /// wrap onto the same id both appear in the endpoint.
    #[must_use]
    pub fn rebuild<I>(local: NodeId, announcements: I) -> Self
    where
        I: IntoIterator<Item = Option<PeerIdentity>>,
    {
        let mut peers = vec![PeerIdentity::format(local, SELF_BIND_ADDRESS)];
        peers.extend(announcements.into_iter().flatten());
        Self(peers)
    }

    /// Set containing only the self entry, used before any peer announces.
    #[must_use]
    pub fn self_only(local: NodeId) -> Self {
        Self::rebuild(local, [])
    }

    /// Restores a set persisted in the node state record.
    #[must_use]
    pub const fn from_peers(peers: Vec<PeerIdentity>) -> Self {
        Self(peers)
    }

    /// The identity tokens in order.
    #[must_use]
    pub fn peers(&self) -> &[PeerIdentity] {
        &self.0
    }

    /// Number of members, always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A set is never empty; this exists to satisfy the `len` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The dqlite cluster connection string.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Renders `dqlite://?peer=<t1>&peer=<t2>&...` from the membership set.
    ///
    /// Pure and deterministic: equal sequences render equal endpoints, which
    /// is what makes [`reconcile`] a reliable restart gate.
    #[must_use]
    pub fn from_membership(membership: &MembershipSet) -> Self {
        let peers = membership
            .peers()
            .iter()
            .map(PeerIdentity::as_str)
            .collect::<Vec<_>>()
            .join("&peer=");
        Self(format!("{ENDPOINT_PREFIX}{peers}"))
    }

    /// The connection string as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a freshly built endpoint differs from the last one applied.
///
/// `true` means the caller should reconfigure and restart the service;
/// equal endpoints must not trigger a restart.
#[must_use]
pub fn reconcile(new: &Endpoint, previous: Option<&Endpoint>) -> bool {
    previous != Some(new)
}
