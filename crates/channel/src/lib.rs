//! Shared key-value exchange channel between cluster members.
//!
//! All coordination flows through per-relation, per-member slots of
//! string-valued fields. A member may read any slot but writes only its own;
//! convergence comes from re-running handlers on change triggers rather than
//! from transactional writes. The channel is eventually consistent and
//! handlers must tolerate stale or partially-initialized slots.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod fields;

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The kinds of relations a member participates in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RelationKind {
    /// Peer membership between cluster members.
    Cluster,
    /// The certificate-authority provider.
    Certificates,
    /// Attached consumers of the endpoint service.
    Db,
}

impl RelationKind {
    /// Wire name of the relation kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Certificates => "certificates",
            Self::Db => "db",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one relation instance on the channel.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct RelationId(String);

impl RelationId {
    /// Creates a relation id from its wire name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable opaque name of a member, format `"<application>/<ordinal>"`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct MemberHandle(String);

impl MemberHandle {
    /// Creates a handle from its wire name.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the member-scoped field name used by the CA provider, with
    /// the path-unsafe separator replaced: `"kine/0"` becomes
    /// `"kine_0.<suffix>"`.
    #[must_use]
    pub fn scoped_field(&self, suffix: &str) -> String {
        format!("{}.{suffix}", self.0.replace('/', "_"))
    }
}

impl fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One member's slot: a map of string-valued fields.
pub type SlotData = BTreeMap<String, String>;

/// Read/write access to the shared channel.
///
/// Implementations expose reads over any member's slot but writes over the
/// local member's slot only; remote slots are owned by their members. All
/// listing methods return stable sorted orders so that scans and "first
/// discovered" selections are deterministic across re-triggers.
#[async_trait]
pub trait SlotChannel: Clone + Send + Sync + 'static {
    /// Error surfaced by channel operations.
    type Error: Debug + Error + Send + Sync;

    /// Handle of the local member.
    fn local_member(&self) -> &MemberHandle;

    /// All relation instances of the given kind, in sorted order.
    async fn relations(&self, kind: RelationKind) -> Result<Vec<RelationId>, Self::Error>;

    /// Remote members visible on a relation, sorted by handle.
    async fn remote_members(
        &self,
        relation: &RelationId,
    ) -> Result<Vec<MemberHandle>, Self::Error>;

    /// Reads a member's slot. Absent members read as an empty slot.
    async fn read_slot(
        &self,
        relation: &RelationId,
        member: &MemberHandle,
    ) -> Result<SlotData, Self::Error>;

    /// Reads the local member's own slot.
    async fn read_own_slot(&self, relation: &RelationId) -> Result<SlotData, Self::Error>;

    /// Merge-writes fields into the local member's own slot.
    async fn write_own_slot(
        &self,
        relation: &RelationId,
        fields: SlotData,
    ) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_field_replaces_separator() {
        let handle = MemberHandle::new("kine/0");
        assert_eq!(
            handle.scoped_field(fields::PROCESSED_CLIENT_REQUESTS),
            "kine_0.processed_client_requests"
        );
    }

    #[test]
    fn relation_kind_wire_names() {
        assert_eq!(RelationKind::Cluster.name(), "cluster");
        assert_eq!(RelationKind::Certificates.name(), "certificates");
        assert_eq!(RelationKind::Db.name(), "db");
    }
}
