//! In-memory (single process) implementation of the shared channel for
//! tests and local development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kine_channel::{MemberHandle, RelationId, RelationKind, SlotChannel, SlotData};
use tokio::sync::Mutex;

#[derive(Debug)]
struct Relation {
    kind: RelationKind,
    slots: BTreeMap<MemberHandle, SlotData>,
}

#[derive(Debug, Default)]
struct Inner {
    relations: BTreeMap<RelationId, Relation>,
    next_id: u64,
}

/// In-memory channel over per-relation, per-member slots.
///
/// Backed by sorted maps, so the ordering guarantees of [`SlotChannel`]
/// hold structurally. Clones share state.
#[derive(Clone, Debug)]
pub struct MemoryChannel {
    inner: Arc<Mutex<Inner>>,
    local: MemberHandle,
}

impl MemoryChannel {
    /// Creates a channel with the given local member handle.
    #[must_use]
    pub fn new(local: MemberHandle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            local,
        }
    }

    /// Creates a new relation of the given kind and returns its id.
    pub async fn add_relation(&self, kind: RelationKind) -> RelationId {
        let mut inner = self.inner.lock().await;
        let id = RelationId::new(format!("{kind}:{:04}", inner.next_id));
        inner.next_id += 1;
        inner.relations.insert(
            id.clone(),
            Relation {
                kind,
                slots: BTreeMap::new(),
            },
        );
        id
    }

    /// Adds a member to a relation with an empty slot.
    ///
    /// Unknown relations are ignored, matching the tolerance expected of
    /// test setup helpers.
    pub async fn join(&self, relation: &RelationId, member: MemberHandle) {
        let mut inner = self.inner.lock().await;
        if let Some(rel) = inner.relations.get_mut(relation) {
            rel.slots.entry(member).or_default();
        }
    }

    /// Sets one field in any member's slot, joining the member if needed.
    ///
    /// Test setup only; production code writes exclusively through
    /// [`SlotChannel::write_own_slot`].
    pub async fn set_field(
        &self,
        relation: &RelationId,
        member: &MemberHandle,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let mut inner = self.inner.lock().await;
        if let Some(rel) = inner.relations.get_mut(relation) {
            rel.slots
                .entry(member.clone())
                .or_default()
                .insert(key.into(), value.into());
        }
    }

    /// Snapshot of a member's slot, for assertions.
    pub async fn slot(&self, relation: &RelationId, member: &MemberHandle) -> SlotData {
        let inner = self.inner.lock().await;
        inner
            .relations
            .get(relation)
            .and_then(|rel| rel.slots.get(member))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SlotChannel for MemoryChannel {
    type Error = Error;

    fn local_member(&self) -> &MemberHandle {
        &self.local
    }

    async fn relations(&self, kind: RelationKind) -> Result<Vec<RelationId>, Self::Error> {
        let inner = self.inner.lock().await;
        Ok(inner
            .relations
            .iter()
            .filter(|(_, rel)| rel.kind == kind)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn remote_members(
        &self,
        relation: &RelationId,
    ) -> Result<Vec<MemberHandle>, Self::Error> {
        let inner = self.inner.lock().await;
        let rel = inner
            .relations
            .get(relation)
            .ok_or_else(|| Error::UnknownRelation(relation.clone()))?;
        Ok(rel
            .slots
            .keys()
            .filter(|member| **member != self.local)
            .cloned()
            .collect())
    }

    async fn read_slot(
        &self,
        relation: &RelationId,
        member: &MemberHandle,
    ) -> Result<SlotData, Self::Error> {
        let inner = self.inner.lock().await;
        let rel = inner
            .relations
            .get(relation)
            .ok_or_else(|| Error::UnknownRelation(relation.clone()))?;
        Ok(rel.slots.get(member).cloned().unwrap_or_default())
    }

    async fn read_own_slot(&self, relation: &RelationId) -> Result<SlotData, Self::Error> {
        self.read_slot(relation, &self.local).await
    }

    async fn write_own_slot(
        &self,
        relation: &RelationId,
        fields: SlotData,
    ) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock().await;
        let rel = inner
            .relations
            .get_mut(relation)
            .ok_or_else(|| Error::UnknownRelation(relation.clone()))?;
        rel.slots
            .entry(self.local.clone())
            .or_default()
            .extend(fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> MemoryChannel {
        MemoryChannel::new(MemberHandle::new("kine/0"))
    }

    #[tokio::test]
    async fn write_own_slot_merges_fields() {
        let channel = channel();
        let relation = channel.add_relation(RelationKind::Cluster).await;

        let mut first = SlotData::new();
        first.insert("a".into(), "1".into());
        channel.write_own_slot(&relation, first).await.unwrap();

        let mut second = SlotData::new();
        second.insert("b".into(), "2".into());
        channel.write_own_slot(&relation, second).await.unwrap();

        let own = channel.read_own_slot(&relation).await.unwrap();
        assert_eq!(own.get("a").map(String::as_str), Some("1"));
        assert_eq!(own.get("b").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn absent_member_reads_as_empty_slot() {
        let channel = channel();
        let relation = channel.add_relation(RelationKind::Cluster).await;

        let slot = channel
            .read_slot(&relation, &MemberHandle::new("kine/7"))
            .await
            .unwrap();
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn remote_members_sorted_and_excludes_self() {
        let channel = channel();
        let relation = channel.add_relation(RelationKind::Cluster).await;
        channel.join(&relation, MemberHandle::new("kine/2")).await;
        channel.join(&relation, MemberHandle::new("kine/0")).await;
        channel.join(&relation, MemberHandle::new("kine/1")).await;

        let members = channel.remote_members(&relation).await.unwrap();
        assert_eq!(
            members,
            vec![MemberHandle::new("kine/1"), MemberHandle::new("kine/2")]
        );
    }

    #[tokio::test]
    async fn relations_filtered_by_kind() {
        let channel = channel();
        let cluster = channel.add_relation(RelationKind::Cluster).await;
        let db = channel.add_relation(RelationKind::Db).await;

        assert_eq!(
            channel.relations(RelationKind::Cluster).await.unwrap(),
            vec![cluster]
        );
        assert_eq!(channel.relations(RelationKind::Db).await.unwrap(), vec![db]);
        assert!(
            channel
                .relations(RelationKind::Certificates)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_relation_is_an_error() {
        let channel = channel();
        let bogus = RelationId::new("cluster:9999");
        assert!(matches!(
            channel.read_own_slot(&bogus).await,
            Err(Error::UnknownRelation(_))
        ));
    }
}
