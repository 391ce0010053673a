//! Publication of connection details and credentials to attached consumers.
//!
//! Each node writes into its own slot of every consumer relation; consumers
//! aggregate across nodes themselves. Writes are last-writer-wins per node
//! and relation, with no cross-node coordination.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use kine_channel::{RelationKind, SlotChannel, SlotData, fields};
use tracing::{debug, info};

/// API version advertised to consumers.
pub const DEFAULT_VERSION: &str = "3.";

/// Publishes connection details to every attached consumer relation.
#[derive(Clone, Debug)]
pub struct ConsumerPublisher<C>
where
    C: SlotChannel,
{
    channel: C,
}

impl<C> ConsumerPublisher<C>
where
    C: SlotChannel,
{
    /// Creates a publisher over the given channel.
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Writes the connection string and API version to the own slot of
    /// every consumer relation, overwriting any prior value.
    ///
    /// # Errors
    ///
    /// Returns an error when a channel write fails.
    pub async fn publish_endpoint(
        &self,
        connection_string: &str,
        version: &str,
    ) -> Result<(), Error> {
        let relations = self
            .channel
            .relations(RelationKind::Db)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?;
        if relations.is_empty() {
            debug!("no consumers attached, nothing to publish");
            return Ok(());
        }

        info!(connection_string, "publishing connection string to consumers");
        for relation in relations {
            let mut update = SlotData::new();
            update.insert(fields::CONNECTION_STRING.to_string(), connection_string.to_string());
            update.insert(fields::VERSION.to_string(), version.to_string());
            self.channel
                .write_own_slot(&relation, update)
                .await
                .map_err(|e| Error::Channel(e.to_string()))?;
        }
        Ok(())
    }

    /// Writes the client credentials to the own slot of every consumer
    /// relation, overwriting any prior value.
    ///
    /// # Errors
    ///
    /// Returns an error when a channel write fails.
    pub async fn publish_credentials(
        &self,
        key: &str,
        cert: &str,
        ca: &str,
    ) -> Result<(), Error> {
        info!("publishing client credentials to consumers");
        for relation in self
            .channel
            .relations(RelationKind::Db)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?
        {
            let mut update = SlotData::new();
            update.insert(fields::CLIENT_KEY.to_string(), key.to_string());
            update.insert(fields::CLIENT_CERT.to_string(), cert.to_string());
            update.insert(fields::CLIENT_CA.to_string(), ca.to_string());
            self.channel
                .write_own_slot(&relation, update)
                .await
                .map_err(|e| Error::Channel(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kine_channel::MemberHandle;
    use kine_channel_memory::MemoryChannel;

    fn publisher() -> (ConsumerPublisher<MemoryChannel>, MemoryChannel) {
        let channel = MemoryChannel::new(MemberHandle::new("kine/0"));
        (ConsumerPublisher::new(channel.clone()), channel)
    }

    #[tokio::test]
    async fn publish_endpoint_writes_every_consumer_relation() {
        let (publisher, channel) = publisher();
        let first = channel.add_relation(RelationKind::Db).await;
        let second = channel.add_relation(RelationKind::Db).await;

        publisher
            .publish_endpoint("http://10.0.0.1:2379", DEFAULT_VERSION)
            .await
            .unwrap();

        let local = MemberHandle::new("kine/0");
        for relation in [&first, &second] {
            let slot = channel.slot(relation, &local).await;
            assert_eq!(
                slot.get(fields::CONNECTION_STRING).map(String::as_str),
                Some("http://10.0.0.1:2379")
            );
            assert_eq!(slot.get(fields::VERSION).map(String::as_str), Some("3."));
        }
    }

    #[tokio::test]
    async fn publish_endpoint_overwrites_prior_value() {
        let (publisher, channel) = publisher();
        let relation = channel.add_relation(RelationKind::Db).await;

        publisher
            .publish_endpoint("http://10.0.0.1:2379", DEFAULT_VERSION)
            .await
            .unwrap();
        publisher
            .publish_endpoint("http://10.0.0.9:2379", DEFAULT_VERSION)
            .await
            .unwrap();

        let slot = channel
            .slot(&relation, &MemberHandle::new("kine/0"))
            .await;
        assert_eq!(
            slot.get(fields::CONNECTION_STRING).map(String::as_str),
            Some("http://10.0.0.9:2379")
        );
    }

    #[tokio::test]
    async fn publish_credentials_writes_all_three_fields() {
        let (publisher, channel) = publisher();
        let relation = channel.add_relation(RelationKind::Db).await;

        publisher
            .publish_credentials("KEY", "CERT", "CA")
            .await
            .unwrap();

        let slot = channel
            .slot(&relation, &MemberHandle::new("kine/0"))
            .await;
        assert_eq!(slot.get(fields::CLIENT_KEY).map(String::as_str), Some("KEY"));
        assert_eq!(
            slot.get(fields::CLIENT_CERT).map(String::as_str),
            Some("CERT")
        );
        assert_eq!(slot.get(fields::CLIENT_CA).map(String::as_str), Some("CA"));
    }

    #[tokio::test]
    async fn publish_with_no_consumers_is_a_noop() {
        let (publisher, _channel) = publisher();
        publisher
            .publish_endpoint("http://10.0.0.1:2379", DEFAULT_VERSION)
            .await
            .unwrap();
        publisher
            .publish_credentials("KEY", "CERT", "CA")
            .await
            .unwrap();
    }
}
