use kine_channel::RelationId;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The relation id does not exist on this channel.
    #[error("unknown relation: {0}")]
    UnknownRelation(RelationId),
}
