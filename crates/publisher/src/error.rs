use thiserror::Error;

/// Errors that can occur publishing to consumers.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Channel write failed.
    #[error("channel error: {0}")]
    Channel(String),
}
