use thiserror::Error;

/// Coordinator errors.
///
/// Only identity derivation is a hard operational fault; everything else
/// downstream of a healthy channel is a silent waiting state handled inside
/// the components.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The local member handle yields no node id; all identity-dependent
    /// logic is meaningless, so this propagates.
    #[error(transparent)]
    Identity(#[from] kine_identity::Error),

    /// Channel read or write failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// The node state record could not be loaded or saved.
    #[error("state store error: {0}")]
    State(String),

    /// Certificate protocol failure.
    #[error(transparent)]
    Tls(#[from] kine_tls::Error),

    /// Consumer publication failure.
    #[error(transparent)]
    Publish(#[from] kine_publisher::Error),
}
