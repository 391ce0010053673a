use thiserror::Error;

/// Errors from the certificate request/fulfillment protocol.
///
/// "Not yet available" conditions are not errors; readers return `None`
/// for those and callers wait for the next trigger.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Channel read or write failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// The outgoing request map could not be serialized.
    #[error("serialize certificate requests: {0}")]
    Serialize(String),
}
