use thiserror::Error;

/// Errors that can occur deriving node identity.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The member handle carries no numeric ordinal.
    #[error("malformed node name '{0}': expected '<application>/<ordinal>'")]
    MalformedNodeName(String),
}
