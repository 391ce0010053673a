//! Field names exchanged over the channel.

/// Routable address of the local member on a relation.
pub const INGRESS_ADDRESS: &str = "ingress-address";

/// A cluster member's announced identity token.
pub const PEER_IDENTITY: &str = "peer_identity";

/// Serialized map of outstanding client-certificate requests.
pub const CLIENT_CERT_REQUESTS: &str = "client_cert_requests";

/// Root CA certificate published by the provider.
pub const CA: &str = "ca";

/// Suffix of the per-member provider field carrying issued certificates.
pub const PROCESSED_CLIENT_REQUESTS: &str = "processed_client_requests";

/// Connection string published to consumers.
pub const CONNECTION_STRING: &str = "connection_string";

/// API version published to consumers.
pub const VERSION: &str = "version";

/// Client key published to consumers.
pub const CLIENT_KEY: &str = "client_key";

/// Client certificate published to consumers.
pub const CLIENT_CERT: &str = "client_cert";

/// CA certificate published to consumers.
pub const CLIENT_CA: &str = "client_ca";
