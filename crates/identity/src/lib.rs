//! Node identity derivation for kine cluster members.
//!
//! Every cluster member derives a stable dqlite node id from its opaque
//! member handle and announces itself to peers as a [`PeerIdentity`] token.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Base port for dqlite peer listeners; a node listens on `9180 + id`.
pub const PEER_PORT_BASE: u16 = 9180;

/// Stable dqlite node id, always in `1..=9`.
///
/// Derived from the trailing ordinal of a member handle such as `"kine/4"`.
/// Ordinals wrap modulo 9, so `"kine/0"` and `"kine/9"` derive the same id.
/// Immutable for the lifetime of the node once computed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct NodeId(u8);

impl NodeId {
    /// Derives the node id from a member handle of the form
    /// `"<application>/<ordinal>"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kine_identity::NodeId;
    ///
    /// let id = NodeId::derive("kine/4").unwrap();
    /// assert_eq!(id.get(), 5);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedNodeName`] when the handle has no numeric
    /// ordinal after the last `/`.
    pub fn derive(handle: &str) -> Result<Self, Error> {
        let ordinal = handle
            .rsplit_once('/')
            .and_then(|(_, ordinal)| ordinal.parse::<u64>().ok())
            .ok_or_else(|| Error::MalformedNodeName(handle.to_string()))?;

        // The modulus keeps the value in 1..=9, so the cast cannot truncate.
        #[allow(clippy::cast_possible_truncation)]
        let id = ((ordinal % 9) + 1) as u8;
        Ok(Self(id))
    }

    /// The dqlite peer port this node listens on (`9180 + id`).
    #[must_use]
    pub const fn port(self) -> u16 {
        PEER_PORT_BASE + self.0 as u16
    }

    /// Raw id value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A formatted peer identity token, `"{id}:{address}:{port}"`.
///
/// One per cluster member. Uniqueness is by node id, not by address; the
/// membership layer appends tokens verbatim and does not resolve collisions.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Formats the identity token for a node reachable at `address`.
    ///
    /// The address is used as given; callers are responsible for supplying
    /// something peers can dial.
    #[must_use]
    pub fn format(node_id: NodeId, address: &str) -> Self {
        Self(format!("{node_id}:{address}:{}", node_id.port()))
    }

    /// Wraps an already-formatted token read off the channel, verbatim.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_always_in_range() {
        for ordinal in 0..18 {
            let id = NodeId::derive(&format!("app/{ordinal}")).unwrap();
            assert!((1..=9).contains(&id.get()), "ordinal {ordinal} -> {id}");
        }
    }

    #[test]
    fn derive_wraps_modulo_nine() {
        for ordinal in 0..9 {
            let low = NodeId::derive(&format!("app/{ordinal}")).unwrap();
            let high = NodeId::derive(&format!("app/{}", ordinal + 9)).unwrap();
            assert_eq!(low, high);
        }
    }

    #[test]
    fn derive_rejects_handles_without_ordinal() {
        assert!(matches!(
            NodeId::derive("app"),
            Err(Error::MalformedNodeName(_))
        ));
        assert!(matches!(
            NodeId::derive("app/x"),
            Err(Error::MalformedNodeName(_))
        ));
        assert!(matches!(NodeId::derive(""), Err(Error::MalformedNodeName(_))));
    }

    #[test]
    fn port_tracks_id() {
        let id = NodeId::derive("app/0").unwrap();
        assert_eq!(id.get(), 1);
        assert_eq!(id.port(), 9181);
    }

    #[test]
    fn format_renders_id_address_port() {
        let id = NodeId::derive("app/4").unwrap();
        assert_eq!(id.get(), 5);
        let identity = PeerIdentity::format(id, "10.0.0.1");
        assert_eq!(identity.as_str(), "5:10.0.0.1:9185");
    }
}
