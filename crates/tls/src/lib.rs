//! Client-certificate request and fulfillment against the CA provider.
//!
//! Requests are an append-only map in the node's own slot; issued material
//! is read back from the provider's slots once published. A single provider
//! is assumed per deployment, so the first one discovered (in sorted order)
//! receives all requests and is read first for fulfillment.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::BTreeMap;

use kine_channel::{RelationKind, SlotChannel, fields};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One outstanding certificate request: the subject alternative names to
/// issue for a common name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Subject alternative names.
    pub sans: Vec<String>,
}

/// An issued client certificate and key, as published by the provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    /// PEM-encoded client key.
    pub key: String,
    /// PEM-encoded client certificate.
    pub cert: String,
}

/// Everything needed to reach the endpoint service over TLS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialBundle {
    /// Root CA certificate.
    pub root_ca: String,
    /// Client key.
    pub client_key: String,
    /// Client certificate.
    pub client_cert: String,
}

/// Request map as serialized into the `client_cert_requests` field.
///
/// A `BTreeMap` so the JSON renders with keys in sorted order, keeping
/// repeated writes byte-identical and diffs reproducible.
type RequestMap = BTreeMap<String, CertificateRequest>;

type IssuedMap = BTreeMap<String, IssuedCertificate>;

/// Certificate protocol client bound to a channel.
#[derive(Clone, Debug)]
pub struct CertificateClient<C>
where
    C: SlotChannel,
{
    channel: C,
}

impl<C> CertificateClient<C>
where
    C: SlotChannel,
{
    /// Creates a client over the given channel.
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Records a request for a client certificate under `common_name`.
    ///
    /// Idempotent: a common name already present in the request map is left
    /// untouched (first write wins), so this is safe to invoke on every
    /// provider-attach trigger. With no provider attached the call is a
    /// silent no-op. Requests are never removed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel itself fails; a malformed
    /// existing request map is treated as empty.
    pub async fn request_client_certificate(
        &self,
        common_name: &str,
        sans: &[String],
    ) -> Result<(), Error> {
        let Some(relation) = self
            .channel
            .relations(RelationKind::Certificates)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?
            .into_iter()
            .next()
        else {
            debug!("no certificate provider attached, skipping request");
            return Ok(());
        };

        let own = self
            .channel
            .read_own_slot(&relation)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?;
        let mut requests: RequestMap = own
            .get(fields::CLIENT_CERT_REQUESTS)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        if requests.contains_key(common_name) {
            debug!(common_name, "client certificate already requested");
            return Ok(());
        }

        info!(common_name, "requesting client certificate");
        requests.insert(
            common_name.to_string(),
            CertificateRequest {
                sans: sans.to_vec(),
            },
        );
        let serialized =
            serde_json::to_string(&requests).map_err(|e| Error::Serialize(e.to_string()))?;

        let mut update = kine_channel::SlotData::new();
        update.insert(fields::CLIENT_CERT_REQUESTS.to_string(), serialized);
        self.channel
            .write_own_slot(&relation, update)
            .await
            .map_err(|e| Error::Channel(e.to_string()))
    }

    /// The root CA certificate, if any provider member has published one.
    ///
    /// Scans providers in sorted order and returns the first non-empty `ca`
    /// field. Only the provider leader is expected to publish it, or all
    /// members to publish the same value; disagreement is not resolved here.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel itself fails.
    pub async fn root_ca(&self) -> Result<Option<String>, Error> {
        for relation in self
            .channel
            .relations(RelationKind::Certificates)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?
        {
            for member in self
                .channel
                .remote_members(&relation)
                .await
                .map_err(|e| Error::Channel(e.to_string()))?
            {
                let slot = self
                    .channel
                    .read_slot(&relation, &member)
                    .await
                    .map_err(|e| Error::Channel(e.to_string()))?;
                if let Some(ca) = slot.get(fields::CA) {
                    if !ca.is_empty() {
                        return Ok(Some(ca.clone()));
                    }
                }
            }
        }
        Ok(None)
    }

    /// The first certificate issued for this node, if any.
    ///
    /// Looks up the member-scoped `processed_client_requests` field on every
    /// provider member. Absent, empty, malformed, and parsed-but-empty
    /// fields all read as "not yet available" rather than errors; callers
    /// retry on the next trigger. Additional issued entries beyond the
    /// first are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel itself fails.
    pub async fn client_certificate(&self) -> Result<Option<IssuedCertificate>, Error> {
        let field = self
            .channel
            .local_member()
            .scoped_field(fields::PROCESSED_CLIENT_REQUESTS);

        for relation in self
            .channel
            .relations(RelationKind::Certificates)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?
        {
            for member in self
                .channel
                .remote_members(&relation)
                .await
                .map_err(|e| Error::Channel(e.to_string()))?
            {
                let slot = self
                    .channel
                    .read_slot(&relation, &member)
                    .await
                    .map_err(|e| Error::Channel(e.to_string()))?;
                let Some(raw) = slot.get(&field) else {
                    continue;
                };
                if raw.is_empty() {
                    continue;
                }
                let issued: IssuedMap = match serde_json::from_str(raw) {
                    Ok(issued) => issued,
                    Err(e) => {
                        debug!(member = %member, error = %e, "ignoring malformed issued certificates");
                        continue;
                    }
                };
                if let Some(certificate) = issued.into_values().next() {
                    return Ok(Some(certificate));
                }
            }
        }
        Ok(None)
    }

    /// The full credential bundle, once both the root CA and a client
    /// certificate are available. A partial result yields `None` silently.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel itself fails.
    pub async fn credentials(&self) -> Result<Option<CredentialBundle>, Error> {
        let Some(root_ca) = self.root_ca().await? else {
            debug!("root CA not yet published");
            return Ok(None);
        };
        let Some(issued) = self.client_certificate().await? else {
            debug!("client certificate not yet issued");
            return Ok(None);
        };
        Ok(Some(CredentialBundle {
            root_ca,
            client_key: issued.key,
            client_cert: issued.cert,
        }))
    }
}
