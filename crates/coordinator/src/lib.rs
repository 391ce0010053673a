//! Membership and configuration coordination for a kine cluster node.
//!
//! kine is a SQL-backed, etcd-compatible endpoint service running on
//! dqlite. Each node derives a stable identity from its member handle,
//! aggregates peer identities over the shared channel into the dqlite
//! connection string, obtains TLS client credentials from the CA provider,
//! and republishes the connection string and credentials to attached
//! consumers.
//!
//! The [`Coordinator`] is driven by an external lifecycle driver delivering
//! [`Trigger`]s one at a time; side effects on the service itself go
//! through the [`Supervisor`] seam.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod dispatch;
mod error;
mod state;
mod supervisor;

pub use dispatch::{Coordinator, Trigger};
pub use error::Error;
pub use state::{MemoryStateStore, NodeState, StateStore};
pub use supervisor::{RecordingSupervisor, Supervisor, SupervisorAction};
