//! Teacher replicas: isolated, schema-translated local copies of a teacher's
//! slice of the central roster.
//!
//! - [`sandbox`] keeps generated destinations inside the instances root.
//! - [`bundle`] copies the deployable application bundle.
//! - [`ReplicaStore`] owns the replica's local SQLite database.
//! - [`ReplicaProvisioner`] ties them together for one teacher.

pub mod bundle;
pub mod error;
pub mod provision;
pub mod sandbox;

mod schema;
mod store;

pub use error::{Error, Result};
pub use provision::{ProvisionConfig, REPLICA_DB_FILE, ReplicaManifest, ReplicaProvisioner};
pub use schema::DEFAULT_CENTRAL_SERVER_URL;
pub use store::{ReplicaCounts, ReplicaStore, SyncLogEntry};
