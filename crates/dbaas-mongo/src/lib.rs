//! MongoDB client for DBaaS-provisioned logical databases
//!
//! Callers never open a MongoDB connection directly. They ask for "the
//! database identified by this classifier" and receive a ready-to-use
//! handle; provisioning, connection memoization and recovery from
//! out-of-band credential rotation happen underneath.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dbaas_core::{ProvisioningClient, ServiceIdentity};
//! use dbaas_mongo::{DbParams, MongoDbaasClient};
//!
//! # async fn run(control_plane: Arc<dyn ProvisioningClient>) -> dbaas_mongo::Result<()> {
//! let identity = ServiceIdentity::new("orders", "prod");
//! let client = MongoDbaasClient::new(control_plane, identity);
//! let database = client.service_database(DbParams::default());
//! let handle = database.db_client().get_database().await?;
//! let _orders = handle.database().collection::<mongodb::bson::Document>("orders");
//! # Ok(())
//! # }
//! ```
//!
//! The first call for a classifier provisions the logical database through
//! the control plane and connects; concurrent first callers share that one
//! computation. Later calls probe the cached connection and, when the server
//! rejects the cached credentials, transparently fetch the rotated ones,
//! rebuild the connection and replace the cache entry.

pub mod client;
pub mod database;
pub mod db_client;
pub mod driver;
mod error;
pub mod holder;
pub mod mongo;
pub mod properties;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{MongoDbaasClient, service_classifier, tenant_classifier};
pub use database::{ClassifierFn, DbParams, MongoDatabase};
pub use db_client::MongoDbClient;
pub use driver::{ConnectSpec, Credentials, Driver, DriverError, Probe};
pub use error::{Error, Result};
pub use holder::CachedConnection;
pub use mongo::{MongoDriver, MongoHandle};
pub use properties::MongoConnProperties;

// The driver crate is part of the public API surface (client options,
// database handles), so re-export it for version alignment.
pub use mongodb;

/// Database-kind discriminator sent to the control plane.
pub const DB_KIND: &str = "mongodb";
