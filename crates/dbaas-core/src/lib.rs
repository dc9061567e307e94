//! Base abstractions for DBaaS-managed database clients
//!
//! A DBaaS control plane provisions logical databases on demand: callers
//! describe the database they want with a [`Classifier`] and receive
//! connection properties back. This crate holds the pieces that are shared
//! by every database-kind client built on top of that model:
//!
//! - [`Classifier`] - the ordered key-value identity of a logical database
//! - [`DbaasCache`] - a memoized, compute-once connection cache keyed by
//!   database kind plus classifier
//! - [`ProvisioningClient`] - the capability trait a control-plane client
//!   (or a test substitute) must implement
//! - [`ServiceIdentity`] - the ambient identity default classifiers scope by

pub mod cache;
pub mod classifier;
pub mod identity;
pub mod provisioning;

pub use cache::{CacheKey, DbaasCache};
pub use classifier::{Classifier, ClassifierValue};
pub use identity::{IdentityError, ServiceIdentity};
pub use provisioning::{LogicalDb, LogicalDbError, ProvisioningClient, RoleParams};
