//! Typed MongoDB connection properties
//!
//! Wire shape produced by the control plane:
//! `{url, username, password, authDbName, dbName?, tls?}`. Properties are
//! immutable; a rotation produces a fresh record, never a mutated one.

use std::fmt;

use dbaas_core::LogicalDb;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoConnProperties {
    pub url: String,
    pub username: String,
    pub password: String,
    pub auth_db_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

impl MongoConnProperties {
    /// Deserialize from the raw properties of a provisioned logical database.
    pub fn from_logical_db(logical: &LogicalDb) -> Result<Self, serde_json::Error> {
        serde_json::from_value(logical.connection_properties.clone())
    }

    /// Name of the database the caller should operate on. Falls back to the
    /// authentication database when no dedicated name was issued.
    #[must_use]
    pub fn database_name(&self) -> &str {
        match self.db_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.auth_db_name,
        }
    }
}

// Credentials must not leak through logs.
impl fmt::Debug for MongoConnProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConnProperties")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("auth_db_name", &self.auth_db_name)
            .field("db_name", &self.db_name)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}
