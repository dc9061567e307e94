//! Driver capability consumed by the connection manager
//!
//! The manager never talks to `mongodb` directly. It depends on [`Driver`],
//! which [`MongoDriver`](crate::MongoDriver) implements over the real
//! driver and tests implement over in-memory fakes. The trait also fixes the
//! authentication-error classification contract: adapters must map a
//! server-side credential rejection to [`DriverError::Unauthorized`], and
//! nothing else, so the rotation logic stays driver-agnostic.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::properties::MongoConnProperties;

/// Credential fields bound to a live connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub auth_db: String,
}

// Credentials must not leak through logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("auth_db", &self.auth_db)
            .finish_non_exhaustive()
    }
}

/// Everything a driver needs to establish one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSpec {
    pub url: String,
    /// Target database, after the dbName/authDbName fallback.
    pub database: String,
    pub credentials: Credentials,
    pub tls: bool,
}

impl ConnectSpec {
    #[must_use]
    pub fn from_properties(properties: &MongoConnProperties) -> Self {
        Self {
            url: properties.url.clone(),
            database: properties.database_name().to_string(),
            credentials: Credentials {
                username: properties.username.clone(),
                password: properties.password.clone(),
                auth_db: properties.auth_db_name.clone(),
            },
            tls: properties.tls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The server rejected the credentials bound to the session.
    #[error("authentication rejected: {message}")]
    Unauthorized { message: String },

    /// The connection URL could not be parsed.
    #[error("invalid connection url: {message}")]
    InvalidUrl { message: String },

    /// The server could not be reached or the round-trip failed.
    #[error("database unavailable: {message}")]
    Unavailable { message: String },
}

impl DriverError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Outcome of a liveness probe against a cached connection.
#[derive(Debug)]
pub enum Probe {
    /// The round-trip succeeded with the cached credentials.
    Healthy,
    /// The server rejected the cached credentials; rotation is warranted.
    AuthInvalid,
    /// The probe failed for a reason unrelated to authentication. Rotating
    /// credentials would not fix this, so it surfaces as an error.
    Unavailable(DriverError),
}

/// Session operations a database driver must offer.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Live session handle. Cloning must be cheap and share the session.
    type Connection: Clone + Send + Sync + 'static;
    /// Driver-specific client tuning supplied by the caller. Applied at the
    /// first connect and reused as-is when a rotation rebuilds the session.
    type Options: Clone + Default + Send + Sync + 'static;

    async fn connect(
        &self,
        spec: &ConnectSpec,
        options: &Self::Options,
    ) -> Result<Self::Connection, DriverError>;

    /// Lightweight round-trip to verify the session and its credentials.
    async fn ping(&self, connection: &Self::Connection) -> Result<(), DriverError>;

    /// Best-effort teardown of a superseded session.
    async fn close(&self, connection: &Self::Connection) -> Result<(), DriverError>;
}
