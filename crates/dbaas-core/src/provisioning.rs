//! Provisioning-client capability
//!
//! The control plane creates logical databases on demand and hands out their
//! connection properties. Database clients depend only on the
//! [`ProvisioningClient`] trait so that the real REST client and test
//! substitutes are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::Classifier;

/// Role and naming hints forwarded to the control plane on provisioning calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleParams {
    /// Database role requested for the issued credentials, control-plane
    /// defined (e.g. `admin`, `rw`, `ro`). `None` requests the default role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl RoleParams {
    #[must_use]
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
        }
    }
}

/// A logical database as described by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalDb {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Raw connection properties. The shape is database-kind specific; kind
    /// clients deserialize it into their typed properties model.
    pub connection_properties: serde_json::Value,
}

/// Failure reported by the control plane. The HTTP-style status is preserved
/// verbatim so callers can branch on it; this layer never special-cases it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("control plane returned status {status}: {message}")]
pub struct LogicalDbError {
    pub status: u16,
    pub message: String,
}

impl LogicalDbError {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The logical database does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Operations a DBaaS control plane offers to database clients.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Connection properties for the classified database, creating the
    /// database first if it does not exist yet.
    async fn get_or_create(
        &self,
        db_kind: &str,
        classifier: &Classifier,
        params: &RoleParams,
    ) -> Result<LogicalDb, LogicalDbError>;

    /// Connection properties for an already existing database. Never creates
    /// one; used to pick up credentials rotated out of band.
    async fn get_existing(
        &self,
        db_kind: &str,
        classifier: &Classifier,
        params: &RoleParams,
    ) -> Result<LogicalDb, LogicalDbError>;
}
