//! Ambient service identity
//!
//! Default classifiers scope logical databases by the identity of the
//! running microservice. The identity is normally loaded once at startup
//! from the deployment environment.

use std::env;

use thiserror::Error;

use crate::classifier::Classifier;

/// Environment variable names
mod vars {
    pub const MICROSERVICE_NAME: &str = "MICROSERVICE_NAME";
    pub const CLOUD_NAMESPACE: &str = "CLOUD_NAMESPACE";
}

/// Identity of the service on whose behalf logical databases are requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub microservice_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {0} is empty")]
    Empty(&'static str),
}

impl ServiceIdentity {
    #[must_use]
    pub fn new(microservice_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            microservice_name: microservice_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Load the identity from `MICROSERVICE_NAME` and `CLOUD_NAMESPACE`.
    pub fn from_env() -> Result<Self, IdentityError> {
        Ok(Self {
            microservice_name: read_var(vars::MICROSERVICE_NAME)?,
            namespace: read_var(vars::CLOUD_NAMESPACE)?,
        })
    }

    /// Classifier for the service-scoped logical database.
    #[must_use]
    pub fn service_classifier(&self) -> Classifier {
        Classifier::new()
            .with("microserviceName", self.microservice_name.as_str())
            .with("namespace", self.namespace.as_str())
            .with("scope", "service")
    }

    /// Classifier for a tenant-scoped logical database.
    #[must_use]
    pub fn tenant_classifier(&self, tenant_id: &str) -> Classifier {
        Classifier::new()
            .with("microserviceName", self.microservice_name.as_str())
            .with("namespace", self.namespace.as_str())
            .with("scope", "tenant")
            .with("tenantId", tenant_id)
    }
}

fn read_var(name: &'static str) -> Result<String, IdentityError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(IdentityError::Empty(name)),
        Ok(value) => Ok(value),
        Err(_) => Err(IdentityError::Missing(name)),
    }
}
