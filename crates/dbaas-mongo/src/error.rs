use std::sync::Arc;

use dbaas_core::{Classifier, LogicalDbError};
use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum Error {
    /// The control plane rejected or failed a provisioning call. The
    /// HTTP-style status is preserved in the source for caller branching.
    #[error("provisioning mongodb database {classifier} failed: {source}")]
    Provisioning {
        classifier: Classifier,
        #[source]
        source: LogicalDbError,
    },

    /// Connection properties returned by the control plane did not match the
    /// expected shape.
    #[error("mongodb connection properties for {classifier} have an unexpected shape: {source}")]
    Properties {
        classifier: Classifier,
        #[source]
        source: serde_json::Error,
    },

    /// The driver failed to establish a session against otherwise valid
    /// properties.
    #[error("connecting to mongodb database {classifier} failed: {source}")]
    Connect {
        classifier: Classifier,
        #[source]
        source: DriverError,
    },

    /// A cached connection failed its liveness probe for a reason other than
    /// authentication. Rotation is never attempted for these.
    #[error("probe of mongodb database {classifier} failed: {source}")]
    Probe {
        classifier: Classifier,
        #[source]
        source: DriverError,
    },

    /// Failure of a memoized first connection, observed by every caller that
    /// raced on the same computation.
    #[error(transparent)]
    Shared(Arc<Error>),
}

impl Error {
    pub(crate) fn provisioning(classifier: Classifier, source: LogicalDbError) -> Self {
        Self::Provisioning { classifier, source }
    }

    pub(crate) fn properties(classifier: Classifier, source: serde_json::Error) -> Self {
        Self::Properties { classifier, source }
    }

    pub(crate) fn connect(classifier: Classifier, source: DriverError) -> Self {
        Self::Connect { classifier, source }
    }

    pub(crate) fn probe(classifier: Classifier, source: DriverError) -> Self {
        Self::Probe { classifier, source }
    }

    fn root(&self) -> &Self {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Classifier of the logical database the failing call was about.
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        match self {
            Self::Provisioning { classifier, .. }
            | Self::Properties { classifier, .. }
            | Self::Connect { classifier, .. }
            | Self::Probe { classifier, .. } => classifier,
            Self::Shared(inner) => inner.classifier(),
        }
    }

    /// Control-plane status code, when the failure came from provisioning.
    #[must_use]
    pub fn provisioning_status(&self) -> Option<u16> {
        match self.root() {
            Self::Provisioning { source, .. } => Some(source.status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_provisioning(&self) -> bool {
        matches!(self.root(), Self::Provisioning { .. })
    }

    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self.root(), Self::Connect { .. })
    }

    #[must_use]
    pub fn is_probe(&self) -> bool {
        matches!(self.root(), Self::Probe { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
