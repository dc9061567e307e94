//! Logical-database surface bound to one classifier

use std::fmt;
use std::sync::Arc;

use dbaas_core::{Classifier, DbaasCache, ProvisioningClient, RoleParams, ServiceIdentity};

use crate::DB_KIND;
use crate::db_client::MongoDbClient;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::holder::CachedConnection;
use crate::mongo::MongoDriver;
use crate::properties::MongoConnProperties;

/// Classifier override: builds the identity of the requested logical
/// database from the ambient service identity.
pub type ClassifierFn = Arc<dyn Fn(&ServiceIdentity) -> Classifier + Send + Sync>;

/// Per-database parameters accepted by the client facade.
#[derive(Clone, Default)]
pub struct DbParams {
    /// Overrides the default classifier selection.
    pub classifier: Option<ClassifierFn>,
    /// Role hints forwarded to the control plane.
    pub base: RoleParams,
}

impl DbParams {
    #[must_use]
    pub fn with_classifier(mut self, classifier: ClassifierFn) -> Self {
        self.classifier = Some(classifier);
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.base.role = Some(role.into());
        self
    }
}

impl fmt::Debug for DbParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbParams")
            .field("classifier", &self.classifier.as_ref().map(|_| "<fn>"))
            .field("base", &self.base)
            .finish()
    }
}

/// One classified logical database, handed out by
/// [`MongoDbaasClient`](crate::MongoDbaasClient).
pub struct MongoDatabase<P, D = MongoDriver>
where
    P: ProvisioningClient + ?Sized,
    D: Driver,
{
    driver: Arc<D>,
    provisioning: Arc<P>,
    cache: Arc<DbaasCache<CachedConnection<D::Connection>, Error>>,
    classifier: Classifier,
    params: RoleParams,
}

impl<P, D> fmt::Debug for MongoDatabase<P, D>
where
    P: ProvisioningClient + ?Sized,
    D: Driver,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDatabase")
            .field("classifier", &self.classifier)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<P, D> MongoDatabase<P, D>
where
    P: ProvisioningClient + ?Sized + 'static,
    D: Driver,
{
    pub(crate) fn new(
        driver: Arc<D>,
        provisioning: Arc<P>,
        cache: Arc<DbaasCache<CachedConnection<D::Connection>, Error>>,
        classifier: Classifier,
        params: RoleParams,
    ) -> Self {
        Self {
            driver,
            provisioning,
            cache,
            classifier,
            params,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Connection manager with default driver options.
    #[must_use]
    pub fn db_client(&self) -> MongoDbClient<P, D> {
        self.db_client_with_options(D::Options::default())
    }

    /// Connection manager with caller-tuned driver options. The options are
    /// applied at the first connect and reused verbatim when a rotation
    /// rebuilds the connection, with only the authentication fields changed.
    #[must_use]
    pub fn db_client_with_options(&self, options: D::Options) -> MongoDbClient<P, D> {
        MongoDbClient::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.provisioning),
            Arc::clone(&self.cache),
            self.classifier.clone(),
            self.params.clone(),
            options,
        )
    }

    /// Typed connection properties, creating the logical database if it does
    /// not exist yet. Goes to the control plane on every call; the
    /// connection cache is not involved.
    pub async fn connection_properties(&self) -> Result<MongoConnProperties> {
        let logical = self
            .provisioning
            .get_or_create(DB_KIND, &self.classifier, &self.params)
            .await
            .map_err(|source| {
                tracing::error!(classifier = %self.classifier, %source, "error acquiring connection properties");
                Error::provisioning(self.classifier.clone(), source)
            })?;
        MongoConnProperties::from_logical_db(&logical)
            .map_err(|source| Error::properties(self.classifier.clone(), source))
    }

    /// Typed connection properties of an already existing logical database.
    pub async fn find_connection_properties(&self) -> Result<MongoConnProperties> {
        let logical = self
            .provisioning
            .get_existing(DB_KIND, &self.classifier, &self.params)
            .await
            .map_err(|source| {
                tracing::error!(classifier = %self.classifier, %source, "error finding connection properties");
                Error::provisioning(self.classifier.clone(), source)
            })?;
        MongoConnProperties::from_logical_db(&logical)
            .map_err(|source| Error::properties(self.classifier.clone(), source))
    }
}
