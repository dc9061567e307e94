//! Client facade
//!
//! One [`MongoDbaasClient`] per process, or per distinct control-plane
//! configuration. Every [`MongoDatabase`] it hands out shares one connection
//! cache, so service- and tenant-scoped databases with the same classifier
//! resolve to the same memoized connection.

use std::fmt;
use std::sync::Arc;

use dbaas_core::{Classifier, DbaasCache, ProvisioningClient, ServiceIdentity};

use crate::database::{DbParams, MongoDatabase};
use crate::driver::Driver;
use crate::error::Error;
use crate::holder::CachedConnection;
use crate::mongo::MongoDriver;

/// Default classifier of the service-scoped logical database.
#[must_use]
pub fn service_classifier(identity: &ServiceIdentity) -> Classifier {
    identity.service_classifier().with("dbClassifier", "default")
}

/// Default classifier of a tenant-scoped logical database.
#[must_use]
pub fn tenant_classifier(identity: &ServiceIdentity, tenant_id: &str) -> Classifier {
    identity
        .tenant_classifier(tenant_id)
        .with("dbClassifier", "default")
}

/// Entry point of the crate: binds a provisioning client, a driver and the
/// ambient service identity, and owns the process-wide connection cache.
pub struct MongoDbaasClient<P, D = MongoDriver>
where
    P: ProvisioningClient + ?Sized,
    D: Driver,
{
    provisioning: Arc<P>,
    driver: Arc<D>,
    cache: Arc<DbaasCache<CachedConnection<D::Connection>, Error>>,
    identity: ServiceIdentity,
}

impl<P, D> fmt::Debug for MongoDbaasClient<P, D>
where
    P: ProvisioningClient + ?Sized,
    D: Driver,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbaasClient")
            .field("identity", &self.identity)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<P> MongoDbaasClient<P, MongoDriver>
where
    P: ProvisioningClient + ?Sized + 'static,
{
    /// Client over the official `mongodb` driver.
    #[must_use]
    pub fn new(provisioning: Arc<P>, identity: ServiceIdentity) -> Self {
        Self::with_driver(provisioning, Arc::new(MongoDriver::new()), identity)
    }
}

impl<P, D> MongoDbaasClient<P, D>
where
    P: ProvisioningClient + ?Sized + 'static,
    D: Driver,
{
    /// Client over a custom [`Driver`] implementation.
    #[must_use]
    pub fn with_driver(provisioning: Arc<P>, driver: Arc<D>, identity: ServiceIdentity) -> Self {
        Self {
            provisioning,
            driver,
            cache: Arc::new(DbaasCache::new()),
            identity,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Logical database scoped to the service identity.
    #[must_use]
    pub fn service_database(&self, params: DbParams) -> MongoDatabase<P, D> {
        let classifier = self.resolve(&params, service_classifier(&self.identity));
        self.database(classifier, params)
    }

    /// Logical database scoped to one tenant of the service.
    #[must_use]
    pub fn tenant_database(&self, tenant_id: &str, params: DbParams) -> MongoDatabase<P, D> {
        let classifier = self.resolve(&params, tenant_classifier(&self.identity, tenant_id));
        self.database(classifier, params)
    }

    fn resolve(&self, params: &DbParams, default: Classifier) -> Classifier {
        match &params.classifier {
            Some(custom) => custom(&self.identity),
            None => default,
        }
    }

    fn database(&self, classifier: Classifier, params: DbParams) -> MongoDatabase<P, D> {
        MongoDatabase::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.provisioning),
            Arc::clone(&self.cache),
            classifier,
            params.base,
        )
    }
}
