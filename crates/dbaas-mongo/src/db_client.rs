//! Connection manager with credential-rotation recovery
//!
//! `MongoDbClient` is the component behind the sole entry point,
//! [`get_database`](MongoDbClient::get_database). It memoizes the expensive
//! get-or-create/connect sequence per classifier, probes cached connections
//! before handing them out, and rebuilds a connection transparently when the
//! control plane has rotated its credentials out of band.
//!
//! Only a credential rejection triggers recovery. Any other probe failure
//! (network partition, timeout) is surfaced as-is: rotating credentials
//! would not fix it and would mask the real cause.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dbaas_core::{CacheKey, Classifier, DbaasCache, ProvisioningClient, RoleParams};
use parking_lot::Mutex;

use crate::DB_KIND;
use crate::driver::{ConnectSpec, Driver, Probe};
use crate::error::{Error, Result};
use crate::holder::CachedConnection;
use crate::mongo::MongoDriver;
use crate::properties::MongoConnProperties;

/// Hands out live connection handles for one classified logical database.
///
/// Cheap to construct; the connection cache is shared, so every client built
/// for the same classifier serves the same memoized connection.
pub struct MongoDbClient<P, D = MongoDriver>
where
    P: ProvisioningClient + ?Sized,
    D: Driver,
{
    driver: Arc<D>,
    provisioning: Arc<P>,
    cache: Arc<DbaasCache<CachedConnection<D::Connection>, Error>>,
    rotation_locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    classifier: Classifier,
    params: RoleParams,
    options: D::Options,
}

impl<P, D> fmt::Debug for MongoDbClient<P, D>
where
    P: ProvisioningClient + ?Sized,
    D: Driver,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbClient")
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl<P, D> MongoDbClient<P, D>
where
    P: ProvisioningClient + ?Sized + 'static,
    D: Driver,
{
    pub fn new(
        driver: Arc<D>,
        provisioning: Arc<P>,
        cache: Arc<DbaasCache<CachedConnection<D::Connection>, Error>>,
        classifier: Classifier,
        params: RoleParams,
        options: D::Options,
    ) -> Self {
        Self {
            driver,
            provisioning,
            cache,
            rotation_locks: Mutex::new(HashMap::new()),
            classifier,
            params,
            options,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Live handle for the classified logical database.
    ///
    /// The first call provisions the database and connects; concurrent first
    /// callers share that single computation. Subsequent calls probe the
    /// cached connection and only go back to the control plane when the
    /// server rejects the cached credentials.
    pub async fn get_database(&self) -> Result<D::Connection> {
        let key = CacheKey::new(DB_KIND, self.classifier.clone());
        let entry = self
            .cache
            .get_or_compute(&key, || {
                Self::establish(
                    Arc::clone(&self.driver),
                    Arc::clone(&self.provisioning),
                    self.classifier.clone(),
                    self.params.clone(),
                    self.options.clone(),
                )
            })
            .await
            .map_err(Error::Shared)?;

        match entry.probe(self.driver.as_ref()).await {
            Probe::Healthy => Ok(entry.into_handle()),
            Probe::Unavailable(source) => {
                tracing::error!(classifier = %self.classifier, %source, "connection probe failed");
                Err(Error::probe(self.classifier.clone(), source))
            }
            Probe::AuthInvalid => {
                tracing::info!(
                    classifier = %self.classifier,
                    "cached credentials rejected by server, fetching rotated credentials"
                );
                self.rotate(&key, &entry).await
            }
        }
    }

    /// The memoized first-provision path: get-or-create, then connect.
    async fn establish(
        driver: Arc<D>,
        provisioning: Arc<P>,
        classifier: Classifier,
        params: RoleParams,
        options: D::Options,
    ) -> Result<CachedConnection<D::Connection>> {
        tracing::debug!(classifier = %classifier, "provisioning mongodb logical database");
        let logical = provisioning
            .get_or_create(DB_KIND, &classifier, &params)
            .await
            .map_err(|source| Error::provisioning(classifier.clone(), source))?;
        let properties = MongoConnProperties::from_logical_db(&logical)
            .map_err(|source| Error::properties(classifier.clone(), source))?;
        let spec = ConnectSpec::from_properties(&properties);
        let handle = driver
            .connect(&spec, &options)
            .await
            .map_err(|source| {
                tracing::error!(classifier = %classifier, %source, "unable to connect to provisioned database");
                Error::connect(classifier.clone(), source)
            })?;
        tracing::debug!(classifier = %classifier, database = %spec.database, "mongodb connection established");
        Ok(CachedConnection::new(handle, spec.credentials))
    }

    /// Fetch rotated credentials and rebuild the connection.
    ///
    /// Serialized per key: when several callers observe the rejection at
    /// once, one performs the fetch-close-reconnect-replace sequence and the
    /// rest reuse its result. A waiter never receives the handle the winner
    /// closed.
    async fn rotate(
        &self,
        key: &CacheKey,
        stale: &CachedConnection<D::Connection>,
    ) -> Result<D::Connection> {
        let lock = self.rotation_lock(key);
        let _serialized = lock.lock().await;

        // A concurrent rotation may have already installed a fresh entry
        // while we waited on the lock.
        if let Some(current) = self.cache.get(key) {
            if current.credentials() != stale.credentials() {
                return Ok(current.into_handle());
            }
        }

        let logical = self
            .provisioning
            .get_existing(DB_KIND, &self.classifier, &self.params)
            .await
            .map_err(|source| {
                tracing::error!(classifier = %self.classifier, %source, "unable to fetch rotated connection properties");
                Error::provisioning(self.classifier.clone(), source)
            })?;
        let properties = MongoConnProperties::from_logical_db(&logical)
            .map_err(|source| Error::properties(self.classifier.clone(), source))?;

        if let Err(error) = self.driver.close(stale.handle()).await {
            tracing::warn!(classifier = %self.classifier, %error, "failed to close superseded connection");
        }

        let spec = ConnectSpec::from_properties(&properties);
        let handle = match self.driver.connect(&spec, &self.options).await {
            Ok(handle) => handle,
            Err(source) => {
                // The superseded handle is already closed; evict the entry so
                // the next call provisions from scratch instead of serving a
                // dead connection.
                self.cache.remove(key);
                tracing::error!(classifier = %self.classifier, %source, "reconnect with rotated credentials failed");
                return Err(Error::connect(self.classifier.clone(), source));
            }
        };

        self.cache.replace(
            key.clone(),
            CachedConnection::new(handle.clone(), spec.credentials),
        );
        tracing::info!(classifier = %self.classifier, "connection rebuilt with rotated credentials");
        Ok(handle)
    }

    fn rotation_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.rotation_locks.lock();
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}
