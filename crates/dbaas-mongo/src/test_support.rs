//! In-memory fakes for the driver and provisioning capabilities.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dbaas_core::{Classifier, LogicalDb, LogicalDbError, ProvisioningClient, RoleParams};
use parking_lot::Mutex;
use serde_json::json;

use crate::driver::{ConnectSpec, Driver, DriverError};

/// Connection handed out by [`FakeDriver`]. Clones share the closed flag.
#[derive(Debug, Clone)]
pub struct FakeConn {
    pub id: usize,
    pub database: String,
    pub password: String,
    closed: Arc<AtomicBool>,
}

impl FakeConn {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Driver fake: accepts one password, counts calls, and can simulate a
/// network partition or a connect refusal.
#[derive(Debug, Default)]
pub struct FakeDriver {
    pub connects: AtomicUsize,
    pub pings: AtomicUsize,
    accepted_password: Mutex<String>,
    pub fail_connect: AtomicBool,
    pub network_down: AtomicBool,
}

impl FakeDriver {
    pub fn accepting(password: &str) -> Arc<Self> {
        let driver = Self::default();
        *driver.accepted_password.lock() = password.to_string();
        Arc::new(driver)
    }

    /// Change the password the fake server accepts, as a control-plane
    /// rotation would.
    pub fn accept(&self, password: &str) {
        *self.accepted_password.lock() = password.to_string();
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Connection = FakeConn;
    type Options = ();

    async fn connect(&self, spec: &ConnectSpec, _options: &()) -> Result<FakeConn, DriverError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DriverError::unavailable("connect refused"));
        }
        let id = self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConn {
            id,
            database: spec.database.clone(),
            password: spec.credentials.password.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn ping(&self, connection: &FakeConn) -> Result<(), DriverError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.network_down.load(Ordering::SeqCst) {
            return Err(DriverError::unavailable("no route to host"));
        }
        if *self.accepted_password.lock() != connection.password {
            return Err(DriverError::unauthorized("SCRAM authentication failed"));
        }
        if connection.is_closed() {
            return Err(DriverError::unavailable("session closed"));
        }
        Ok(())
    }

    async fn close(&self, connection: &FakeConn) -> Result<(), DriverError> {
        connection.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Control-plane fake issuing properties for a single logical database.
#[derive(Debug)]
pub struct FakeControlPlane {
    pub get_or_create_calls: AtomicUsize,
    pub get_existing_calls: AtomicUsize,
    password: Mutex<String>,
    url: Mutex<String>,
    auth_db: Mutex<String>,
    pub fail_get_or_create: AtomicBool,
    pub fail_get_existing: AtomicBool,
}

impl FakeControlPlane {
    pub fn new(password: &str) -> Arc<Self> {
        Arc::new(Self {
            get_or_create_calls: AtomicUsize::new(0),
            get_existing_calls: AtomicUsize::new(0),
            password: Mutex::new(password.to_string()),
            url: Mutex::new("mongodb://mongos.dbaas:27017".to_string()),
            auth_db: Mutex::new("orders_auth".to_string()),
            fail_get_or_create: AtomicBool::new(false),
            fail_get_existing: AtomicBool::new(false),
        })
    }

    pub fn rotate_password(&self, password: &str) {
        *self.password.lock() = password.to_string();
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock() = url.to_string();
    }

    pub fn set_auth_db(&self, auth_db: &str) {
        *self.auth_db.lock() = auth_db.to_string();
    }

    fn logical_db(&self) -> LogicalDb {
        LogicalDb {
            id: Some("db-1".to_string()),
            connection_properties: json!({
                "url": self.url.lock().clone(),
                "username": "svc",
                "password": self.password.lock().clone(),
                "authDbName": self.auth_db.lock().clone(),
            }),
        }
    }
}

#[async_trait]
impl ProvisioningClient for FakeControlPlane {
    async fn get_or_create(
        &self,
        _db_kind: &str,
        _classifier: &Classifier,
        _params: &RoleParams,
    ) -> Result<LogicalDb, LogicalDbError> {
        self.get_or_create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_or_create.load(Ordering::SeqCst) {
            return Err(LogicalDbError::new(503, "provisioning unavailable"));
        }
        Ok(self.logical_db())
    }

    async fn get_existing(
        &self,
        _db_kind: &str,
        _classifier: &Classifier,
        _params: &RoleParams,
    ) -> Result<LogicalDb, LogicalDbError> {
        self.get_existing_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_existing.load(Ordering::SeqCst) {
            return Err(LogicalDbError::new(404, "logical database not found"));
        }
        Ok(self.logical_db())
    }
}
