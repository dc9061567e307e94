//! [`Driver`] adapter over the official `mongodb` crate

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{AuthMechanism, ClientOptions, Credential, Tls, TlsOptions};
use mongodb::{Client, Database};

use crate::driver::{ConnectSpec, Driver, DriverError};

/// Handle produced by [`MongoDriver`]: the client plus the database selected
/// for the logical database's name. Cloning shares the underlying client.
#[derive(Debug, Clone)]
pub struct MongoHandle {
    client: Client,
    database: Database,
}

impl MongoHandle {
    /// Database scoped to the logical database's name.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

impl MongoDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for MongoDriver {
    type Connection = MongoHandle;
    type Options = ClientOptions;

    async fn connect(
        &self,
        spec: &ConnectSpec,
        options: &ClientOptions,
    ) -> Result<MongoHandle, DriverError> {
        let options = build_client_options(spec, options).await?;
        let client = Client::with_options(options).map_err(classify)?;
        let database = client.database(&spec.database);
        Ok(MongoHandle { client, database })
    }

    async fn ping(&self, connection: &MongoHandle) -> Result<(), DriverError> {
        connection
            .database
            .run_command(doc! { "ping": 1 })
            .await
            .map(drop)
            .map_err(classify)
    }

    async fn close(&self, connection: &MongoHandle) -> Result<(), DriverError> {
        connection.client.clone().shutdown().await;
        Ok(())
    }
}

/// Overlay the provisioned endpoint and credentials onto the caller's
/// options. The caller's tuning (pool sizes, timeouts) is kept untouched so
/// a rotation rebuilds the session with the same options and only the
/// authentication fields changed.
async fn build_client_options(
    spec: &ConnectSpec,
    base: &ClientOptions,
) -> Result<ClientOptions, DriverError> {
    let parsed = ClientOptions::parse(&spec.url)
        .await
        .map_err(|error| DriverError::invalid_url(error.to_string()))?;

    // A database embedded in the URL path wins as the authentication source.
    let auth_source = parsed
        .default_database
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| spec.credentials.auth_db.clone());

    let mut options = base.clone();
    options.hosts = parsed.hosts;
    options.default_database = Some(spec.database.clone());
    options.credential = Some(
        Credential::builder()
            .username(spec.credentials.username.clone())
            .password(spec.credentials.password.clone())
            .source(auth_source)
            .mechanism(AuthMechanism::ScramSha1)
            .build(),
    );
    if spec.tls {
        options.tls = Some(Tls::Enabled(TlsOptions::default()));
    } else if parsed.tls.is_some() {
        options.tls = parsed.tls;
    }
    Ok(options)
}

fn classify(error: mongodb::error::Error) -> DriverError {
    if is_auth_error(&error) {
        DriverError::unauthorized(error.to_string())
    } else {
        DriverError::unavailable(error.to_string())
    }
}

/// SCRAM failures surface as `Authentication`; command-level rejections keep
/// their server codes (13 Unauthorized, 18 AuthenticationFailed).
fn is_auth_error(error: &mongodb::error::Error) -> bool {
    match &*error.kind {
        mongodb::error::ErrorKind::Authentication { .. } => true,
        mongodb::error::ErrorKind::Command(command) => matches!(command.code, 13 | 18),
        _ => false,
    }
}
