//! Credential-aware connection holder

use crate::driver::{Credentials, Driver, Probe};

/// A live connection handle plus the credential fields used to establish it.
///
/// Invariant: the stored credentials always match the credentials actually
/// bound to the handle. That is what makes [`probe`](Self::probe) meaningful:
/// an authentication failure on the handle means exactly these credentials
/// were rejected. Only the manager's rotation path replaces an entry, and it
/// always installs handle and credentials together.
#[derive(Debug, Clone)]
pub struct CachedConnection<C> {
    handle: C,
    credentials: Credentials,
}

impl<C: Clone> CachedConnection<C> {
    #[must_use]
    pub fn new(handle: C, credentials: Credentials) -> Self {
        Self {
            handle,
            credentials,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &C {
        &self.handle
    }

    #[must_use]
    pub fn into_handle(self) -> C {
        self.handle
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Probe liveness of the held connection, distinguishing a credential
    /// rejection from every other failure mode.
    pub async fn probe<D>(&self, driver: &D) -> Probe
    where
        D: Driver<Connection = C>,
    {
        match driver.ping(&self.handle).await {
            Ok(()) => Probe::Healthy,
            Err(error) if error.is_unauthorized() => Probe::AuthInvalid,
            Err(error) => Probe::Unavailable(error),
        }
    }
}
