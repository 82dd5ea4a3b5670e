//! Round-robin credential pool.
//!
//! The pool is fixed at construction. The cursor is an atomic counter so a
//! shared `&CredentialRotator` is enough to rotate; it is process-local and
//! starts at the first credential on every restart.

use optic_core::Credential;
use optic_core::error::CredentialError;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

pub struct CredentialRotator {
    pool: Vec<Credential>,
    cursor: AtomicUsize,
}

impl CredentialRotator {
    /// Build a rotator over `pool`, in order. An empty pool is rejected.
    pub fn new(pool: Vec<Credential>) -> Result<Self, CredentialError> {
        if pool.is_empty() {
            return Err(CredentialError::EmptyPool);
        }
        Ok(Self {
            pool,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Always false for a constructed rotator.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// The next credential, wrapping forever.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Credential {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        self.pool[idx].clone()
    }

    /// Rotate until `probe` accepts a credential, at most once around the pool.
    pub async fn next_valid<F, Fut, E>(&self, mut probe: F) -> Result<Credential, CredentialError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.first_success(|cred| probe(cred))
            .await
            .map(|(cred, ())| cred)
    }

    /// Rotate through the pool running `attempt` until one succeeds, at most
    /// once around the pool. Returns the accepted credential and the value.
    pub async fn first_success<T, F, Fut, E>(
        &self,
        mut attempt: F,
    ) -> Result<(Credential, T), CredentialError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.pool.len();
        for _ in 0..attempts {
            let credential = self.next();
            match attempt(credential.clone()).await {
                Ok(value) => {
                    debug!(credential = %credential, "Credential accepted");
                    return Ok((credential, value));
                }
                Err(e) => {
                    warn!(credential = %credential, error = %e, "Credential rejected, rotating");
                }
            }
        }
        Err(CredentialError::NoValidCredential { attempts })
    }
}

impl std::fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("pool_size", &self.pool.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}
