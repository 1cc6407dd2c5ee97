//! In-memory access credential storage
//!
//! Holds the short-lived access token for the lifetime of one session
//! context. Nothing here is ever written to disk; the long-lived refresh
//! credential stays in the httpOnly cookie and is never visible to this
//! process's application code.

use common::Secret;
use tokio::sync::RwLock;
use tracing::debug;

/// Short-lived bearer token used to authorize individual API calls.
///
/// Opaque to the client: claims are never decoded here.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    /// Raw token value for the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken({:?})", self.0)
    }
}

/// Holder of the current access credential.
///
/// Either empty (unauthenticated) or exactly one current token. Only the
/// refresh coordinator and logout write to it; the request wrapper reads.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Option<AccessToken>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current token unconditionally.
    pub async fn set(&self, token: AccessToken) {
        *self.current.write().await = Some(token);
        debug!("access token replaced");
    }

    pub async fn get(&self) -> Option<AccessToken> {
        self.current.read().await.clone()
    }

    /// Drop the current token. Safe to call on an empty store.
    pub async fn clear(&self) {
        if self.current.write().await.take().is_some() {
            debug!("access token cleared");
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }
}
