//! Session credential lifecycle. The backend mints short-lived client
//! tokens; this module fetches them, reads their expiry without
//! verifying anything, and wraps authorized calls so a stale token gets
//! exactly one refresh-and-retry before the error propagates.

use std::future::Future;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::ChatBackend;
use crate::error::is_unauthorized_error;

/// Tokens carry their expiry after an `et_` prefix as unpadded
/// URL-safe base64 over a JSON claims object.
const TOKEN_PREFIX: &str = "et_";

/// How close to expiry a credential may get before a proactive
/// refresh replaces it.
const REFRESH_MARGIN_SECONDS: i64 = 60;

#[derive(Clone, Debug)]
pub struct Credential {
    pub token: String,
    pub public_key: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

pub struct SessionCredentialManager {
    backend: Arc<dyn ChatBackend>,
    current: Option<Credential>,
}

impl SessionCredentialManager {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        SessionCredentialManager {
            backend,
            current: None,
        }
    }

    /// The last credential fetched, if any. Callers that need a token
    /// they can rely on should go through [`Self::fetch`] or
    /// [`Self::ensure_fresh`] instead.
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// Fetches a credential from the backend. Always round-trips, even
    /// when the stored credential still looks valid, so a revoked
    /// session never lingers locally.
    pub async fn fetch(&mut self) -> anyhow::Result<Credential> {
        let grant = self.backend.fetch_credential().await?;
        let credential = Credential {
            expires_at: Self::expiry_of(&grant.client_token),
            token: grant.client_token,
            public_key: grant.public_key,
        };
        debug!(expires_at = ?credential.expires_at, "Fetched session credential");
        self.current = Some(credential.clone());
        Ok(credential)
    }

    /// Reads the expiry baked into a token. Returns `None` for tokens
    /// in any other shape rather than failing; expiry is advisory and
    /// the backend remains the authority on validity.
    pub fn expiry_of(token: &str) -> Option<DateTime<Utc>> {
        let encoded = token.strip_prefix(TOKEN_PREFIX)?;
        let decoded = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let claims: ExpiryClaims = serde_json::from_slice(&decoded).ok()?;
        DateTime::from_timestamp(claims.exp, 0)
    }

    /// Refetches only when the stored credential is missing, has an
    /// unreadable expiry, or expires within the refresh margin.
    pub async fn ensure_fresh(&mut self) -> anyhow::Result<Credential> {
        if let Some(credential) = &self.current {
            if let Some(expires_at) = credential.expires_at {
                if expires_at > Utc::now() + Duration::seconds(REFRESH_MARGIN_SECONDS) {
                    return Ok(credential.clone());
                }
            }
        }
        self.fetch().await
    }

    /// Runs `operation` with a freshly fetched token. If it fails with
    /// an unauthorized error, fetches once more and reruns it; any
    /// second failure, and every non-auth failure, propagates as is.
    pub async fn with_auth_retry<T, F, Fut>(&mut self, mut operation: F) -> anyhow::Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut retries_left = 1_u32;
        loop {
            let credential = self.fetch().await?;
            match operation(credential.token).await {
                Ok(value) => return Ok(value),
                Err(err) if retries_left > 0 && is_unauthorized_error(&err) => {
                    retries_left -= 1;
                    warn!(error = %err, "Unauthorized response, retrying with a fresh credential");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
