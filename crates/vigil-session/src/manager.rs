//! Token storage and session lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use vigil_core::effects::{CredentialProvider, SecureBlobStore};
use vigil_core::Result;

/// Blob-store record holding the access token.
const ACCESS_TOKEN_RECORD: &str = "vigil.access-token";

/// Blob-store record holding the refresh token.
const REFRESH_TOKEN_RECORD: &str = "vigil.refresh-token";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Owns the persisted session tokens and the auth endpoints.
pub struct SessionManager {
    store: Arc<dyn SecureBlobStore>,
    http: reqwest::Client,
    base_url: Url,
}

impl SessionManager {
    /// Create a manager over the given blob store, talking to `base_url`.
    pub fn new(store: Arc<dyn SecureBlobStore>, base_url: Url) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Persist a new access token, and the refresh token when one was issued.
    pub async fn save_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        self.store
            .set(ACCESS_TOKEN_RECORD, access.as_bytes().to_vec())
            .await?;
        if let Some(refresh) = refresh {
            self.store
                .set(REFRESH_TOKEN_RECORD, refresh.as_bytes().to_vec())
                .await?;
        }
        Ok(())
    }

    /// The stored refresh token, if any.
    pub async fn refresh_token(&self) -> Option<String> {
        self.read_record(REFRESH_TOKEN_RECORD).await
    }

    /// Remove both token records.
    pub async fn clear_tokens(&self) -> Result<()> {
        self.store.delete(ACCESS_TOKEN_RECORD).await?;
        self.store.delete(REFRESH_TOKEN_RECORD).await
    }

    /// End the session: best-effort logout call, then unconditionally clear
    /// the stored tokens.
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.read_record(ACCESS_TOKEN_RECORD).await {
            let url = self.endpoint("/api/v1/auth/logout")?;
            match self.http.post(url).bearer_auth(token).send().await {
                Ok(response) => debug!(status = %response.status(), "logout notified"),
                Err(error) => debug!(%error, "logout notification failed; clearing anyway"),
            }
        }
        self.clear_tokens().await
    }

    async fn read_record(&self, record: &str) -> Option<String> {
        match self.store.get(record).await {
            Ok(Some(raw)) => match String::from_utf8(raw) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(record, "token record is not UTF-8; ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(record, %error, "could not read token record");
                None
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| vigil_core::VigilError::internal(format!("bad endpoint {path}: {e}")))
    }
}

#[async_trait]
impl CredentialProvider for SessionManager {
    async fn access_token(&self) -> Option<String> {
        self.read_record(ACCESS_TOKEN_RECORD).await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `None` on any failure; the session simply stays expired until
    /// the user signs in again.
    async fn refresh(&self) -> Option<String> {
        let refresh = self.refresh_token().await?;
        let url = self.endpoint("/api/v1/auth/refresh").ok()?;

        let response = match self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh_token: &refresh,
            })
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "token refresh rejected");
                return None;
            }
            Err(error) => {
                debug!(%error, "token refresh failed");
                return None;
            }
        };

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "token refresh returned an unreadable body");
                return None;
            }
        };
        let access = body.access_token?;

        if let Err(error) = self
            .save_tokens(&access, body.refresh_token.as_deref())
            .await
        {
            warn!(%error, "could not persist refreshed tokens");
            return None;
        }
        Some(access)
    }
}
