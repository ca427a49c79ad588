//! Authenticated REST client for the remote authority.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use vigil_core::effects::{AlertsGateway, CredentialProvider, DecisionSink};
use vigil_core::{Alert, Decision, Result, VigilError};

/// REST client bound to one base URL.
///
/// Every request carries the current bearer token when one exists. A 401
/// response triggers exactly one refresh-and-replay; a second 401 is
/// returned to the caller as [`VigilError::NonSuccessStatus`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    /// Create a client talking to `base_url` with tokens from `credentials`.
    pub fn new(base_url: Url, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            credentials,
        }
    }

    /// The REST base address (also the source of the stream address).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `path` and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute(Method::GET, path, None).await?;
        expect_success(&response)?;
        response
            .json()
            .await
            .map_err(|e| VigilError::serialization(e.to_string()))
    }

    /// POST a JSON body to `path`, requiring a 2xx response.
    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let response = self.execute(Method::POST, path, Some(&body)).await?;
        expect_success(&response)?;
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| VigilError::internal(format!("bad endpoint {path}: {e}")))?;

        let token = self.credentials.access_token().await;
        let response = self
            .send_once(method.clone(), url.clone(), body, token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // One refresh-and-replay; an expired refresh token falls through
        // with the original 401.
        match self.credentials.refresh().await {
            Some(fresh) => {
                debug!(%url, "replaying request with refreshed token");
                self.send_once(method, url, body, Some(fresh)).await
            }
            None => Ok(response),
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        token: Option<String>,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| VigilError::network(e.to_string()))
    }
}

fn expect_success(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(VigilError::non_success(status.as_u16()))
    }
}

#[async_trait]
impl DecisionSink for ApiClient {
    async fn submit_decisions(&self, decisions: &[Decision]) -> Result<()> {
        self.post_json("/api/v1/decisions", json!({ "decisions": decisions }))
            .await
    }
}

#[async_trait]
impl AlertsGateway for ApiClient {
    async fn fetch_face_alerts(&self) -> Result<Vec<Alert>> {
        self.get_json("/api/v1/alerts/face-detection").await
    }
}
