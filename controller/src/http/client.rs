//! HTTP client implementation

use std::time::Duration;

use http::StatusCode;
use openapi_client::models::ErrorResponse;
use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::errors::ControllerError;

/// HTTP client for the admin console API
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, token: SecretString, timeout: Duration) -> Result<Self, ControllerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(header::AUTHORIZATION, self.token.expose_secret())
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ControllerError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;
        Self::read_json("GET", response).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ControllerError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        Self::read_json("POST", response).await
    }

    async fn read_json<T: DeserializeOwned>(
        method: &str,
        response: Response,
    ) -> Result<T, ControllerError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("HTTP {} rejected: session is no longer valid", method);
            return Err(ControllerError::Unauthorized(format!(
                "{} {}",
                method,
                response.url().path()
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message().to_string())
                .unwrap_or(body);
            return Err(ControllerError::Request { status, message });
        }

        // Action endpoints may answer with an empty body
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
