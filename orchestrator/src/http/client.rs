//! HTTP client implementation

use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use crate::errors::HubError;

/// HTTP client for hub communication
pub struct HttpClient {
    client: Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, HubError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            token: None,
        })
    }

    /// Create a new HTTP client authenticating with a bearer token
    pub fn with_token(base_url: &str, token: SecretString) -> Result<Self, HubError> {
        let mut client = Self::new(base_url)?;
        client.token = Some(token);
        Ok(client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a POST request carrying a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HubError> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        let request_id = Uuid::new_v4();
        debug!(%request_id, "POST {}", url);

        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%request_id, "HTTP POST failed: {} - {}", status, body);
            return Err(HubError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HubError> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        let request_id = Uuid::new_v4();
        debug!(%request_id, "GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%request_id, "HTTP GET failed: {} - {}", status, body);
            return Err(HubError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
