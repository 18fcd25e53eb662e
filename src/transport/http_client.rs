use crate::config::Config;
use crate::error::ApiError;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Raw REST transport for the Gram backend. Carries no session state of its
/// own; the bearer token is passed in per call so the latest one is always
/// used.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.rest_api.base_url, config.rest_api.timeout)
    }

    #[instrument(skip(self, bearer))]
    pub async fn get<T: DeserializeOwned + Debug>(
        &self,
        endpoint: &str,
        bearer: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Sending GET request to {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        Self::handle_response(response).await
    }

    #[instrument(skip(self, body, bearer))]
    pub async fn post<T: DeserializeOwned + Debug, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Sending POST request to {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        Self::handle_response(response).await
    }

    #[instrument(skip(self, body, bearer))]
    pub async fn patch<T: DeserializeOwned + Debug, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Sending PATCH request to {}", url);

        let mut request = self.client.patch(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        Self::handle_response(response).await
    }

    /// PATCH with a multipart body, for endpoints that take file uploads.
    #[instrument(skip(self, form, bearer))]
    pub async fn patch_multipart<T: DeserializeOwned + Debug>(
        &self,
        endpoint: &str,
        form: multipart::Form,
        bearer: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Sending multipart PATCH request to {}", url);

        let mut request = self.client.patch(&url).multipart(form);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned + Debug>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body_text = response.text().await?;

        debug!("Response Status: {}", status);
        debug!("Response Body: {}", body_text);

        if status.is_success() {
            let body: T = serde_json::from_str(&body_text)?;
            Ok(body)
        } else if status == StatusCode::UNAUTHORIZED {
            warn!("Request rejected as unauthorized: {}", body_text);
            Err(ApiError::Unauthorized)
        } else if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound)
        } else {
            error!(
                "API request failed. Status: {}, Body: {}",
                status, body_text
            );
            Err(ApiError::Unexpected {
                status,
                body: body_text,
            })
        }
    }
}

impl fmt::Display for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"base_url\":\"{}\"}}", self.base_url)
    }
}
