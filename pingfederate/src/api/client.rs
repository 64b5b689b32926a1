use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::auth::{Auth, Authenticator};
use super::error::{ApiError, PingFederateErrorResponse};
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionSettings};

/// PingFederate admin API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth: Authenticator,
    retry_config: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

/// Everything needed to reach one PingFederate admin API
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// `https_host` followed by `admin_api_path`
    pub base_url: String,
    pub auth: Auth,
    pub connection: ConnectionSettings,
    pub retry_config: RetryConfig,
}

impl Client {
    pub fn from_settings(settings: ClientSettings) -> Result<Self, ApiError> {
        Self::with_config(
            &settings.base_url,
            settings.auth,
            settings.connection,
            settings.retry_config,
        )
    }

    /// Create a client for `https_host` + `admin_api_path` with default settings
    pub fn new(base_url: &str, auth: Auth) -> Result<Self, ApiError> {
        Self::with_config(
            base_url,
            auth,
            ConnectionSettings::default(),
            RetryConfig::default(),
        )
    }

    pub fn with_config(
        base_url: &str,
        auth: Auth,
        settings: ConnectionSettings,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        url::Url::parse(base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("invalid URL '{}': {}", base_url, e)))?;

        let pool_config = ConnectionPoolConfig {
            request_timeout: std::time::Duration::from_secs(retry_config.timeout_seconds),
            ..Default::default()
        };
        let http_client = ConnectionPoolManager::new(pool_config).build_client(&settings)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: base_url.trim_end_matches('/').to_string(),
                auth: Authenticator::new(auth),
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("GET request to: {}", url);
        let body = self
            .execute_with_retry(|| self.inner.http_client.get(&url), path)
            .await?;
        parse_body(&body)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("POST request to: {}", url);
        let body = self
            .execute_with_retry(|| self.inner.http_client.post(&url).json(body), path)
            .await?;
        parse_body(&body)
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("PUT request to: {}", url);
        let body = self
            .execute_with_retry(|| self.inner.http_client.put(&url).json(body), path)
            .await?;
        parse_body(&body)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        tracing::debug!("DELETE request to: {}", url);
        self.execute_with_retry(|| self.inner.http_client.delete(&url), path)
            .await
            .map(|_| ())
    }

    /// Password credential validator operations
    pub fn password_credential_validators(
        &self,
    ) -> super::password_credential_validators::PasswordCredentialValidatorsApi<'_> {
        super::password_credential_validators::PasswordCredentialValidatorsApi::new(self)
    }

    pub fn idp_adapters(&self) -> super::idp_adapters::IdpAdaptersApi<'_> {
        super::idp_adapters::IdpAdaptersApi::new(self)
    }

    /// Generic plugin instance operations for the given endpoint
    pub fn plugin_instances(
        &self,
        kind: super::plugin_instances::PluginInstanceKind,
    ) -> super::plugin_instances::PluginInstancesApi<'_> {
        super::plugin_instances::PluginInstancesApi::new(self, kind)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// Sends the request, retrying rate limiting, unavailability and
    /// connection failures with exponential backoff. A timeout is returned
    /// at once: the server may already have applied a create or update.
    /// Returns the body text.
    async fn execute_with_retry<F>(&self, request_fn: F, path: &str) -> Result<String, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            let request = self
                .inner
                .auth
                .apply(&self.inner.http_client, request_fn())
                .await?;

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.text().await.map_err(|e| self.request_error(e));
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        self.inner.auth.invalidate().await;
                        let body = response.text().await.unwrap_or_default();
                        return Err(ApiError::AuthError(body));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(handle_error_response(response).await);
                    }
                }
                Err(e) if e.is_connect() => {
                    tracing::warn!("Connection to {} failed: {}", path, e);
                    last_error = Some(ApiError::RequestError(e));
                }
                Err(e) => {
                    if e.is_timeout() {
                        tracing::warn!("Request to {} timed out", path);
                    }
                    return Err(self.request_error(e));
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    fn request_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.inner.retry_config.timeout_seconds)
        } else {
            ApiError::RequestError(e)
        }
    }
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str::<T>(text).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}", e);
        ApiError::ParseError(format!("Failed to parse response: {}", e))
    })
}

async fn handle_error_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::debug!("Error HTTP response body: {}", body);

    if status == 404 {
        return ApiError::NotFound { body };
    }

    let details = serde_json::from_str::<PingFederateErrorResponse>(&body)
        .ok()
        .map(Box::new);

    ApiError::ApiError {
        status,
        body,
        details,
    }
}
