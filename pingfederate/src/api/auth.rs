//! Authentication for admin API requests

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::error::ApiError;

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    AccessToken(String),
    OAuth(OAuthConfig),
}

// Credentials stay out of debug output
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { username, .. } => write!(f, "Basic({})", username),
            Auth::AccessToken(_) => write!(f, "AccessToken"),
            Auth::OAuth(config) => write!(f, "OAuth({}, {})", config.client_id, config.token_url),
        }
    }
}

#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Applies credentials to outgoing requests, fetching and caching OAuth
/// client-credentials tokens as needed.
pub struct Authenticator {
    auth: Auth,
    token: RwLock<Option<CachedToken>>,
}

impl Authenticator {
    pub fn new(auth: Auth) -> Self {
        Self {
            auth,
            token: RwLock::new(None),
        }
    }

    pub async fn apply(
        &self,
        http: &reqwest::Client,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        match &self.auth {
            Auth::Basic { username, password } => Ok(request.basic_auth(username, Some(password))),
            Auth::AccessToken(token) => Ok(request.bearer_auth(token)),
            Auth::OAuth(config) => {
                let token = self.oauth_token(http, config).await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Drops a cached OAuth token so the next request fetches a new one
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    async fn oauth_token(
        &self,
        http: &reqwest::Client,
        config: &OAuthConfig,
    ) -> Result<String, ApiError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.token.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Requesting OAuth token from {}", config.token_url);

        let mut form = vec![("grant_type", "client_credentials".to_string())];
        if !config.scopes.is_empty() {
            form.push(("scope", config.scopes.join(" ")));
        }

        let response = http
            .post(&config.token_url)
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("OAuth token request failed with HTTP {}", status);
            return Err(ApiError::AuthError(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ParseError(format!("invalid token response: {}", e)))?;

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let access_token = token.access_token;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(access_token)
    }
}
