//! Connection pool management for the PingFederate admin API

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use super::error::ApiError;

pub const XSRF_HEADER: &str = "X-Xsrf-Header";
pub const BYPASS_EXTERNAL_VALIDATION_HEADER: &str = "X-BypassExternalValidation";

pub struct ConnectionPoolConfig {
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(90),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            tcp_keepalive: Some(Duration::from_secs(30)),
        }
    }
}

/// TLS and header settings applied to every connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub insecure_trust_all_tls: bool,
    /// PEM encoded certificates trusted in addition to the system roots
    pub ca_certificates_pem: Vec<Vec<u8>>,
    pub bypass_external_validation: bool,
    pub user_agent: String,
}

/// Builds the pooled HTTP client shared by every API call
pub struct ConnectionPoolManager {
    config: ConnectionPoolConfig,
}

impl ConnectionPoolManager {
    pub fn new(config: ConnectionPoolConfig) -> Self {
        Self { config }
    }

    pub fn build_client(&self, settings: &ConnectionSettings) -> Result<reqwest::Client, ApiError> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.insecure_trust_all_tls)
            .default_headers(default_headers(settings.bypass_external_validation))
            .user_agent(settings.user_agent.as_str())
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.connection_timeout)
            .pool_idle_timeout(self.config.idle_timeout)
            .pool_max_idle_per_host(self.config.max_idle_connections);

        if let Some(keepalive) = self.config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        for pem in &settings.ca_certificates_pem {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                ApiError::InvalidConfig(format!("invalid CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
    }
}

fn default_headers(bypass_external_validation: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-xsrf-header"),
        HeaderValue::from_static("PingFederate"),
    );
    headers.insert(
        HeaderName::from_static("x-bypassexternalvalidation"),
        HeaderValue::from_static(if bypass_external_validation {
            "true"
        } else {
            "false"
        }),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_headers_carry_xsrf_and_bypass_flag() {
        let headers = default_headers(true);
        assert_eq!(headers.get(XSRF_HEADER).unwrap(), "PingFederate");
        assert_eq!(
            headers.get(BYPASS_EXTERNAL_VALIDATION_HEADER).unwrap(),
            "true"
        );

        let headers = default_headers(false);
        assert_eq!(
            headers.get(BYPASS_EXTERNAL_VALIDATION_HEADER).unwrap(),
            "false"
        );
    }

    #[test]
    fn invalid_ca_certificate_is_a_config_error() {
        let pool = ConnectionPoolManager::new(ConnectionPoolConfig::default());
        let settings = ConnectionSettings {
            ca_certificates_pem: vec![b"not a certificate".to_vec()],
            ..Default::default()
        };
        assert!(matches!(
            pool.build_client(&settings),
            Err(ApiError::InvalidConfig(_))
        ));
    }
}
