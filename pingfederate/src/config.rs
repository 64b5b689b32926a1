//! Provider configuration
//!
//! Each attribute falls back to a `PINGFEDERATE_PROVIDER_*` environment
//! variable when left null in the provider block.

use std::fmt;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::{Auth, ClientSettings, ConnectionSettings, OAuthConfig, RetryConfig};
use crate::diagnostics::INVALID_PROVIDER_CONFIGURATION;

pub const ENV_HTTPS_HOST: &str = "PINGFEDERATE_PROVIDER_HTTPS_HOST";
pub const ENV_ADMIN_API_PATH: &str = "PINGFEDERATE_PROVIDER_ADMIN_API_PATH";
pub const ENV_USERNAME: &str = "PINGFEDERATE_PROVIDER_USERNAME";
pub const ENV_PASSWORD: &str = "PINGFEDERATE_PROVIDER_PASSWORD";
pub const ENV_ACCESS_TOKEN: &str = "PINGFEDERATE_PROVIDER_ACCESS_TOKEN";
pub const ENV_CLIENT_ID: &str = "PINGFEDERATE_PROVIDER_OAUTH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "PINGFEDERATE_PROVIDER_OAUTH_CLIENT_SECRET";
pub const ENV_TOKEN_URL: &str = "PINGFEDERATE_PROVIDER_OAUTH_TOKEN_URL";
pub const ENV_SCOPES: &str = "PINGFEDERATE_PROVIDER_OAUTH_SCOPES";
pub const ENV_INSECURE_TRUST_ALL_TLS: &str = "PINGFEDERATE_PROVIDER_INSECURE_TRUST_ALL_TLS";
pub const ENV_CA_CERTIFICATE_PEM_FILES: &str = "PINGFEDERATE_PROVIDER_CA_CERTIFICATE_PEM_FILES";
pub const ENV_X_BYPASS_EXTERNAL_VALIDATION_HEADER: &str =
    "PINGFEDERATE_PROVIDER_X_BYPASS_EXTERNAL_VALIDATION_HEADER";
pub const ENV_PRODUCT_VERSION: &str = "PINGFEDERATE_PROVIDER_PRODUCT_VERSION";
pub const ENV_APPEND_USER_AGENT: &str = "PINGFEDERATE_TF_APPEND_USER_AGENT";

pub const DEFAULT_ADMIN_API_PATH: &str = "/pf-admin-api/v1";
const PEM_CERTIFICATE_MARKER: &str = "-----BEGIN CERTIFICATE-----";

/// PingFederate server version the configuration targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProductVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProductVersion {
    /// Accepts `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`; a missing patch is `0`
    pub fn parse(version: &str) -> Result<Self, Diagnostic> {
        let path = AttributePath::new("product_version");
        if version.is_empty() {
            return Err(Diagnostic::error(
                INVALID_PROVIDER_CONFIGURATION,
                "failed to parse PingFederate version: empty version string",
            )
            .with_attribute(path));
        }

        let invalid = || {
            Diagnostic::error(
                INVALID_PROVIDER_CONFIGURATION,
                format!(
                    "failed to parse PingFederate version '{}'. Expected either two digits (e.g. '11.3') or three digits (e.g. '11.3.4')",
                    version
                ),
            )
            .with_attribute(path.clone())
        };

        let parts = version
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            [major, minor] => Ok(Self {
                major: *major,
                minor: *minor,
                patch: 0,
            }),
            [major, minor, patch] => Ok(Self {
                major: *major,
                minor: *minor,
                patch: *patch,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Fully resolved provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub https_host: String,
    pub admin_api_path: String,
    pub auth: Auth,
    pub insecure_trust_all_tls: bool,
    pub ca_certificate_pem_files: Vec<String>,
    pub x_bypass_external_validation: bool,
    pub product_version: ProductVersion,
}

enum Setting<T> {
    Unknown,
    Value(T),
}

fn string_setting(config: &DynamicValue, attribute: &str, env_var: &str) -> Setting<String> {
    match config.value.attr(attribute) {
        Some(Dynamic::Unknown) => Setting::Unknown,
        Some(Dynamic::String(value)) => Setting::Value(value.clone()),
        _ => Setting::Value(std::env::var(env_var).unwrap_or_default()),
    }
}

fn list_setting(config: &DynamicValue, attribute: &str, env_var: &str) -> Setting<Vec<String>> {
    match config.value.attr(attribute) {
        Some(Dynamic::Unknown) => Setting::Unknown,
        Some(Dynamic::List(items)) => Setting::Value(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        _ => {
            let value = std::env::var(env_var).unwrap_or_default();
            if value.is_empty() {
                Setting::Value(Vec::new())
            } else {
                Setting::Value(value.split(',').map(str::to_string).collect())
            }
        }
    }
}

fn bool_setting(config: &DynamicValue, attribute: &str, env_var: &str) -> bool {
    if let Some(value) = config.value.attr(attribute).and_then(Dynamic::as_bool) {
        return value;
    }
    match std::env::var(env_var).ok().and_then(|v| parse_env_bool(&v)) {
        Some(value) => value,
        None => {
            tracing::info!(
                "Failed to parse boolean from '{}' environment variable, defaulting '{}' to false",
                env_var,
                attribute
            );
            false
        }
    }
}

/// Accepts the spellings Go's strconv.ParseBool does
fn parse_env_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn unknown_error(attribute: &str, env_var: &str) -> Diagnostic {
    Diagnostic::error(
        INVALID_PROVIDER_CONFIGURATION,
        format!(
            "{} cannot be unknown. It can be set either in the configuration or with the {} environment variable",
            attribute, env_var
        ),
    )
    .with_attribute(AttributePath::new(attribute))
}

fn required_error(attribute: &str, env_var: &str) -> Diagnostic {
    Diagnostic::error(
        INVALID_PROVIDER_CONFIGURATION,
        format!(
            "{} is required. Either set it in the configuration or use the {} environment variable",
            attribute, env_var
        ),
    )
    .with_attribute(AttributePath::new(attribute))
}

fn auth_attribute_error(attribute: &str, method: &str, env_var: &str) -> Diagnostic {
    Diagnostic::error(
        INVALID_PROVIDER_CONFIGURATION,
        format!(
            "{} cannot be empty when using {} authentication. Either set it in the configuration or use the {} environment variable.",
            attribute, method, env_var
        ),
    )
    .with_attribute(AttributePath::new(attribute))
}

/// Resolves a string attribute, recording an error when it is unknown
fn resolve(
    config: &DynamicValue,
    attribute: &str,
    env_var: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    match string_setting(config, attribute, env_var) {
        Setting::Unknown => {
            diagnostics.push(unknown_error(attribute, env_var));
            String::new()
        }
        Setting::Value(value) => {
            if value.is_empty() {
                tracing::info!("Unable to find {} value", attribute);
            }
            value
        }
    }
}

impl ProviderConfig {
    /// Reads the provider block, falling back to the environment, and
    /// validates the authentication settings.
    pub fn from_config(config: &DynamicValue) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let https_host = resolve(config, "https_host", ENV_HTTPS_HOST, &mut diagnostics);
        if https_host.is_empty()
            && !matches!(config.value.attr("https_host"), Some(Dynamic::Unknown))
        {
            diagnostics.push(required_error("https_host", ENV_HTTPS_HOST));
        }

        let admin_api_path = match string_setting(config, "admin_api_path", ENV_ADMIN_API_PATH) {
            Setting::Unknown => {
                diagnostics.push(unknown_error("admin_api_path", ENV_ADMIN_API_PATH));
                String::new()
            }
            Setting::Value(path) if path.is_empty() => DEFAULT_ADMIN_API_PATH.to_string(),
            Setting::Value(path) => path,
        };

        let username = resolve(config, "username", ENV_USERNAME, &mut diagnostics);
        let password = resolve(config, "password", ENV_PASSWORD, &mut diagnostics);
        let access_token = resolve(config, "access_token", ENV_ACCESS_TOKEN, &mut diagnostics);
        let client_id = resolve(config, "client_id", ENV_CLIENT_ID, &mut diagnostics);
        let client_secret = resolve(config, "client_secret", ENV_CLIENT_SECRET, &mut diagnostics);
        let token_url = resolve(config, "token_url", ENV_TOKEN_URL, &mut diagnostics);
        let scopes = match list_setting(config, "scopes", ENV_SCOPES) {
            Setting::Unknown => {
                diagnostics.push(unknown_error("scopes", ENV_SCOPES));
                Vec::new()
            }
            Setting::Value(scopes) => scopes,
        };

        let has_basic = !username.is_empty() || !password.is_empty();
        let has_access_token = !access_token.is_empty();
        let has_oauth = !client_id.is_empty() || !client_secret.is_empty() || !token_url.is_empty();
        let has_any_oauth = has_oauth || !scopes.is_empty();

        if !has_basic && !has_access_token && !has_any_oauth {
            diagnostics.push(Diagnostic::error(
                INVALID_PROVIDER_CONFIGURATION,
                "Unable to find username and password, access_token, or OAuth required properties for configuration. username and password, access_token, or oauth configuration required values were not supplied. Either set them in the configuration or use the PINGFEDERATE_PROVIDER_* environment variables.",
            ));
        }
        if has_basic && has_access_token {
            diagnostics.push(Diagnostic::error(
                INVALID_PROVIDER_CONFIGURATION,
                "Username and password cannot be used with access_token. Only basic authentication (username and password) or access_token can be used. If you want to use access_token, remove username and password from the configuration or use the PINGFEDERATE_PROVIDER_USERNAME and PINGFEDERATE_PROVIDER_PASSWORD environment variables.",
            ));
        }
        if has_basic && has_any_oauth {
            diagnostics.push(Diagnostic::error(
                INVALID_PROVIDER_CONFIGURATION,
                "Username and password cannot be used with OAuth configuration properties. Only basic authentication (username and password) or OAuth authentication can be used. If you want to use OAuth, remove username and password from the configuration or use the PINGFEDERATE_PROVIDER_USERNAME and PINGFEDERATE_PROVIDER_PASSWORD environment variables.",
            ));
        }
        if has_access_token && has_any_oauth {
            diagnostics.push(Diagnostic::error(
                INVALID_PROVIDER_CONFIGURATION,
                "Access token cannot be used with OAuth configuration. Only access_token or OAuth authentication can be used. If you want to use OAuth, remove access_token from the configuration or use the PINGFEDERATE_PROVIDER_ACCESS_TOKEN environment variable.",
            ));
        }

        if has_basic && !has_access_token && !has_any_oauth {
            if username.is_empty() {
                diagnostics.push(auth_attribute_error("username", "basic", ENV_USERNAME));
            }
            if password.is_empty() {
                diagnostics.push(auth_attribute_error("password", "basic", ENV_PASSWORD));
            }
        }
        if has_oauth && !has_basic && !has_access_token {
            if client_id.is_empty() {
                diagnostics.push(auth_attribute_error("client_id", "OAuth", ENV_CLIENT_ID));
            }
            if client_secret.is_empty() {
                diagnostics.push(auth_attribute_error(
                    "client_secret",
                    "OAuth",
                    ENV_CLIENT_SECRET,
                ));
            }
            if token_url.is_empty() {
                diagnostics.push(auth_attribute_error("token_url", "OAuth", ENV_TOKEN_URL));
            }
            if scopes.is_empty() {
                tracing::warn!("No scopes value configured.");
            }
        }

        let product_version = match string_setting(config, "product_version", ENV_PRODUCT_VERSION)
        {
            Setting::Value(version) if !version.is_empty() => {
                match ProductVersion::parse(&version) {
                    Ok(version) => Some(version),
                    Err(diag) => {
                        diagnostics.push(diag);
                        None
                    }
                }
            }
            _ => {
                diagnostics.push(required_error("product_version", ENV_PRODUCT_VERSION));
                None
            }
        };

        let insecure_trust_all_tls =
            bool_setting(config, "insecure_trust_all_tls", ENV_INSECURE_TRUST_ALL_TLS);
        let x_bypass_external_validation = bool_setting(
            config,
            "x_bypass_external_validation_header",
            ENV_X_BYPASS_EXTERNAL_VALIDATION_HEADER,
        );
        let ca_certificate_pem_files = match list_setting(
            config,
            "ca_certificate_pem_files",
            ENV_CA_CERTIFICATE_PEM_FILES,
        ) {
            Setting::Unknown => Vec::new(),
            Setting::Value(files) => files,
        };

        let auth = if has_access_token {
            Auth::AccessToken(access_token)
        } else if has_oauth {
            Auth::OAuth(OAuthConfig {
                client_id,
                client_secret,
                token_url,
                scopes,
            })
        } else {
            Auth::Basic { username, password }
        };

        match product_version {
            Some(product_version) if !tfplug::types::has_errors(&diagnostics) => Ok(Self {
                https_host,
                admin_api_path,
                auth,
                insecure_trust_all_tls,
                ca_certificate_pem_files,
                x_bypass_external_validation,
                product_version,
            }),
            _ => Err(diagnostics),
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}{}", self.https_host, self.admin_api_path)
    }

    pub fn user_agent(&self, provider_version: &str) -> String {
        let mut user_agent = format!(
            "terraform-provider-pingfederate/{} {}",
            provider_version, self.product_version
        );
        if let Ok(suffix) = std::env::var(ENV_APPEND_USER_AGENT) {
            if !suffix.is_empty() {
                user_agent.push(' ');
                user_agent.push_str(&suffix);
            }
        }
        user_agent
    }

    /// Loads the CA files and assembles the API client settings. Warnings
    /// are returned alongside the settings.
    pub fn client_settings(
        &self,
        provider_version: &str,
    ) -> Result<(ClientSettings, Vec<Diagnostic>), Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        let mut ca_certificates_pem = Vec::new();

        if self.ca_certificate_pem_files.is_empty() {
            tracing::info!("No CA certs specified, using the host's root CA set");
        }
        for file in &self.ca_certificate_pem_files {
            let file = file.trim();
            match std::fs::read(file) {
                Ok(pem) => {
                    tracing::info!("Adding CA cert from file: {}", file);
                    if String::from_utf8_lossy(&pem).contains(PEM_CERTIFICATE_MARKER) {
                        ca_certificates_pem.push(pem);
                    } else {
                        diagnostics.push(Diagnostic::warning(
                            INVALID_PROVIDER_CONFIGURATION,
                            format!("Failed to parse CA PEM certificate from file: {}", file),
                        ));
                    }
                }
                Err(e) => diagnostics.push(Diagnostic::error(
                    INVALID_PROVIDER_CONFIGURATION,
                    format!("Failed to read CA PEM certificate file: {}. {}", file, e),
                )),
            }
        }

        if tfplug::types::has_errors(&diagnostics) {
            return Err(diagnostics);
        }

        let settings = ClientSettings {
            base_url: self.base_url(),
            auth: self.auth.clone(),
            connection: ConnectionSettings {
                insecure_trust_all_tls: self.insecure_trust_all_tls,
                ca_certificates_pem,
                bypass_external_validation: self.x_bypass_external_validation,
                user_agent: self.user_agent(provider_version),
            },
            retry_config: RetryConfig::default(),
        };
        Ok((settings, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_version_accepts_two_or_three_parts() {
        assert_eq!(
            ProductVersion::parse("12.2").unwrap(),
            ProductVersion {
                major: 12,
                minor: 2,
                patch: 0
            }
        );
        assert_eq!(ProductVersion::parse("11.3.4").unwrap().to_string(), "11.3.4");
    }

    #[test]
    fn product_version_rejects_malformed_values() {
        for bad in ["", "12", "12.x", "1.2.3.4"] {
            let diag = ProductVersion::parse(bad).unwrap_err();
            assert_eq!(diag.summary, INVALID_PROVIDER_CONFIGURATION);
            assert_eq!(
                diag.attribute.map(|p| p.to_string()),
                Some("product_version".to_string())
            );
        }
    }

    #[test]
    fn env_bool_spellings() {
        assert_eq!(parse_env_bool("true"), Some(true));
        assert_eq!(parse_env_bool("1"), Some(true));
        assert_eq!(parse_env_bool("F"), Some(false));
        assert_eq!(parse_env_bool("yes"), None);
    }
}
