pub mod api;
pub mod config;
pub mod data_sources;
pub mod diagnostics;
pub mod plugin_configuration;
pub mod provider_data;
pub mod resources;

pub use provider_data::PingFederateProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};

use crate::api::{Client, PluginInstanceKind};
use crate::config::ProviderConfig;
use crate::diagnostics::internal_error;

#[derive(Default)]
pub struct PingFederateProvider;

impl PingFederateProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn schema_static() -> Schema {
        let string = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .build()
        };
        let sensitive = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .sensitive()
                .build()
        };
        let string_list = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::List(Box::new(AttributeType::String)))
                .description(description)
                .optional()
                .build()
        };
        let flag = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::Bool)
                .description(description)
                .optional()
                .build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("PingFederate POC Provider.")
            .attribute(string("https_host", "URI for PingFederate HTTPS port. Default value can be set with the `PINGFEDERATE_PROVIDER_HTTPS_HOST` environment variable."))
            .attribute(string("admin_api_path", "Path for PingFederate Admin API. Default value can be set with the `PINGFEDERATE_PROVIDER_ADMIN_API_PATH` environment variable. If no value is supplied, the value used will be `/pf-admin-api/v1`."))
            .attribute(string("username", "Username for PingFederate Admin user. Default value can be set with the `PINGFEDERATE_PROVIDER_USERNAME` environment variable."))
            .attribute(sensitive("password", "Password for PingFederate Admin user. Default value can be set with the `PINGFEDERATE_PROVIDER_PASSWORD` environment variable."))
            .attribute(sensitive("access_token", "Access token for PingFederate Admin API. Cannot be used in conjunction with username and password, or oauth. Default value can be set with the `PINGFEDERATE_PROVIDER_ACCESS_TOKEN` environment variable."))
            .attribute(string("client_id", "OAuth client ID for requesting access token. Default value can be set with the `PINGFEDERATE_PROVIDER_OAUTH_CLIENT_ID` environment variable."))
            .attribute(sensitive("client_secret", "OAuth client secret for requesting access token. Default value can be set with the `PINGFEDERATE_PROVIDER_OAUTH_CLIENT_SECRET` environment variable."))
            .attribute(string("token_url", "OAuth token URL for requesting access token. Default value can be set with the `PINGFEDERATE_PROVIDER_OAUTH_TOKEN_URL` environment variable."))
            .attribute(string_list("scopes", "OAuth scopes for access token. Default value can be set with the `PINGFEDERATE_PROVIDER_OAUTH_SCOPES` environment variable."))
            .attribute(flag("insecure_trust_all_tls", "Set to true to trust any certificate when connecting to the PingFederate server. This is insecure and should not be enabled outside of testing. Default value can be set with the `PINGFEDERATE_PROVIDER_INSECURE_TRUST_ALL_TLS` environment variable."))
            .attribute(string_list("ca_certificate_pem_files", "Paths to files containing PEM-encoded certificates to be trusted as root CAs when connecting to the PingFederate server over HTTPS. If not set, the host's root CA set will be used. Default value can be set with the `PINGFEDERATE_PROVIDER_CA_CERTIFICATE_PEM_FILES` environment variable, using commas to delimit multiple PEM files if necessary."))
            .attribute(flag("x_bypass_external_validation_header", "Header value in request for PingFederate. The connection test will be bypassed when set to true. Default value can be set with the `PINGFEDERATE_PROVIDER_X_BYPASS_EXTERNAL_VALIDATION_HEADER` environment variable."))
            .attribute(string("product_version", "Version of the PingFederate server being configured. Default value can be set with the `PINGFEDERATE_PROVIDER_PRODUCT_VERSION` environment variable."))
            .build()
    }
}

#[async_trait]
impl Provider for PingFederateProvider {
    fn type_name(&self) -> &str {
        "pingfederate"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: Self::schema_static().validate(&request.config),
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        tracing::info!(
            terraform_version = %request.terraform_version,
            "configuring PingFederate provider"
        );

        let failed = |diagnostics| ConfigureProviderResponse {
            diagnostics,
            provider_data: None,
        };

        let config = match ProviderConfig::from_config(&request.config) {
            Ok(config) => config,
            Err(diagnostics) => return failed(diagnostics),
        };

        let (settings, mut diagnostics) = match config.client_settings(env!("CARGO_PKG_VERSION")) {
            Ok(result) => result,
            Err(diagnostics) => return failed(diagnostics),
        };

        let client = match Client::from_settings(settings) {
            Ok(client) => client,
            Err(e) => {
                diagnostics.push(internal_error(format!(
                    "Unable to create PingFederate client: {}",
                    e
                )));
                return failed(diagnostics);
            }
        };

        tracing::info!(
            base_url = %client.base_url(),
            product_version = %config.product_version,
            "configured PingFederate client"
        );

        let provider_data = PingFederateProviderData::new(client, config.product_version);
        ConfigureProviderResponse {
            diagnostics,
            provider_data: Some(Arc::new(provider_data)),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "pingfederate_password_credential_validator".to_string(),
            Box::new(|| {
                Box::new(resources::PasswordCredentialValidatorResource::new())
                    as Box<dyn ResourceWithConfigure>
            }),
        );
        factories.insert(
            "pingfederate_idp_adapter".to_string(),
            Box::new(|| {
                Box::new(resources::IdpAdapterResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        for kind in PluginInstanceKind::all() {
            factories.insert(
                format!("pingfederate_{}", kind.type_suffix()),
                Box::new(move || {
                    Box::new(resources::PluginInstanceResource::new(kind))
                        as Box<dyn ResourceWithConfigure>
                }),
            );
        }
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "pingfederate_password_credential_validator".to_string(),
            Box::new(|| {
                Box::new(data_sources::PasswordCredentialValidatorDataSource::new())
                    as Box<dyn DataSourceWithConfigure>
            }),
        );
        factories.insert(
            "pingfederate_idp_adapter".to_string(),
            Box::new(|| {
                Box::new(data_sources::IdpAdapterDataSource::new())
                    as Box<dyn DataSourceWithConfigure>
            }),
        );
        for kind in PluginInstanceKind::all() {
            factories.insert(
                format!("pingfederate_{}", kind.type_suffix()),
                Box::new(move || {
                    Box::new(data_sources::PluginInstanceDataSource::new(kind))
                        as Box<dyn DataSourceWithConfigure>
                }),
            );
        }
        factories
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::config::{ENV_ACCESS_TOKEN, ENV_HTTPS_HOST, ENV_PRODUCT_VERSION, ENV_USERNAME};
    use serial_test::serial;
    use tfplug::types::{ClientCapabilities, Dynamic, DynamicValue};
    use tfplug::{DataSource, Resource};

    fn clear_env() {
        for (name, _) in std::env::vars() {
            if name.starts_with("PINGFEDERATE_PROVIDER_") {
                std::env::remove_var(name);
            }
        }
    }

    fn configure_request(config: Dynamic) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config: DynamicValue::new(config),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var(ENV_HTTPS_HOST, "https://localhost:9999");
        std::env::set_var(ENV_ACCESS_TOKEN, "token");
        std::env::set_var(ENV_PRODUCT_VERSION, "12.1");

        let mut provider = PingFederateProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(Dynamic::Map(HashMap::new())))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let data = response
            .provider_data
            .unwrap()
            .downcast::<PingFederateProviderData>()
            .unwrap();
        assert_eq!(data.client.base_url(), "https://localhost:9999/pf-admin-api/v1");
        assert_eq!(data.product_version.to_string(), "12.1.0");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_rejects_mixed_auth() {
        clear_env();
        std::env::set_var(ENV_USERNAME, "administrator");

        let mut provider = PingFederateProvider::new();
        let response = provider
            .configure(
                Context::new(),
                configure_request(Dynamic::object([
                    ("https_host", Dynamic::string("https://localhost:9999")),
                    ("access_token", Dynamic::string("token")),
                    ("product_version", Dynamic::string("12.1")),
                ])),
            )
            .await;

        assert!(response.provider_data.is_none());
        assert!(response
            .diagnostics
            .iter()
            .any(|d| d.detail.contains("cannot be used with access_token")));

        clear_env();
    }

    #[test]
    fn provider_schema_marks_secrets_sensitive() {
        let schema = PingFederateProvider::schema_static();
        let sensitive: Vec<&str> = schema
            .block
            .attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(sensitive, vec!["password", "access_token", "client_secret"]);
    }

    #[test]
    fn provider_registers_each_plugin_type() {
        let provider = PingFederateProvider::new();
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        for name in [
            "pingfederate_password_credential_validator",
            "pingfederate_idp_adapter",
            "pingfederate_notification_publisher",
            "pingfederate_secret_manager",
            "pingfederate_captcha_provider",
        ] {
            let resource = resources[name]();
            assert_eq!(resource.type_name(), name);
            assert!(resource.as_modify_plan().is_some());
            assert!(resource.as_import_state().is_some());
            assert_eq!(data_sources[name]().type_name(), name);
        }
    }
}
