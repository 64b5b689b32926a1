//! Password credential validator data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};

use super::common::{id_attribute, link_attribute, lookup_id_attribute, name_attribute};
use crate::api::models::PasswordCredentialValidator;
use crate::diagnostics::report_api_error;
use crate::plugin_configuration;
use crate::resources::common::{
    not_configured, provider_data_from, resource_link_to_state, string_from,
};
use crate::resources::password_credential_validator::attribute_contract_to_state;
use crate::PingFederateProviderData;

#[derive(Default)]
pub struct PasswordCredentialValidatorDataSource {
    provider_data: Option<PingFederateProviderData>,
}

impl PasswordCredentialValidatorDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let contract_names = |name: &str, description: &str| -> Attribute {
            AttributeBuilder::nested(
                name,
                NestedType::set(vec![AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of this attribute.")
                    .computed()
                    .build()]),
            )
            .description(description)
            .computed()
            .build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Describes a password credential validator plugin instance.")
            .attribute(id_attribute())
            .attribute(lookup_id_attribute("validator_id"))
            .attribute(name_attribute())
            .attribute(link_attribute(
                "plugin_descriptor_ref",
                "Reference to the plugin descriptor for this instance.",
            ))
            .attribute(link_attribute(
                "parent_ref",
                "The reference to this plugin's parent instance.",
            ))
            .attribute(plugin_configuration::data_source_attribute())
            .attribute(
                AttributeBuilder::nested(
                    "attribute_contract",
                    NestedType::single(vec![
                        contract_names(
                            "core_attributes",
                            "A list of read-only attributes that are automatically populated by the password credential validator descriptor.",
                        ),
                        contract_names(
                            "extended_attributes",
                            "A list of additional attributes that can be returned by the password credential validator.",
                        ),
                        AttributeBuilder::new("inherited", AttributeType::Bool)
                            .description("Whether this attribute contract is inherited from its parent instance.")
                            .computed()
                            .build(),
                    ]),
                )
                .description("The list of attributes that the password credential validator provides.")
                .computed()
                .build(),
            )
            .build()
    }
}

fn state_from(validator: &PasswordCredentialValidator) -> DynamicValue {
    let attribute_contract = match (
        attribute_contract_to_state(validator.attribute_contract.as_ref()),
        validator.attribute_contract.as_ref(),
    ) {
        (Dynamic::Map(mut attributes), Some(contract)) => {
            attributes.insert(
                "inherited".to_string(),
                Dynamic::optional_bool(contract.inherited),
            );
            Dynamic::Map(attributes)
        }
        (other, _) => other,
    };

    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::string(&validator.id)),
        ("validator_id", Dynamic::string(&validator.id)),
        ("name", Dynamic::string(&validator.name)),
        (
            "plugin_descriptor_ref",
            resource_link_to_state(Some(&validator.plugin_descriptor_ref)),
        ),
        (
            "parent_ref",
            resource_link_to_state(validator.parent_ref.as_ref()),
        ),
        (
            "configuration",
            plugin_configuration::to_data_source_state(&validator.configuration),
        ),
        ("attribute_contract", attribute_contract),
    ]))
}

#[async_trait]
impl DataSource for PasswordCredentialValidatorDataSource {
    fn type_name(&self) -> &str {
        "pingfederate_password_credential_validator"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: Self::schema_static().validate(&request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadDataSourceResponse::failed(vec![not_configured()]);
        };
        let validator_id = match string_from(&request.config, "validator_id") {
            Ok(id) => id,
            Err(diag) => return ReadDataSourceResponse::failed(vec![diag]),
        };

        tracing::debug!(%validator_id, "reading password credential validator data source");
        let fetched = crate::api::call(
            &ctx,
            provider_data
                .client
                .password_credential_validators()
                .get(&validator_id),
        )
        .await;

        match fetched {
            Ok(validator) => ReadDataSourceResponse::new(state_from(&validator)),
            Err(e) => ReadDataSourceResponse::failed(report_api_error(
                "An error occurred while getting a Password Credential Validator",
                &e,
                Some("validator_id"),
            )),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for PasswordCredentialValidatorDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureDataSourceResponse { diagnostics }
    }
}
