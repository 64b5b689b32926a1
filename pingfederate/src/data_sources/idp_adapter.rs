//! IdP adapter data source implementation

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

use super::common::{
    computed_view, id_attribute, inherited_attribute, link_attribute, lookup_id_attribute,
    name_attribute,
};
use crate::api::models::{IdpAdapter, IdpAdapterAttribute, IdpAdapterAttributeContract};
use crate::diagnostics::report_api_error;
use crate::plugin_configuration;
use crate::resources::attribute_mapping::{self, ATTRIBUTE_MAPPING};
use crate::resources::common::{
    not_configured, provider_data_from, resource_link_to_state, string_from,
};
use crate::resources::idp_adapter::contract_attribute_to_state;
use crate::PingFederateProviderData;

const TYPE_NAME: &str = "pingfederate_idp_adapter";

#[derive(Default)]
pub struct IdpAdapterDataSource {
    provider_data: Option<PingFederateProviderData>,
}

impl IdpAdapterDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let contract_attributes = |name: &str, description: &str| -> Attribute {
            let field = |name: &str, type_, description: &str| {
                AttributeBuilder::new(name, type_)
                    .description(description)
                    .computed()
                    .build()
            };
            AttributeBuilder::nested(
                name,
                NestedType::set(vec![
                    field("name", AttributeType::String, "The name of this attribute."),
                    field("pseudonym", AttributeType::Bool, "Specifies whether this attribute is used to construct a pseudonym for the SP."),
                    field("masked", AttributeType::Bool, "Specifies whether this attribute is masked in PingFederate logs."),
                ]),
            )
            .description(description)
            .computed()
            .build()
        };

        let mut mapping = computed_view(attribute_mapping::resource_attribute());
        if let Some(nested) = mapping.nested_type.as_mut() {
            nested.attributes.push(inherited_attribute(
                "Whether this attribute mapping is inherited from its parent instance.",
            ));
        }

        SchemaBuilder::new()
            .version(0)
            .description("Describes an IdP adapter instance.")
            .attribute(id_attribute())
            .attribute(lookup_id_attribute("adapter_id"))
            .attribute(name_attribute())
            .attribute(
                AttributeBuilder::new("authn_ctx_class_ref", AttributeType::String)
                    .description("The fixed value that indicates how the user was authenticated.")
                    .computed()
                    .build(),
            )
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
                        contract_attributes(
                            "core_attributes",
                            "A list of IdP adapter attributes that correspond to the attributes exposed by the IdP adapter type.",
                        ),
                        contract_attributes(
                            "extended_attributes",
                            "A list of additional attributes that can be returned by the IdP adapter.",
                        ),
                        AttributeBuilder::new("unique_user_key_attribute", AttributeType::String)
                            .description("The attribute to use for uniquely identify a user's authentication sessions.")
                            .computed()
                            .build(),
                        AttributeBuilder::new("mask_ognl_values", AttributeType::Bool)
                            .description("Whether or not all OGNL expressions used to fulfill an outgoing assertion contract should be masked in the logs.")
                            .computed()
                            .build(),
                        inherited_attribute(
                            "Whether this attribute contract is inherited from its parent instance.",
                        ),
                    ]),
                )
                .description("The list of attributes that the IdP adapter provides.")
                .computed()
                .build(),
            )
            .attribute(mapping)
            .build()
    }
}

fn attribute_contract_to_state(contract: Option<&IdpAdapterAttributeContract>) -> Dynamic {
    let Some(contract) = contract else {
        return Dynamic::Null;
    };
    let attributes = |attributes: &[IdpAdapterAttribute]| {
        Dynamic::List(attributes.iter().map(contract_attribute_to_state).collect())
    };
    Dynamic::object([
        ("core_attributes", attributes(&contract.core_attributes)),
        ("extended_attributes", attributes(&contract.extended_attributes)),
        (
            "unique_user_key_attribute",
            Dynamic::optional_string(contract.unique_user_key_attribute.clone()),
        ),
        (
            "mask_ognl_values",
            Dynamic::optional_bool(contract.mask_ognl_values),
        ),
        ("inherited", Dynamic::optional_bool(contract.inherited)),
    ])
}

fn state_from(adapter: &IdpAdapter) -> DynamicValue {
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::string(&adapter.id)),
        ("adapter_id", Dynamic::string(&adapter.id)),
        ("name", Dynamic::string(&adapter.name)),
        (
            "authn_ctx_class_ref",
            Dynamic::optional_string(adapter.authn_ctx_class_ref.clone()),
        ),
        (
            "plugin_descriptor_ref",
            resource_link_to_state(Some(&adapter.plugin_descriptor_ref)),
        ),
        (
            "parent_ref",
            resource_link_to_state(adapter.parent_ref.as_ref()),
        ),
        (
            "configuration",
            plugin_configuration::to_data_source_state(&adapter.configuration),
        ),
        (
            "attribute_contract",
            attribute_contract_to_state(adapter.attribute_contract.as_ref()),
        ),
        (
            ATTRIBUTE_MAPPING,
            attribute_mapping::to_state(adapter.attribute_mapping.as_ref(), true),
        ),
    ]))
}

#[async_trait]
impl DataSource for IdpAdapterDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
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
        let adapter_id = match string_from(&request.config, "adapter_id") {
            Ok(id) => id,
            Err(diag) => return ReadDataSourceResponse::failed(vec![diag]),
        };

        tracing::debug!(%adapter_id, "reading idp adapter data source");
        let fetched =
            crate::api::call(&ctx, provider_data.client.idp_adapters().get(&adapter_id)).await;

        match fetched {
            Ok(adapter) => ReadDataSourceResponse::new(state_from(&adapter)),
            Err(e) => ReadDataSourceResponse::failed(report_api_error(
                "An error occurred while getting an IdP Adapter",
                &e,
                Some("adapter_id"),
            )),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for IdpAdapterDataSource {
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
