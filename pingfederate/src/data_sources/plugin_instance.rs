//! Data sources for notification publishers, secret managers and captcha
//! providers

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};

use super::common::{id_attribute, link_attribute, lookup_id_attribute, name_attribute};
use crate::api::PluginInstanceKind;
use crate::diagnostics::report_api_error;
use crate::plugin_configuration;
use crate::resources::common::{
    not_configured, provider_data_from, resource_link_to_state, string_from,
};
use crate::PingFederateProviderData;

pub struct PluginInstanceDataSource {
    kind: PluginInstanceKind,
    type_name: String,
    provider_data: Option<PingFederateProviderData>,
}

impl PluginInstanceDataSource {
    pub fn new(kind: PluginInstanceKind) -> Self {
        Self {
            kind,
            type_name: format!("pingfederate_{}", kind.type_suffix()),
            provider_data: None,
        }
    }

    pub fn schema_for(kind: PluginInstanceKind) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description(&format!(
                "Describes a {} plugin instance.",
                kind.display_name().to_lowercase()
            ))
            .attribute(id_attribute())
            .attribute(lookup_id_attribute(kind.id_attribute()))
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
            .build()
    }
}

#[async_trait]
impl DataSource for PluginInstanceDataSource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name.clone(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_for(self.kind),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: Self::schema_for(self.kind).validate(&request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let lookup = self
            .provider_data
            .as_ref()
            .ok_or_else(not_configured)
            .and_then(|data| Ok((data, string_from(&request.config, self.kind.id_attribute())?)));
        let (provider_data, id) = match lookup {
            Ok(lookup) => lookup,
            Err(diag) => return ReadDataSourceResponse::failed(vec![diag]),
        };

        let fetched = crate::api::call(
            &ctx,
            provider_data.client.plugin_instances(self.kind).get(&id),
        )
        .await;

        match fetched {
            Ok(instance) => ReadDataSourceResponse::new(DynamicValue::new(Dynamic::object([
                    ("id", Dynamic::string(&instance.id)),
                    (self.kind.id_attribute(), Dynamic::string(&instance.id)),
                    ("name", Dynamic::string(&instance.name)),
                    (
                        "plugin_descriptor_ref",
                        resource_link_to_state(Some(&instance.plugin_descriptor_ref)),
                    ),
                    ("parent_ref", resource_link_to_state(instance.parent_ref.as_ref())),
                    (
                        "configuration",
                        plugin_configuration::to_data_source_state(&instance.configuration),
                    ),
                ]))),
            Err(e) => ReadDataSourceResponse::failed(report_api_error(
                &format!(
                    "An error occurred while getting a {}",
                    self.kind.display_name()
                ),
                &e,
                Some(self.kind.id_attribute()),
            )),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for PluginInstanceDataSource {
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
