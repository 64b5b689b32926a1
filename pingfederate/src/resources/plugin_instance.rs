//! Plugin instance resources that share the generic id/name/configuration
//! shape: notification publishers, secret managers and captcha providers.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceMetadataRequest, ResourceMetadataResponse, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithImportState,
    ResourceWithModifyPlan, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringLengthValidator;
use tfplug::{import_state_passthrough_id, is_import_read};

use super::common::{
    id_attribute, modify_configuration_plan, not_configured, parent_ref_attribute,
    plugin_descriptor_ref_attribute, plugin_id_attribute, private_after_read, provider_data_from,
    resource_link_from, resource_link_to_state, string_from,
};
use crate::api::models::PluginInstance;
use crate::api::PluginInstanceKind;
use crate::diagnostics::{internal_error, report_api_error, resource_not_found_warning};
use crate::plugin_configuration;
use crate::PingFederateProviderData;

pub struct PluginInstanceResource {
    kind: PluginInstanceKind,
    type_name: String,
    provider_data: Option<PingFederateProviderData>,
}

impl PluginInstanceResource {
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
                "Manages a {} plugin instance.",
                kind.display_name().to_lowercase()
            ))
            .attribute(id_attribute())
            .attribute(plugin_id_attribute(kind.id_attribute()))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The plugin instance name. The name can be modified once the instance is created.")
                    .required()
                    .validator(StringLengthValidator::at_least(1))
                    .build(),
            )
            .attribute(plugin_descriptor_ref_attribute())
            .attribute(parent_ref_attribute())
            .attribute(plugin_configuration::resource_attribute())
            .build()
    }

    fn build_request(&self, plan: &DynamicValue) -> Result<PluginInstance, Diagnostic> {
        let id = string_from(plan, self.kind.id_attribute())?;
        let name = string_from(plan, "name")?;
        let plugin_descriptor_ref = resource_link_from(plan, "plugin_descriptor_ref")?
            .ok_or_else(|| {
                internal_error("Failed to build plugin descriptor ref request object: id is not known")
            })?;
        let parent_ref = resource_link_from(plan, "parent_ref")?;
        let configuration = plan.value.attr("configuration").unwrap_or(&Dynamic::Null);
        let configuration = plugin_configuration::to_client_struct(configuration).map_err(|e| {
            internal_error(format!("Failed to build configuration request object: {}", e))
        })?;

        Ok(PluginInstance {
            id,
            name,
            plugin_descriptor_ref,
            parent_ref,
            configuration,
        })
    }

    fn read_response(
        &self,
        instance: &PluginInstance,
        configuration_from_plan: &Dynamic,
        is_import_read: bool,
    ) -> (DynamicValue, Vec<Diagnostic>) {
        let (configuration, diagnostics) = plugin_configuration::to_state(
            configuration_from_plan,
            &instance.configuration,
            is_import_read,
        );
        let state = Dynamic::object([
            ("id", Dynamic::string(&instance.id)),
            (self.kind.id_attribute(), Dynamic::string(&instance.id)),
            ("name", Dynamic::string(&instance.name)),
            (
                "plugin_descriptor_ref",
                resource_link_to_state(Some(&instance.plugin_descriptor_ref)),
            ),
            ("parent_ref", resource_link_to_state(instance.parent_ref.as_ref())),
            ("configuration", configuration),
        ]);
        (DynamicValue::new(state), diagnostics)
    }

    fn client(&self) -> Result<&crate::api::Client, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| data.client.as_ref())
            .ok_or_else(not_configured)
    }

    fn error_summary(&self, action: &str) -> String {
        format!(
            "An error occurred while {} a {}",
            action,
            self.kind.display_name()
        )
    }
}

#[async_trait]
impl Resource for PluginInstanceResource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name.clone(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_for(self.kind),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: Self::schema_for(self.kind).validate(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let built = self
            .client()
            .and_then(|client| Ok((client, self.build_request(&request.planned_state)?)));
        let (client, body) = match built {
            Ok(built) => built,
            Err(diag) => return CreateResourceResponse::failed(vec![diag]),
        };

        tracing::debug!(kind = ?self.kind, id = %body.id, "creating plugin instance");
        match crate::api::call(&ctx, client.plugin_instances(self.kind).create(&body)).await {
            Ok(instance) => {
                let configuration = request
                    .planned_state
                    .value
                    .attr("configuration")
                    .unwrap_or(&Dynamic::Null);
                let (new_state, diagnostics) = self.read_response(&instance, configuration, false);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => CreateResourceResponse::failed(report_api_error(
                &self.error_summary("creating"),
                &e,
                Some(self.kind.id_attribute()),
            )),
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let import_read = is_import_read(&request.private);

        let lookup = self.client().and_then(|client| {
            Ok((
                client,
                string_from(&request.current_state, self.kind.id_attribute())?,
            ))
        });
        let (client, id) = match lookup {
            Ok(lookup) => lookup,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                };
            }
        };

        match crate::api::call(&ctx, client.plugin_instances(self.kind).get(&id)).await {
            Ok(instance) => {
                let configuration = request
                    .current_state
                    .value
                    .attr("configuration")
                    .unwrap_or(&Dynamic::Null);
                let (new_state, mut diagnostics) =
                    self.read_response(&instance, configuration, import_read);
                let private = private_after_read(request.private, import_read, &mut diagnostics);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                    private,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(kind = ?self.kind, %id, "plugin instance no longer exists");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![resource_not_found_warning(self.kind.display_name())],
                    private: request.private,
                }
            }
            Err(e) => ReadResourceResponse {
                diagnostics: report_api_error(
                    &self.error_summary("getting"),
                    &e,
                    Some(self.kind.id_attribute()),
                ),
                new_state: Some(request.current_state),
                private: request.private,
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let built = self
            .client()
            .and_then(|client| Ok((client, self.build_request(&request.planned_state)?)));
        let (client, body) = match built {
            Ok(built) => built,
            Err(diag) => return UpdateResourceResponse::unchanged(request.prior_state, vec![diag]),
        };

        tracing::debug!(kind = ?self.kind, id = %body.id, "updating plugin instance");
        let updated = crate::api::call(
            &ctx,
            client.plugin_instances(self.kind).update(&body.id, &body),
        )
        .await;
        match updated {
            Ok(instance) => {
                let configuration = request
                    .planned_state
                    .value
                    .attr("configuration")
                    .unwrap_or(&Dynamic::Null);
                let (new_state, diagnostics) = self.read_response(&instance, configuration, false);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => UpdateResourceResponse::unchanged(
                request.prior_state,
                report_api_error(
                    &self.error_summary("updating"),
                    &e,
                    Some(self.kind.id_attribute()),
                ),
            ),
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let lookup = self.client().and_then(|client| {
            Ok((
                client,
                string_from(&request.prior_state, self.kind.id_attribute())?,
            ))
        });
        let (client, id) = match lookup {
            Ok(lookup) => lookup,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let diagnostics =
            match crate::api::call(&ctx, client.plugin_instances(self.kind).delete(&id)).await {
                Ok(()) => vec![],
                Err(e) if e.is_not_found() => vec![],
                Err(e) => report_api_error(
                    &self.error_summary("deleting"),
                    &e,
                    Some(self.kind.id_attribute()),
                ),
            };
        DeleteResourceResponse { diagnostics }
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for PluginInstanceResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithModifyPlan for PluginInstanceResource {
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        modify_configuration_plan(request)
    }
}

#[async_trait]
impl ResourceWithImportState for PluginInstanceResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(
            &ctx,
            AttributePath::new(self.kind.id_attribute()),
            &request,
            &mut response,
        );
        response
    }
}
