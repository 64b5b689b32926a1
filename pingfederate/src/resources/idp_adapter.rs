//! IdP adapter resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
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
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringLengthValidator;
use tfplug::{import_state_passthrough_id, is_import_read};

use super::attribute_mapping::{self, ATTRIBUTE_MAPPING};
use super::common::{
    id_attribute, modify_configuration_plan, not_configured, parent_ref_attribute,
    plugin_descriptor_ref_attribute, plugin_id_attribute, private_after_read, provider_data_from,
    resource_link_from, resource_link_to_state, string_from,
};
use crate::api::models::{IdpAdapter, IdpAdapterAttribute, IdpAdapterAttributeContract};
use crate::diagnostics::{internal_error, report_api_error, resource_not_found_warning};
use crate::plugin_configuration;
use crate::PingFederateProviderData;

const TYPE_NAME: &str = "pingfederate_idp_adapter";
const ID_ATTRIBUTE: &str = "adapter_id";
const DISPLAY_NAME: &str = "IdP Adapter";

const ATTRIBUTE_CONTRACT: &str = "attribute_contract";
const CORE_ATTRIBUTES: &str = "core_attributes";
const CORE_ATTRIBUTES_ALL: &str = "core_attributes_all";
const EXTENDED_ATTRIBUTES: &str = "extended_attributes";

#[derive(Default)]
pub struct IdpAdapterResource {
    provider_data: Option<PingFederateProviderData>,
}

impl IdpAdapterResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages an IdP adapter instance.")
            .attribute(id_attribute())
            .attribute(plugin_id_attribute(ID_ATTRIBUTE))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The plugin instance name. The name can be modified once the instance is created.")
                    .required()
                    .validator(StringLengthValidator::at_least(1))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("authn_ctx_class_ref", AttributeType::String)
                    .description("The fixed value that indicates how the user was authenticated.")
                    .optional()
                    .validator(StringLengthValidator::at_least(1))
                    .build(),
            )
            .attribute(plugin_descriptor_ref_attribute())
            .attribute(parent_ref_attribute())
            .attribute(plugin_configuration::resource_attribute())
            .attribute(attribute_contract_attribute())
            .attribute(attribute_mapping::resource_attribute())
            .build()
    }

    fn build_request(plan: &DynamicValue) -> Result<IdpAdapter, Vec<Diagnostic>> {
        let id = string_from(plan, ID_ATTRIBUTE).map_err(|d| vec![d])?;
        let name = string_from(plan, "name").map_err(|d| vec![d])?;
        let plugin_descriptor_ref = resource_link_from(plan, "plugin_descriptor_ref")
            .map_err(|d| vec![d])?
            .ok_or_else(|| {
                vec![internal_error(
                    "Failed to build plugin descriptor ref request object: id is not known",
                )]
            })?;
        let parent_ref = resource_link_from(plan, "parent_ref").map_err(|d| vec![d])?;

        let configuration = plan
            .value
            .attr("configuration")
            .unwrap_or(&Dynamic::Null);
        let configuration = plugin_configuration::to_client_struct(configuration).map_err(|e| {
            vec![internal_error(format!(
                "Failed to build configuration request object: {}",
                e
            ))]
        })?;

        Ok(IdpAdapter {
            id,
            name,
            plugin_descriptor_ref,
            parent_ref,
            configuration,
            authn_ctx_class_ref: known_str(&plan.value, "authn_ctx_class_ref"),
            attribute_contract: attribute_contract_from(&plan.value),
            attribute_mapping: attribute_mapping::to_client_struct(
                plan.value.attr(ATTRIBUTE_MAPPING).unwrap_or(&Dynamic::Null),
            ),
        })
    }

    fn client(&self) -> Result<&crate::api::Client, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| data.client.as_ref())
            .ok_or_else(not_configured)
    }
}

fn contract_attribute_set(name: &str, description: &str) -> AttributeBuilder {
    let flag = |flag: &str, description: &str| {
        AttributeBuilder::new(flag, AttributeType::Bool)
            .description(description)
            .optional()
            .computed()
            .default(Dynamic::Bool(false))
            .build()
    };
    AttributeBuilder::nested(
        name,
        NestedType::set(vec![
            AttributeBuilder::new("name", AttributeType::String)
                .description("The name of this attribute.")
                .required()
                .validator(StringLengthValidator::at_least(1))
                .build(),
            flag("pseudonym", "Specifies whether this attribute is used to construct a pseudonym for the SP. Defaults to `false`."),
            flag("masked", "Specifies whether this attribute is masked in PingFederate logs. Defaults to `false`."),
        ]),
    )
    .description(description)
}

fn attribute_contract_attribute() -> Attribute {
    let core = contract_attribute_set(
        CORE_ATTRIBUTES,
        "A list of IdP adapter attributes that correspond to the attributes exposed by the IdP adapter type.",
    )
    .required()
    .build();

    let extended = contract_attribute_set(
        EXTENDED_ATTRIBUTES,
        "A list of additional attributes that can be returned by the IdP adapter. The extended attributes are only used if the adapter supports them.",
    )
    .optional()
    .computed()
    .default(Dynamic::List(vec![]))
    .build();

    let core_all = AttributeBuilder::nested(
        CORE_ATTRIBUTES_ALL,
        NestedType::set(
            ["name", "pseudonym", "masked"]
                .into_iter()
                .map(|name| {
                    let type_ = if name == "name" {
                        AttributeType::String
                    } else {
                        AttributeType::Bool
                    };
                    AttributeBuilder::new(name, type_).computed().build()
                })
                .collect(),
        ),
    )
    .description("A list of IdP adapter attributes that correspond to the attributes exposed by the IdP adapter type. This attribute will include any values set by default by PingFederate.")
    .computed()
    .build();

    AttributeBuilder::nested(
        ATTRIBUTE_CONTRACT,
        NestedType::single(vec![
            core,
            core_all,
            extended,
            AttributeBuilder::new("unique_user_key_attribute", AttributeType::String)
                .description("The attribute to use for uniquely identify a user's authentication sessions.")
                .optional()
                .validator(StringLengthValidator::at_least(1))
                .build(),
            AttributeBuilder::new("mask_ognl_values", AttributeType::Bool)
                .description("Whether or not all OGNL expressions used to fulfill an outgoing assertion contract should be masked in the logs. Defaults to `false`.")
                .optional()
                .computed()
                .default(Dynamic::Bool(false))
                .build(),
        ]),
    )
    .description("The list of attributes that the IdP adapter provides.")
    .optional()
    .computed()
    .plan_modifier(UseStateForUnknown::create())
    .build()
}

fn known_str(value: &Dynamic, name: &str) -> Option<String> {
    value
        .attr(name)
        .and_then(Dynamic::known)
        .and_then(Dynamic::as_str)
        .map(str::to_string)
}

fn known_bool(value: &Dynamic, name: &str) -> Option<bool> {
    value.attr(name).and_then(Dynamic::known).and_then(Dynamic::as_bool)
}

fn contract_attributes(contract: &Dynamic, name: &str) -> Vec<IdpAdapterAttribute> {
    contract
        .attr(name)
        .and_then(Dynamic::known)
        .and_then(|items| items.try_as_list().ok())
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            Some(IdpAdapterAttribute {
                name: known_str(item, "name")?,
                pseudonym: known_bool(item, "pseudonym"),
                masked: known_bool(item, "masked"),
            })
        })
        .collect()
}

fn attribute_contract_from(plan: &Dynamic) -> Option<IdpAdapterAttributeContract> {
    let contract = plan.attr(ATTRIBUTE_CONTRACT).and_then(Dynamic::known)?;
    Some(IdpAdapterAttributeContract {
        core_attributes: contract_attributes(contract, CORE_ATTRIBUTES),
        extended_attributes: contract_attributes(contract, EXTENDED_ATTRIBUTES),
        unique_user_key_attribute: known_str(contract, "unique_user_key_attribute"),
        mask_ognl_values: known_bool(contract, "mask_ognl_values"),
        inherited: None,
    })
}

pub(crate) fn contract_attribute_to_state(attribute: &IdpAdapterAttribute) -> Dynamic {
    Dynamic::object([
        ("name", Dynamic::string(&attribute.name)),
        ("pseudonym", Dynamic::Bool(attribute.pseudonym.unwrap_or(false))),
        ("masked", Dynamic::Bool(attribute.masked.unwrap_or(false))),
    ])
}

fn contract_attributes_to_state<'a>(
    attributes: impl IntoIterator<Item = &'a IdpAdapterAttribute>,
) -> Dynamic {
    Dynamic::List(attributes.into_iter().map(contract_attribute_to_state).collect())
}

/// `core_attributes` only keeps the attributes the plan names, unless this is
/// an import read; `core_attributes_all` holds every one of them.
fn attribute_contract_to_state(
    contract: Option<&IdpAdapterAttributeContract>,
    planned_contract: &Dynamic,
    is_import_read: bool,
) -> Dynamic {
    let Some(contract) = contract else {
        return Dynamic::Null;
    };

    let planned_core = planned_contract
        .attr(CORE_ATTRIBUTES)
        .and_then(Dynamic::known)
        .and_then(|core| core.try_as_list().ok());
    let core = if is_import_read {
        contract_attributes_to_state(&contract.core_attributes)
    } else if let Some(planned_core) = planned_core {
        let names: Vec<&str> = planned_core
            .iter()
            .filter_map(|item| item.attr("name").and_then(Dynamic::as_str))
            .collect();
        contract_attributes_to_state(
            contract
                .core_attributes
                .iter()
                .filter(|a| names.contains(&a.name.as_str())),
        )
    } else {
        Dynamic::Null
    };

    Dynamic::object([
        (CORE_ATTRIBUTES, core),
        (
            CORE_ATTRIBUTES_ALL,
            contract_attributes_to_state(&contract.core_attributes),
        ),
        (
            EXTENDED_ATTRIBUTES,
            contract_attributes_to_state(&contract.extended_attributes),
        ),
        (
            "unique_user_key_attribute",
            Dynamic::optional_string(contract.unique_user_key_attribute.clone()),
        ),
        (
            "mask_ognl_values",
            Dynamic::Bool(contract.mask_ognl_values.unwrap_or(false)),
        ),
    ])
}

/// Builds resource state from an API response. `from_plan` supplies the
/// configuration values and the core attribute selection the server does
/// not echo back.
fn read_response(
    adapter: &IdpAdapter,
    from_plan: &DynamicValue,
    is_import_read: bool,
) -> (DynamicValue, Vec<Diagnostic>) {
    let (configuration, diagnostics) = plugin_configuration::to_state(
        from_plan.value.attr("configuration").unwrap_or(&Dynamic::Null),
        &adapter.configuration,
        is_import_read,
    );
    let state = Dynamic::object([
        ("id", Dynamic::string(&adapter.id)),
        (ID_ATTRIBUTE, Dynamic::string(&adapter.id)),
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
        ("configuration", configuration),
        (
            ATTRIBUTE_CONTRACT,
            attribute_contract_to_state(
                adapter.attribute_contract.as_ref(),
                from_plan.value.attr(ATTRIBUTE_CONTRACT).unwrap_or(&Dynamic::Null),
                is_import_read,
            ),
        ),
        (
            ATTRIBUTE_MAPPING,
            attribute_mapping::to_state(adapter.attribute_mapping.as_ref(), false),
        ),
    ]);
    (DynamicValue::new(state), diagnostics)
}

/// State after create or update, with the server's unplanned fulfillment
/// keys reported
fn apply_response(adapter: &IdpAdapter, planned: &DynamicValue) -> (DynamicValue, Vec<Diagnostic>) {
    let (state, mut diagnostics) = read_response(adapter, planned, false);
    diagnostics.extend(attribute_mapping::unexpected_fulfillments(
        planned.value.attr(ATTRIBUTE_MAPPING).unwrap_or(&Dynamic::Null),
        adapter.attribute_mapping.as_ref(),
    ));
    (state, diagnostics)
}

fn attr_mut<'a>(value: &'a mut Dynamic, name: &str) -> Option<&'a mut Dynamic> {
    match value {
        Dynamic::Map(attributes) => attributes.get_mut(name),
        _ => None,
    }
}

/// `core_attributes_all` follows the server once the planned core
/// attributes differ from state
fn plan_core_attributes_all(plan: &mut Dynamic, prior: &Dynamic) {
    let prior_contract = prior.attr(ATTRIBUTE_CONTRACT).unwrap_or(&Dynamic::Null);
    let Some(contract) = attr_mut(plan, ATTRIBUTE_CONTRACT) else {
        return;
    };
    if !matches!(contract, Dynamic::Map(_)) {
        return;
    }
    let core = contract.attr(CORE_ATTRIBUTES).unwrap_or(&Dynamic::Null);
    let prior_core = prior_contract.attr(CORE_ATTRIBUTES).unwrap_or(&Dynamic::Null);
    let changed = !core.set_equal(prior_core);
    if let Some(all) = attr_mut(contract, CORE_ATTRIBUTES_ALL) {
        if changed || all.is_null() {
            *all = Dynamic::Unknown;
        }
    }
}

fn contract_names(plan: &Dynamic) -> Vec<&str> {
    let contract = plan.attr(ATTRIBUTE_CONTRACT).unwrap_or(&Dynamic::Null);
    [CORE_ATTRIBUTES, EXTENDED_ATTRIBUTES]
        .into_iter()
        .filter_map(|name| contract.attr(name).and_then(|items| items.try_as_list().ok()))
        .flatten()
        .filter_map(|item| item.attr("name").and_then(Dynamic::as_str))
        .collect()
}

#[async_trait]
impl Resource for IdpAdapterResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: Self::schema_static().validate(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => return CreateResourceResponse::failed(vec![diag]),
        };
        let body = match Self::build_request(&request.planned_state) {
            Ok(body) => body,
            Err(diags) => return CreateResourceResponse::failed(diags),
        };

        tracing::debug!(adapter_id = %body.id, "creating idp adapter");
        match crate::api::call(&ctx, client.idp_adapters().create(&body)).await {
            Ok(adapter) => {
                let (new_state, diagnostics) = apply_response(&adapter, &request.planned_state);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => {
                tracing::error!(adapter_id = %body.id, "failed to create idp adapter: {}", e);
                CreateResourceResponse::failed(report_api_error(
                    "An error occurred while creating the IdpAdapter",
                    &e,
                    Some(ID_ATTRIBUTE),
                ))
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];
        let import_read = is_import_read(&request.private);

        let (client, adapter_id) = match self
            .client()
            .and_then(|client| Ok((client, string_from(&request.current_state, ID_ATTRIBUTE)?)))
        {
            Ok(found) => found,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        match crate::api::call(&ctx, client.idp_adapters().get(&adapter_id)).await {
            Ok(adapter) => {
                let (new_state, diags) =
                    read_response(&adapter, &request.current_state, import_read);
                diagnostics.extend(diags);
                let private = private_after_read(request.private, import_read, &mut diagnostics);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                    private,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(%adapter_id, "idp adapter no longer exists");
                diagnostics.push(resource_not_found_warning(DISPLAY_NAME));
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) => {
                diagnostics.extend(report_api_error(
                    "An error occurred while getting an IdpAdapter",
                    &e,
                    Some(ID_ATTRIBUTE),
                ));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => return UpdateResourceResponse::unchanged(request.prior_state, vec![diag]),
        };
        let body = match Self::build_request(&request.planned_state) {
            Ok(body) => body,
            Err(diags) => return UpdateResourceResponse::unchanged(request.prior_state, diags),
        };

        tracing::debug!(adapter_id = %body.id, "updating idp adapter");
        match crate::api::call(&ctx, client.idp_adapters().update(&body.id, &body)).await {
            Ok(adapter) => {
                let (new_state, diagnostics) = apply_response(&adapter, &request.planned_state);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => UpdateResourceResponse::unchanged(
                request.prior_state,
                report_api_error(
                    "An error occurred while updating IdpAdapter",
                    &e,
                    Some(ID_ATTRIBUTE),
                ),
            ),
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];
        let (client, adapter_id) = match self
            .client()
            .and_then(|client| Ok((client, string_from(&request.prior_state, ID_ATTRIBUTE)?)))
        {
            Ok(found) => found,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match crate::api::call(&ctx, client.idp_adapters().delete(&adapter_id)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(%adapter_id, "idp adapter already deleted");
            }
            Err(e) => diagnostics.extend(report_api_error(
                "An error occurred while deleting the IdP adapter",
                &e,
                Some(ID_ATTRIBUTE),
            )),
        }
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
impl ResourceWithConfigure for IdpAdapterResource {
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
impl ResourceWithModifyPlan for IdpAdapterResource {
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let prior_state = request.prior_state.value.clone();
        let mut response = modify_configuration_plan(request);
        if response.planned_state.is_null() {
            return response;
        }

        let plan = &mut response.planned_state.value;
        plan_core_attributes_all(plan, &prior_state);
        let mapping = plan.attr(ATTRIBUTE_MAPPING).unwrap_or(&Dynamic::Null);
        let missing = attribute_mapping::missing_fulfillments(mapping, &contract_names(plan));
        response.diagnostics.extend(missing);
        response
    }
}

#[async_trait]
impl ResourceWithImportState for IdpAdapterResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new(ID_ATTRIBUTE), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./idp_adapter_test.rs"]
mod idp_adapter_test;
