//! Password credential validator resource implementation

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

use super::common::{
    id_attribute, modify_configuration_plan, not_configured, parent_ref_attribute,
    plugin_descriptor_ref_attribute, plugin_id_attribute, private_after_read, provider_data_from,
    resource_link_from, resource_link_to_state, string_from,
};
use crate::api::models::{
    ContractAttribute, PasswordCredentialValidator, PasswordCredentialValidatorAttributeContract,
};
use crate::diagnostics::{
    internal_error, report_api_error, resource_not_found_warning,
    INVALID_ATTRIBUTE_CONFIGURATION,
};
use crate::plugin_configuration;
use crate::PingFederateProviderData;

const TYPE_NAME: &str = "pingfederate_password_credential_validator";
const ID_ATTRIBUTE: &str = "validator_id";
const DISPLAY_NAME: &str = "Password Credential Validator";

const SIMPLE_USERNAME_PASSWORD: &str = "org.sourceid.saml20.domain.SimpleUsernamePasswordCredentialValidator";
const RADIUS_USERNAME_PASSWORD: &str = "org.sourceid.saml20.domain.RadiusUsernamePasswordCredentialValidator";

/// Top-level fields each known plugin type cannot work without
const REQUIRED_FIELDS: &[(&str, &str, &[&str])] = &[
    (
        "com.pingconnect.alexandria.pingfed.pcv.PingOnePasswordValidator",
        "PingOne for Enterprise Directory",
        &["Client Id", "Client Secret"],
    ),
    (
        "com.pingidentity.plugins.pcvs.p14c.PingOneForCustomersPCV",
        "PingOne",
        &["PingOne For Customers Datastore"],
    ),
    (
        "com.pingidentity.plugins.pcvs.pingid.PingIdPCV",
        "PingID",
        &["Authentication During Errors"],
    ),
    (
        "org.sourceid.saml20.domain.LDAPUsernamePasswordCredentialValidator",
        "LDAP Username",
        &["LDAP Datastore", "Search Base", "Search Filter"],
    ),
];

const USERS_TABLE_FIELDS: [&str; 3] = ["Username", "Password", "Confirm Password"];

#[derive(Default)]
pub struct PasswordCredentialValidatorResource {
    provider_data: Option<PingFederateProviderData>,
}

impl PasswordCredentialValidatorResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a password credential validator plugin instance.")
            .attribute(id_attribute())
            .attribute(plugin_id_attribute(ID_ATTRIBUTE))
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
            .attribute(attribute_contract_attribute())
            .build()
    }

    fn build_request(plan: &DynamicValue) -> Result<PasswordCredentialValidator, Vec<Diagnostic>> {
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

        Ok(PasswordCredentialValidator {
            id,
            name,
            plugin_descriptor_ref,
            parent_ref,
            configuration,
            attribute_contract: attribute_contract_from(plan),
        })
    }

    fn client(&self) -> Result<&crate::api::Client, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| data.client.as_ref())
            .ok_or_else(not_configured)
    }
}

fn contract_attributes(name: &str, description: &str, extended: bool) -> Attribute {
    let attribute_name = if extended {
        AttributeBuilder::new("name", AttributeType::String)
            .description("The name of this attribute.")
            .required()
            .validator(StringLengthValidator::at_least(1))
            .build()
    } else {
        AttributeBuilder::new("name", AttributeType::String)
            .description("The name of this attribute.")
            .computed()
            .build()
    };
    let builder = AttributeBuilder::nested(name, NestedType::set(vec![attribute_name]))
        .description(description)
        .computed();
    if extended {
        builder.optional().default(Dynamic::List(vec![])).build()
    } else {
        builder.plan_modifier(UseStateForUnknown::create()).build()
    }
}

fn attribute_contract_attribute() -> Attribute {
    AttributeBuilder::nested(
        "attribute_contract",
        NestedType::single(vec![
            contract_attributes(
                "core_attributes",
                "A list of read-only attributes that are automatically populated by the password credential validator descriptor.",
                false,
            ),
            contract_attributes(
                "extended_attributes",
                "A list of additional attributes that can be returned by the password credential validator. The extended attributes are only used if the adapter supports them.",
                true,
            ),
        ]),
    )
    .description("The list of attributes that the password credential validator provides.")
    .optional()
    .computed()
    .plan_modifier(UseStateForUnknown::create())
    .build()
}

fn contract_names(value: Option<&Dynamic>) -> Option<Vec<ContractAttribute>> {
    let items = value.and_then(Dynamic::known)?.try_as_list().ok()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.attr("name").and_then(Dynamic::as_str))
            .map(|name| ContractAttribute {
                name: name.to_string(),
            })
            .collect(),
    )
}

fn attribute_contract_from(plan: &DynamicValue) -> Option<PasswordCredentialValidatorAttributeContract> {
    let contract = plan.value.attr("attribute_contract").and_then(Dynamic::known)?;
    Some(PasswordCredentialValidatorAttributeContract {
        core_attributes: contract_names(contract.attr("core_attributes")).unwrap_or_default(),
        extended_attributes: contract_names(contract.attr("extended_attributes"))
            .unwrap_or_default(),
        inherited: None,
    })
}

fn contract_to_state(attributes: &[ContractAttribute]) -> Dynamic {
    Dynamic::List(
        attributes
            .iter()
            .map(|a| Dynamic::object([("name", Dynamic::string(&a.name))]))
            .collect(),
    )
}

pub(crate) fn attribute_contract_to_state(
    contract: Option<&PasswordCredentialValidatorAttributeContract>,
) -> Dynamic {
    match contract {
        Some(contract) => Dynamic::object([
            ("core_attributes", contract_to_state(&contract.core_attributes)),
            (
                "extended_attributes",
                contract_to_state(&contract.extended_attributes),
            ),
        ]),
        None => Dynamic::Null,
    }
}

/// Builds resource state from an API response. `configuration_from_plan`
/// supplies the values the server does not echo back.
fn read_response(
    validator: &PasswordCredentialValidator,
    configuration_from_plan: &Dynamic,
    is_import_read: bool,
) -> (DynamicValue, Vec<Diagnostic>) {
    let (configuration, diagnostics) = plugin_configuration::to_state(
        configuration_from_plan,
        &validator.configuration,
        is_import_read,
    );
    let state = Dynamic::object([
        ("id", Dynamic::string(&validator.id)),
        (ID_ATTRIBUTE, Dynamic::string(&validator.id)),
        ("name", Dynamic::string(&validator.name)),
        (
            "plugin_descriptor_ref",
            resource_link_to_state(Some(&validator.plugin_descriptor_ref)),
        ),
        (
            "parent_ref",
            resource_link_to_state(validator.parent_ref.as_ref()),
        ),
        ("configuration", configuration),
        (
            "attribute_contract",
            attribute_contract_to_state(validator.attribute_contract.as_ref()),
        ),
    ]);
    (DynamicValue::new(state), diagnostics)
}

fn names_in(fields: Option<&Dynamic>) -> Option<Vec<&str>> {
    match fields {
        Some(Dynamic::Unknown) => None,
        Some(Dynamic::List(items)) => items
            .iter()
            .map(|item| item.attr("name").and_then(Dynamic::as_str))
            .collect(),
        _ => Some(Vec::new()),
    }
}

fn tables_error(detail: String) -> Diagnostic {
    Diagnostic::error(INVALID_ATTRIBUTE_CONFIGURATION, detail)
        .with_attribute(AttributePath::new("configuration").attribute("tables"))
}

/// Checks the fields and tables that known plugin types require. Anything
/// not yet known is assumed to satisfy the requirement.
pub fn validate_plugin_requirements(config: &Dynamic) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let configuration = config.attr("configuration").unwrap_or(&Dynamic::Null);
    let descriptor = config.attr("plugin_descriptor_ref").unwrap_or(&Dynamic::Null);
    if configuration.is_unknown() || descriptor.is_unknown() {
        return diagnostics;
    }
    let plugin_id = descriptor
        .attr("id")
        .and_then(Dynamic::as_str)
        .unwrap_or_default();

    if plugin_id == SIMPLE_USERNAME_PASSWORD || plugin_id == RADIUS_USERNAME_PASSWORD {
        let tables = configuration.attr("tables").unwrap_or(&Dynamic::Null);
        let mut tables_known = !tables.is_unknown();
        let mut radius_servers_found = false;

        for table in tables.try_as_list().unwrap_or_default() {
            let Some(name) = table.attr("name").and_then(Dynamic::known) else {
                tables_known = false;
                continue;
            };
            let name = name.as_str().unwrap_or_default();
            radius_servers_found |= name == "RADIUS Servers";
            if name != "Users" || plugin_id != SIMPLE_USERNAME_PASSWORD {
                continue;
            }

            let rows = table.attr("rows").unwrap_or(&Dynamic::Null);
            for (idx, row) in rows.try_as_list().unwrap_or_default().iter().enumerate() {
                let cleartext = names_in(row.attr("fields"));
                let sensitive = names_in(row.attr("sensitive_fields"));
                let (Some(cleartext), Some(sensitive)) = (cleartext, sensitive) else {
                    continue;
                };
                for required in USERS_TABLE_FIELDS {
                    if !cleartext.contains(&required) && !sensitive.contains(&required) {
                        diagnostics.push(tables_error(format!(
                            "The \"{}\" field is required in the Users table for the Simple Username Password Credential Validator.\nMissing from row index {} in Users table",
                            required, idx
                        )));
                    }
                }
            }
        }

        if plugin_id == RADIUS_USERNAME_PASSWORD && tables_known && !radius_servers_found {
            diagnostics.push(tables_error(
                "At least one \"RADIUS Servers\" table is required for the RADIUS Username Password Credential Validator".to_string(),
            ));
        }
    }

    let Some((_, display_name, required_fields)) =
        REQUIRED_FIELDS.iter().find(|(id, _, _)| *id == plugin_id)
    else {
        return diagnostics;
    };
    let (Some(cleartext), Some(sensitive)) = (
        names_in(configuration.attr("fields")),
        names_in(configuration.attr("sensitive_fields")),
    ) else {
        return diagnostics;
    };
    for required in required_fields.iter() {
        if !cleartext.contains(required) && !sensitive.contains(required) {
            diagnostics.push(
                Diagnostic::error(
                    INVALID_ATTRIBUTE_CONFIGURATION,
                    format!(
                        "The \"{}\" field is required for the {} Password Credential Validator",
                        required, display_name
                    ),
                )
                .with_attribute(AttributePath::new("configuration").attribute("fields")),
            );
        }
    }

    diagnostics
}

#[async_trait]
impl Resource for PasswordCredentialValidatorResource {
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
        let mut diagnostics = Self::schema_static().validate(&request.config);
        diagnostics.extend(validate_plugin_requirements(&request.config.value));
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => return CreateResourceResponse::failed(vec![diag]),
        };

        let body = match Self::build_request(&request.planned_state) {
            Ok(body) => body,
            Err(diags) => return CreateResourceResponse::failed(diags),
        };

        tracing::debug!(validator_id = %body.id, "creating password credential validator");
        let created =
            crate::api::call(&ctx, client.password_credential_validators().create(&body)).await;

        match created {
            Ok(validator) => {
                let configuration = request
                    .planned_state
                    .value
                    .attr("configuration")
                    .unwrap_or(&Dynamic::Null);
                let (new_state, diags) = read_response(&validator, configuration, false);
                diagnostics.extend(diags);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => {
                tracing::error!(validator_id = %body.id, "failed to create password credential validator: {}", e);
                diagnostics.extend(report_api_error(
                    "An error occurred while creating a Password Credential Validator",
                    &e,
                    Some(ID_ATTRIBUTE),
                ));
                CreateResourceResponse::failed(diagnostics)
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];
        let import_read = is_import_read(&request.private);

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let validator_id = match string_from(&request.current_state, ID_ATTRIBUTE) {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let fetched = crate::api::call(
            &ctx,
            client.password_credential_validators().get(&validator_id),
        )
        .await;

        match fetched {
            Ok(validator) => {
                let configuration = request
                    .current_state
                    .value
                    .attr("configuration")
                    .unwrap_or(&Dynamic::Null);
                let (new_state, diags) = read_response(&validator, configuration, import_read);
                diagnostics.extend(diags);
                let private = private_after_read(request.private, import_read, &mut diagnostics);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                    private,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(%validator_id, "password credential validator no longer exists");
                diagnostics.push(resource_not_found_warning(DISPLAY_NAME));
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) => {
                diagnostics.extend(report_api_error(
                    "An error occurred while getting a Password Credential Validator",
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
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => return UpdateResourceResponse::unchanged(request.prior_state, vec![diag]),
        };

        let body = match Self::build_request(&request.planned_state) {
            Ok(body) => body,
            Err(diags) => return UpdateResourceResponse::unchanged(request.prior_state, diags),
        };

        tracing::debug!(validator_id = %body.id, "updating password credential validator");
        let updated = crate::api::call(
            &ctx,
            client
                .password_credential_validators()
                .update(&body.id, &body),
        )
        .await;

        match updated {
            Ok(validator) => {
                let configuration = request
                    .planned_state
                    .value
                    .attr("configuration")
                    .unwrap_or(&Dynamic::Null);
                let (new_state, diags) = read_response(&validator, configuration, false);
                diagnostics.extend(diags);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.extend(report_api_error(
                    "An error occurred while updating a Password Credential Validator",
                    &e,
                    Some(ID_ATTRIBUTE),
                ));
                UpdateResourceResponse::unchanged(request.prior_state, diagnostics)
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let validator_id = match string_from(&request.prior_state, ID_ATTRIBUTE) {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let deleted = crate::api::call(
            &ctx,
            client.password_credential_validators().delete(&validator_id),
        )
        .await;

        match deleted {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(%validator_id, "password credential validator already deleted");
            }
            Err(e) => diagnostics.extend(report_api_error(
                "An error occurred while deleting a Password Credential Validator",
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
impl ResourceWithConfigure for PasswordCredentialValidatorResource {
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
impl ResourceWithModifyPlan for PasswordCredentialValidatorResource {
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        modify_configuration_plan(request)
    }
}

#[async_trait]
impl ResourceWithImportState for PasswordCredentialValidatorResource {
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
#[path = "./password_credential_validator_test.rs"]
mod password_credential_validator_test;
