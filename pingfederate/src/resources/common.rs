//! Pieces shared by the plugin instance resources

use regex::Regex;
use std::any::Any;
use std::sync::Arc;
use tfplug::import::clear_import_read;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{ModifyPlanRequest, ModifyPlanResponse};
use tfplug::schema::Attribute;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringPatternValidator;
use tfplug::{AttributeBuilder, AttributeType, NestedType};

use crate::api::models::ResourceLink;
use crate::diagnostics::internal_error;
use crate::plugin_configuration;
use crate::PingFederateProviderData;

const PLUGIN_ID_PATTERN: &str = r"^[a-zA-Z0-9_]{1,32}$";

/// Extracts the provider data handed to `configure`
pub fn provider_data_from(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<PingFederateProviderData> {
    let Some(data) = provider_data else {
        diagnostics.push(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        ));
        return None;
    };
    match data.downcast_ref::<PingFederateProviderData>() {
        Some(provider_data) => Some(provider_data.clone()),
        None => {
            diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Failed to extract PingFederateProviderData from provider data",
            ));
            None
        }
    }
}

pub fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Computed `id`, mirroring the user supplied id attribute
pub fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("The ID of this resource.")
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

/// The user supplied plugin instance id; changing it replaces the instance
pub fn plugin_id_attribute(name: &str) -> Attribute {
    let pattern = Regex::new(PLUGIN_ID_PATTERN).expect("plugin id pattern is valid");
    AttributeBuilder::new(name, AttributeType::String)
        .description("The ID of the plugin instance. This field is immutable and will trigger a replacement plan if changed. Must be less than 33 characters, contain no spaces, and be alphanumeric.")
        .required()
        .plan_modifier(RequiresReplace::create())
        .validator(StringPatternValidator::create(
            pattern,
            "must be 1-32 characters of letters, digits or underscores",
        ))
        .build()
}

fn resource_link_attributes() -> Vec<Attribute> {
    vec![AttributeBuilder::new("id", AttributeType::String)
        .description("The ID of the resource.")
        .required()
        .build()]
}

pub fn plugin_descriptor_ref_attribute() -> Attribute {
    AttributeBuilder::nested(
        "plugin_descriptor_ref",
        NestedType::single(resource_link_attributes()),
    )
    .description("Reference to the plugin descriptor for this instance. The plugin descriptor cannot be modified once the instance is created.")
    .required()
    .plan_modifier(RequiresReplace::create())
    .build()
}

pub fn parent_ref_attribute() -> Attribute {
    AttributeBuilder::nested("parent_ref", NestedType::single(resource_link_attributes()))
        .description("The reference to this plugin's parent instance. The parent reference is only accepted if the plugin type supports parent instances.")
        .optional()
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

pub fn resource_link_to_state(link: Option<&ResourceLink>) -> Dynamic {
    match link {
        Some(link) => Dynamic::object([("id", Dynamic::string(&link.id))]),
        None => Dynamic::Null,
    }
}

/// Reads an optional `{id}` object; null or unknown yields `None`
pub fn resource_link_from(
    value: &DynamicValue,
    attribute: &str,
) -> Result<Option<ResourceLink>, Diagnostic> {
    let link = match value.value.attr(attribute).and_then(Dynamic::known) {
        Some(link) => link,
        None => return Ok(None),
    };
    let id = link
        .attr("id")
        .and_then(Dynamic::known)
        .map(|id| id.try_as_str().map(str::to_string))
        .transpose()
        .map_err(|e| {
            internal_error(format!(
                "Failed to build {} request object: {}",
                attribute, e
            ))
        })?;
    Ok(id.map(ResourceLink::new))
}

/// Private state to keep after a read; an import marker is dropped once the
/// import read has happened
pub fn private_after_read(
    private: Vec<u8>,
    import_read: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<u8> {
    if !import_read {
        return private;
    }
    match clear_import_read(&private) {
        Ok(cleared) => cleared,
        Err(diag) => {
            diagnostics.push(diag);
            private
        }
    }
}

pub fn string_from(value: &DynamicValue, attribute: &str) -> Result<String, Diagnostic> {
    value
        .get_string(&AttributePath::new(attribute))
        .map_err(|e| {
            internal_error(format!("Failed to read {}: {}", attribute, e))
                .with_attribute(AttributePath::new(attribute))
        })
}

/// Plans the configuration attribute: on create both computed attributes
/// become unknown, on update only when what they summarize has changed.
/// Unset encrypted values are planned from state or left to the server.
pub fn modify_configuration_plan(request: ModifyPlanRequest) -> ModifyPlanResponse {
    let mut planned_state = request.proposed_new_state;

    if !planned_state.is_null() {
        let state_configuration = request
            .prior_state
            .value
            .attr("configuration")
            .cloned()
            .unwrap_or(Dynamic::Null);

        if let Dynamic::Map(attributes) = &mut planned_state.value {
            if let Some(configuration) = attributes.get_mut("configuration") {
                plugin_configuration::plan_encrypted_values(configuration, &state_configuration);
                if request.prior_state.is_null() {
                    plugin_configuration::mark_computed_attrs_unknown(configuration);
                } else {
                    plugin_configuration::use_state_for_computed_attrs(
                        configuration,
                        &state_configuration,
                    );
                    plugin_configuration::mark_computed_attrs_unknown_on_change(
                        configuration,
                        &state_configuration,
                    );
                }
            }
        }
    }

    ModifyPlanResponse {
        planned_state,
        requires_replace: vec![],
        planned_private: request.prior_private,
        diagnostics: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modify_plan_request(prior_state: DynamicValue, proposed: DynamicValue) -> ModifyPlanRequest {
        ModifyPlanRequest {
            type_name: "pingfederate_secret_manager".to_string(),
            config: proposed.clone(),
            prior_state,
            proposed_new_state: proposed,
            prior_private: vec![],
            provider_meta: None,
        }
    }

    fn configuration(value: &str) -> Dynamic {
        let fields = Dynamic::List(vec![Dynamic::object([
            ("name", Dynamic::string("Key")),
            ("value", Dynamic::string(value)),
        ])]);
        Dynamic::object([
            ("fields", fields.clone()),
            ("sensitive_fields", Dynamic::List(vec![])),
            ("fields_all", fields),
            ("tables", Dynamic::List(vec![])),
            ("tables_all", Dynamic::List(vec![])),
        ])
    }

    #[test]
    fn create_marks_configuration_computed_unknown() {
        let proposed = DynamicValue::new(Dynamic::object([("configuration", configuration("a"))]));
        let response = modify_configuration_plan(modify_plan_request(DynamicValue::null(), proposed));
        let configuration = response.planned_state.value.attr("configuration").unwrap();
        assert_eq!(configuration.attr("fields_all"), Some(&Dynamic::Unknown));
        assert_eq!(configuration.attr("tables_all"), Some(&Dynamic::Unknown));
    }

    #[test]
    fn update_only_marks_changed_attributes() {
        let state = DynamicValue::new(Dynamic::object([("configuration", configuration("a"))]));
        let proposed = DynamicValue::new(Dynamic::object([("configuration", configuration("b"))]));
        let response = modify_configuration_plan(modify_plan_request(state, proposed));
        let configuration = response.planned_state.value.attr("configuration").unwrap();
        assert_eq!(configuration.attr("fields_all"), Some(&Dynamic::Unknown));
        assert_eq!(configuration.attr("tables_all"), Some(&Dynamic::List(vec![])));
    }

    fn with_secret(mut configuration: Dynamic, value: &str, encrypted: Dynamic) -> Dynamic {
        if let Dynamic::Map(attributes) = &mut configuration {
            attributes.insert(
                "sensitive_fields".to_string(),
                Dynamic::List(vec![Dynamic::object([
                    ("name", Dynamic::string("Secret")),
                    ("value", Dynamic::string(value)),
                    ("encrypted_value", encrypted),
                ])]),
            );
        }
        configuration
    }

    fn planned_encrypted_value(response: &ModifyPlanResponse) -> Dynamic {
        response
            .planned_state
            .get(
                &AttributePath::new("configuration")
                    .attribute("sensitive_fields")
                    .index(0)
                    .attribute("encrypted_value"),
            )
            .cloned()
            .unwrap()
    }

    #[test]
    fn unchanged_secret_keeps_encrypted_value_from_state() {
        let state = DynamicValue::new(Dynamic::object([(
            "configuration",
            with_secret(configuration("a"), "s3cret", Dynamic::string("OBF:JWE:abc")),
        )]));
        let proposed = DynamicValue::new(Dynamic::object([(
            "configuration",
            with_secret(configuration("a"), "s3cret", Dynamic::Null),
        )]));
        let response = modify_configuration_plan(modify_plan_request(state.clone(), proposed));
        assert_eq!(response.planned_state, state);
    }

    #[test]
    fn new_or_changed_secret_has_unknown_encrypted_value() {
        let proposed = DynamicValue::new(Dynamic::object([(
            "configuration",
            with_secret(configuration("a"), "s3cret", Dynamic::Null),
        )]));
        let created =
            modify_configuration_plan(modify_plan_request(DynamicValue::null(), proposed));
        assert_eq!(planned_encrypted_value(&created), Dynamic::Unknown);

        let state = DynamicValue::new(Dynamic::object([(
            "configuration",
            with_secret(configuration("a"), "s3cret", Dynamic::string("OBF:JWE:abc")),
        )]));
        let proposed = DynamicValue::new(Dynamic::object([(
            "configuration",
            with_secret(configuration("a"), "rotated", Dynamic::Null),
        )]));
        let updated = modify_configuration_plan(modify_plan_request(state, proposed));
        assert_eq!(planned_encrypted_value(&updated), Dynamic::Unknown);
    }

    #[test]
    fn import_marker_is_cleared_after_read() {
        let marked = tfplug::import::mark_import_read(tfplug::PrivateStateData::new()).unwrap();
        let mut diagnostics = vec![];

        let cleared = private_after_read(marked, true, &mut diagnostics);
        assert!(!tfplug::is_import_read(&cleared));
        assert!(diagnostics.is_empty());

        let kept = private_after_read(b"garbage".to_vec(), true, &mut diagnostics);
        assert_eq!(kept, b"garbage".to_vec());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn parent_ref_is_optional_and_computed() {
        let attribute = parent_ref_attribute();
        assert!(attribute.optional);
        assert!(attribute.computed);
        assert!(!attribute.required);
        assert_eq!(attribute.plan_modifiers.len(), 1);
    }

    #[test]
    fn destroy_plan_is_untouched() {
        let state = DynamicValue::new(Dynamic::object([("configuration", configuration("a"))]));
        let response = modify_configuration_plan(modify_plan_request(state, DynamicValue::null()));
        assert!(response.planned_state.is_null());
    }

    #[test]
    fn resource_links() {
        let value = DynamicValue::new(Dynamic::object([
            ("parent_ref", Dynamic::object([("id", Dynamic::string("parent"))])),
            ("missing_ref", Dynamic::Null),
        ]));
        assert_eq!(
            resource_link_from(&value, "parent_ref").unwrap(),
            Some(ResourceLink::new("parent"))
        );
        assert_eq!(resource_link_from(&value, "missing_ref").unwrap(), None);
        assert_eq!(resource_link_to_state(None), Dynamic::Null);
    }

    #[test]
    fn plugin_id_pattern() {
        let attribute = plugin_id_attribute("validator_id");
        let validate = |id: &str| {
            attribute.validators[0]
                .validate(tfplug::schema::ValidatorRequest {
                    config_value: Dynamic::string(id),
                    path: AttributePath::new("validator_id"),
                })
                .diagnostics
        };
        assert!(validate("simple_pcv1").is_empty());
        assert_eq!(validate("has space").len(), 1);
        assert_eq!(validate(&"a".repeat(33)).len(), 1);
    }
}
