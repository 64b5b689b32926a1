//! `attribute_mapping` of adapters: how each contract attribute is fulfilled
//! and which issuance criteria a transaction must meet

use std::collections::{BTreeMap, HashMap, HashSet};
use tfplug::schema::Attribute;
use tfplug::types::{AttributePath, Diagnostic, Dynamic};
use tfplug::{AttributeBuilder, AttributeType, NestedType};

use crate::api::models::{
    AttributeFulfillmentValue, ConditionalIssuanceCriteriaEntry, ExpressionIssuanceCriteriaEntry,
    IdpAdapterContractMapping, IssuanceCriteria, SourceTypeIdKey,
};
use crate::diagnostics::INVALID_ATTRIBUTE_CONFIGURATION;

pub const ATTRIBUTE_MAPPING: &str = "attribute_mapping";
pub const FULFILLMENT: &str = "attribute_contract_fulfillment";
const ISSUANCE_CRITERIA: &str = "issuance_criteria";
const CONDITIONAL_CRITERIA: &str = "conditional_criteria";
const EXPRESSION_CRITERIA: &str = "expression_criteria";

fn string(name: &str, description: &str) -> AttributeBuilder {
    AttributeBuilder::new(name, AttributeType::String).description(description)
}

fn source_attribute() -> Attribute {
    AttributeBuilder::nested(
        "source",
        NestedType::single(vec![
            string("type", "The source type of this key, for example `ADAPTER`, `CONTEXT`, `EXPRESSION`, `TEXT` or `NO_MAPPING`.")
                .required()
                .build(),
            string("id", "The attribute source ID that refers to the attribute source that this key references. If the source type is not an attribute source then the ID can be omitted.")
                .optional()
                .build(),
        ]),
    )
    .description("The attribute value source.")
    .required()
    .build()
}

fn fulfillment_attribute() -> Attribute {
    AttributeBuilder::nested(
        FULFILLMENT,
        NestedType::map(vec![
            source_attribute(),
            string("value", "The value for this attribute.")
                .optional()
                .computed()
                .default(Dynamic::string(""))
                .build(),
        ]),
    )
    .description("Defines how an attribute in an attribute contract should be populated.")
    .optional()
    .computed()
    .default(Dynamic::Map(HashMap::new()))
    .build()
}

fn issuance_criteria_default() -> Dynamic {
    Dynamic::object([
        (CONDITIONAL_CRITERIA, Dynamic::List(vec![])),
        (EXPRESSION_CRITERIA, Dynamic::Null),
    ])
}

fn issuance_criteria_attribute() -> Attribute {
    let error_result = || {
        string("error_result", "The error result to return if this issuance criterion fails. This error result will show up in the PingFederate server logs.")
            .optional()
            .build()
    };
    let conditional = AttributeBuilder::nested(
        CONDITIONAL_CRITERIA,
        NestedType::list(vec![
            source_attribute(),
            string("attribute_name", "The name of the attribute to use in this issuance criterion.")
                .required()
                .build(),
            string("condition", "The condition that will be applied to the source attribute's value and the expected value, for example `EQUALS` or `MULTIVALUE_CONTAINS`.")
                .required()
                .build(),
            string("value", "The expected value of this issuance criterion.")
                .required()
                .build(),
            error_result(),
        ]),
    )
    .description("A list of conditional issuance criteria where existing attributes must satisfy their conditions against expected values in order for the transaction to continue.")
    .optional()
    .computed()
    .default(Dynamic::List(vec![]))
    .build();
    let expression = AttributeBuilder::nested(
        EXPRESSION_CRITERIA,
        NestedType::list(vec![
            string("expression", "The OGNL expression to evaluate.")
                .required()
                .build(),
            error_result(),
        ]),
    )
    .description("A list of expression issuance criteria where the OGNL expressions must evaluate to true in order for the transaction to continue.")
    .optional()
    .build();

    AttributeBuilder::nested(ISSUANCE_CRITERIA, NestedType::single(vec![conditional, expression]))
        .description("The issuance criteria that this transaction must meet before the corresponding attribute contract is fulfilled.")
        .optional()
        .computed()
        .default(issuance_criteria_default())
        .build()
}

pub fn resource_attribute() -> Attribute {
    AttributeBuilder::nested(
        ATTRIBUTE_MAPPING,
        NestedType::single(vec![fulfillment_attribute(), issuance_criteria_attribute()]),
    )
    .description("The attributes mapping from attribute sources to attribute targets.")
    .required()
    .build()
}

fn known_str(value: &Dynamic, name: &str) -> Option<String> {
    value
        .attr(name)
        .and_then(Dynamic::known)
        .and_then(Dynamic::as_str)
        .map(str::to_string)
}

fn known_list<'a>(value: &'a Dynamic, name: &str) -> &'a [Dynamic] {
    value
        .attr(name)
        .map(|v| v.try_as_list().unwrap_or_default())
        .unwrap_or_default()
}

fn source_from(value: &Dynamic) -> SourceTypeIdKey {
    let source = value.attr("source").unwrap_or(&Dynamic::Null);
    SourceTypeIdKey {
        source_type: known_str(source, "type").unwrap_or_default(),
        id: known_str(source, "id"),
    }
}

fn source_to_state(source: &SourceTypeIdKey) -> Dynamic {
    Dynamic::object([
        ("type", Dynamic::string(&source.source_type)),
        ("id", Dynamic::optional_string(source.id.clone())),
    ])
}

/// Builds the request mapping from a planned `attribute_mapping`
pub fn to_client_struct(mapping: &Dynamic) -> Option<IdpAdapterContractMapping> {
    let mapping = mapping.known()?;

    let attribute_contract_fulfillment: BTreeMap<String, AttributeFulfillmentValue> = mapping
        .attr(FULFILLMENT)
        .and_then(|f| f.try_as_map().ok())
        .map(|entries| {
            entries
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        AttributeFulfillmentValue {
                            source: source_from(entry),
                            value: known_str(entry, "value").unwrap_or_default(),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let issuance_criteria = mapping
        .attr(ISSUANCE_CRITERIA)
        .and_then(Dynamic::known)
        .map(|criteria| IssuanceCriteria {
            conditional_criteria: known_list(criteria, CONDITIONAL_CRITERIA)
                .iter()
                .map(|entry| ConditionalIssuanceCriteriaEntry {
                    source: source_from(entry),
                    attribute_name: known_str(entry, "attribute_name").unwrap_or_default(),
                    condition: known_str(entry, "condition").unwrap_or_default(),
                    value: known_str(entry, "value").unwrap_or_default(),
                    error_result: known_str(entry, "error_result"),
                })
                .collect(),
            expression_criteria: known_list(criteria, EXPRESSION_CRITERIA)
                .iter()
                .map(|entry| ExpressionIssuanceCriteriaEntry {
                    expression: known_str(entry, "expression").unwrap_or_default(),
                    error_result: known_str(entry, "error_result"),
                })
                .collect(),
        });

    Some(IdpAdapterContractMapping {
        attribute_sources: vec![],
        attribute_contract_fulfillment,
        issuance_criteria,
        inherited: None,
    })
}

fn issuance_criteria_to_state(criteria: Option<&IssuanceCriteria>) -> Dynamic {
    let Some(criteria) = criteria else {
        return issuance_criteria_default();
    };
    let conditional = criteria
        .conditional_criteria
        .iter()
        .map(|entry| {
            Dynamic::object([
                ("source", source_to_state(&entry.source)),
                ("attribute_name", Dynamic::string(&entry.attribute_name)),
                ("condition", Dynamic::string(&entry.condition)),
                ("value", Dynamic::string(&entry.value)),
                ("error_result", Dynamic::optional_string(entry.error_result.clone())),
            ])
        })
        .collect();
    let expression = if criteria.expression_criteria.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::List(
            criteria
                .expression_criteria
                .iter()
                .map(|entry| {
                    Dynamic::object([
                        ("expression", Dynamic::string(&entry.expression)),
                        ("error_result", Dynamic::optional_string(entry.error_result.clone())),
                    ])
                })
                .collect(),
        )
    };
    Dynamic::object([
        (CONDITIONAL_CRITERIA, Dynamic::List(conditional)),
        (EXPRESSION_CRITERIA, expression),
    ])
}

/// State for `attribute_mapping`; the data source view adds `inherited`
pub fn to_state(mapping: Option<&IdpAdapterContractMapping>, with_inherited: bool) -> Dynamic {
    let Some(mapping) = mapping else {
        return Dynamic::Null;
    };
    let fulfillment = mapping
        .attribute_contract_fulfillment
        .iter()
        .map(|(key, entry)| {
            (
                key.clone(),
                Dynamic::object([
                    ("source", source_to_state(&entry.source)),
                    ("value", Dynamic::string(&entry.value)),
                ]),
            )
        })
        .collect();

    let mut state = HashMap::from([
        (FULFILLMENT.to_string(), Dynamic::Map(fulfillment)),
        (
            ISSUANCE_CRITERIA.to_string(),
            issuance_criteria_to_state(mapping.issuance_criteria.as_ref()),
        ),
    ]);
    if with_inherited {
        state.insert("inherited".to_string(), Dynamic::optional_bool(mapping.inherited));
    }
    Dynamic::Map(state)
}

fn fulfillment_path() -> AttributePath {
    AttributePath::new(ATTRIBUTE_MAPPING).attribute(FULFILLMENT)
}

/// Every named contract attribute must have a fulfillment entry. Nothing is
/// reported while the fulfillment map is unknown.
pub fn missing_fulfillments(mapping: &Dynamic, contract_names: &[&str]) -> Vec<Diagnostic> {
    let Some(Dynamic::Map(fulfillment)) = mapping.attr(FULFILLMENT) else {
        return vec![];
    };
    contract_names
        .iter()
        .filter(|name| !name.is_empty() && !fulfillment.contains_key(**name))
        .map(|name| {
            Diagnostic::error(
                INVALID_ATTRIBUTE_CONFIGURATION,
                format!(
                    "attribute_contract_fulfillment must include all core and extended attributes. Missing attribute: {}",
                    name
                ),
            )
            .with_attribute(fulfillment_path())
        })
        .collect()
}

/// Fulfillment keys the server returned that the plan did not ask for
pub fn unexpected_fulfillments(
    planned_mapping: &Dynamic,
    mapping: Option<&IdpAdapterContractMapping>,
) -> Vec<Diagnostic> {
    let (Some(Dynamic::Map(planned)), Some(mapping)) = (planned_mapping.attr(FULFILLMENT), mapping)
    else {
        return vec![];
    };
    let planned: HashSet<&str> = planned.keys().map(String::as_str).collect();
    mapping
        .attribute_contract_fulfillment
        .keys()
        .filter(|key| !planned.contains(key.as_str()))
        .map(|key| {
            Diagnostic::error(
                INVALID_ATTRIBUTE_CONFIGURATION,
                format!(
                    "Unexpected attribute_contract_fulfillment key {} found in the response from PingFederate. Ensure this key is included in your configured attribute_contract_fulfillment.",
                    key
                ),
            )
            .with_attribute(fulfillment_path())
        })
        .collect()
}
