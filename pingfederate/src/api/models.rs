//! Wire types shared by PingFederate plugin endpoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single configuration field. Sensitive fields come back from the server
/// with `encrypted_value` set and no cleartext `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited: Option<bool>,
}

impl ConfigField {
    pub fn cleartext(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// True when the server returned a non-empty encrypted value
    pub fn is_encrypted(&self) -> bool {
        self.encrypted_value
            .as_deref()
            .is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRow {
    #[serde(default)]
    pub fields: Vec<ConfigField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_row: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigTable {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<ConfigRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfiguration {
    #[serde(default)]
    pub fields: Vec<ConfigField>,
    #[serde(default)]
    pub tables: Vec<ConfigTable>,
}

/// Reference to another configuration object by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ResourceLink {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractAttribute {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredentialValidatorAttributeContract {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub core_attributes: Vec<ContractAttribute>,
    #[serde(default)]
    pub extended_attributes: Vec<ContractAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredentialValidator {
    pub id: String,
    pub name: String,
    pub plugin_descriptor_ref: ResourceLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<ResourceLink>,
    #[serde(default)]
    pub configuration: PluginConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_contract: Option<PasswordCredentialValidatorAttributeContract>,
}

/// Shape shared by notification publishers, secret managers and captcha
/// providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInstance {
    pub id: String,
    pub name: String,
    pub plugin_descriptor_ref: ResourceLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<ResourceLink>,
    #[serde(default)]
    pub configuration: PluginConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdpAdapterAttribute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudonym: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpAdapterAttributeContract {
    #[serde(default)]
    pub core_attributes: Vec<IdpAdapterAttribute>,
    #[serde(default)]
    pub extended_attributes: Vec<IdpAdapterAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_user_key_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_ognl_values: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited: Option<bool>,
}

/// Where a fulfilled or tested attribute value comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTypeIdKey {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeFulfillmentValue {
    pub source: SourceTypeIdKey,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalIssuanceCriteriaEntry {
    pub source: SourceTypeIdKey,
    pub attribute_name: String,
    pub condition: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionIssuanceCriteriaEntry {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceCriteria {
    #[serde(default)]
    pub conditional_criteria: Vec<ConditionalIssuanceCriteriaEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression_criteria: Vec<ExpressionIssuanceCriteriaEntry>,
}

/// Data store lookups are not managed, so requests carry an empty
/// `attributeSources` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpAdapterContractMapping {
    #[serde(default)]
    pub attribute_sources: Vec<serde_json::Value>,
    #[serde(default)]
    pub attribute_contract_fulfillment: BTreeMap<String, AttributeFulfillmentValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_criteria: Option<IssuanceCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpAdapter {
    pub id: String,
    pub name: String,
    pub plugin_descriptor_ref: ResourceLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<ResourceLink>,
    #[serde(default)]
    pub configuration: PluginConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_ctx_class_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_contract: Option<IdpAdapterAttributeContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_mapping: Option<IdpAdapterContractMapping>,
}
