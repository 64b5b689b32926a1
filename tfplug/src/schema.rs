//! Schema types and builders for tfplug
//!
//! Schemas describe resource and data source attributes. Besides the
//! declaration they carry the behaviour Terraform expects the framework to
//! apply: required checks, validators, defaults and plan modifiers.

use crate::error::{Result, TfplugError};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// Shapes a value to this type: objects get exactly the declared
    /// attributes (missing ones null) and whole collections are checked
    /// element by element. Null and unknown fit every type.
    pub fn conform(&self, value: &Dynamic) -> Result<Dynamic> {
        match (self, value) {
            (_, Dynamic::Null) => Ok(Dynamic::Null),
            (_, Dynamic::Unknown) => Ok(Dynamic::Unknown),
            (AttributeType::String, Dynamic::String(_))
            | (AttributeType::Number, Dynamic::Number(_))
            | (AttributeType::Bool, Dynamic::Bool(_)) => Ok(value.clone()),
            (AttributeType::List(element) | AttributeType::Set(element), Dynamic::List(items)) => {
                items
                    .iter()
                    .map(|item| element.conform(item))
                    .collect::<Result<Vec<_>>>()
                    .map(Dynamic::List)
            }
            (AttributeType::Map(element), Dynamic::Map(items)) => items
                .iter()
                .map(|(key, item)| -> Result<_> { Ok((key.clone(), element.conform(item)?)) })
                .collect::<Result<HashMap<_, _>>>()
                .map(Dynamic::Map),
            (AttributeType::Object(attributes), Dynamic::Map(items)) => attributes
                .iter()
                .map(|(name, type_)| -> Result<_> {
                    let item = items.get(name).unwrap_or(&Dynamic::Null);
                    Ok((name.clone(), type_.conform(item)?))
                })
                .collect::<Result<HashMap<_, _>>>()
                .map(Dynamic::Map),
            (expected, actual) => Err(TfplugError::type_mismatch(
                expected.type_name(),
                actual.type_name(),
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Bool => "bool",
            AttributeType::List(_) => "list",
            AttributeType::Set(_) => "set",
            AttributeType::Map(_) => "map",
            AttributeType::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub deprecated: bool,
}

pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Box<dyn Validator>>,
    pub plan_modifiers: Vec<Box<dyn PlanModifier>>,
    /// Used when the configuration leaves the attribute null
    pub default: Option<Dynamic>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .field("default", &self.default)
            .field("nested_type", &self.nested_type)
            .finish()
    }
}

// Validators and plan modifiers are not cloneable; a cloned attribute only
// keeps its declaration.
impl Clone for Attribute {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            r#type: self.r#type.clone(),
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            validators: vec![],
            plan_modifiers: vec![],
            default: self.default.clone(),
            nested_type: self.nested_type.clone(),
            deprecated: self.deprecated,
        }
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug, Clone)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

impl NestedType {
    pub fn single(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Single,
        }
    }

    pub fn list(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::List,
        }
    }

    pub fn set(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Set,
        }
    }

    pub fn map(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Map,
        }
    }

    /// The Terraform type of a value holding this nested structure
    pub fn attribute_type(&self) -> AttributeType {
        let object = AttributeType::Object(
            self.attributes
                .iter()
                .map(|a| (a.name.clone(), a.r#type.clone()))
                .collect(),
        );
        match self.nesting {
            ObjectNestingMode::Single => object,
            ObjectNestingMode::List => AttributeType::List(Box::new(object)),
            ObjectNestingMode::Set => AttributeType::Set(Box::new(object)),
            ObjectNestingMode::Map => AttributeType::Map(Box::new(object)),
        }
    }

    /// Visits each object element of `value` together with its path
    fn for_each_element<'a>(
        &self,
        value: &'a Dynamic,
        path: &AttributePath,
        mut f: impl FnMut(&'a Dynamic, AttributePath),
    ) {
        match (self.nesting, value) {
            (ObjectNestingMode::Single, Dynamic::Map(_)) => f(value, path.clone()),
            (ObjectNestingMode::List | ObjectNestingMode::Set, Dynamic::List(items)) => {
                for (idx, item) in items.iter().enumerate() {
                    f(item, path.clone().index(idx as i64));
                }
            }
            (ObjectNestingMode::Map, Dynamic::Map(items)) => {
                for (key, item) in items {
                    f(item, path.clone().key(key));
                }
            }
            _ => {}
        }
    }

    fn for_each_element_mut(&self, value: &mut Dynamic, mut f: impl FnMut(&mut Dynamic)) {
        match (self.nesting, value) {
            (ObjectNestingMode::Single, v @ Dynamic::Map(_)) => f(v),
            (ObjectNestingMode::List | ObjectNestingMode::Set, Dynamic::List(items)) => {
                items.iter_mut().for_each(f)
            }
            (ObjectNestingMode::Map, Dynamic::Map(items)) => items.values_mut().for_each(f),
            _ => {}
        }
    }

    /// Correlates planned elements with prior ones: list elements by
    /// position, map elements by key and set elements by the attributes the
    /// configuration decides
    fn propose_from_prior(&self, value: &mut Dynamic, prior: &Dynamic) {
        match (self.nesting, value, prior) {
            (ObjectNestingMode::Single, value, prior) => {
                propose_object(&self.attributes, value, prior)
            }
            (ObjectNestingMode::List, Dynamic::List(items), Dynamic::List(prior_items)) => {
                for (item, prior_item) in items.iter_mut().zip(prior_items) {
                    propose_object(&self.attributes, item, prior_item);
                }
            }
            (ObjectNestingMode::Set, Dynamic::List(items), Dynamic::List(prior_items)) => {
                let mut used = vec![false; prior_items.len()];
                for item in items.iter_mut() {
                    let found = prior_items
                        .iter()
                        .enumerate()
                        .find(|(idx, prior_item)| !used[*idx] && self.same_element(item, prior_item));
                    if let Some((idx, prior_item)) = found {
                        used[idx] = true;
                        propose_object(&self.attributes, item, prior_item);
                    }
                }
            }
            (ObjectNestingMode::Map, Dynamic::Map(items), Dynamic::Map(prior_items)) => {
                for (key, item) in items.iter_mut() {
                    if let Some(prior_item) = prior_items.get(key) {
                        propose_object(&self.attributes, item, prior_item);
                    }
                }
            }
            _ => {}
        }
    }

    fn values_equal(&self, a: &Dynamic, b: &Dynamic) -> bool {
        match (self.nesting, a, b) {
            (ObjectNestingMode::Single, a, b) => objects_equal(&self.attributes, a, b),
            (ObjectNestingMode::List, Dynamic::List(a), Dynamic::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(a, b)| objects_equal(&self.attributes, a, b))
            }
            (ObjectNestingMode::Set, Dynamic::List(a), Dynamic::List(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut used = vec![false; b.len()];
                a.iter().all(|item| {
                    let found = b.iter().enumerate().position(|(idx, candidate)| {
                        !used[idx] && objects_equal(&self.attributes, item, candidate)
                    });
                    match found {
                        Some(idx) => {
                            used[idx] = true;
                            true
                        }
                        None => false,
                    }
                })
            }
            (ObjectNestingMode::Map, Dynamic::Map(a), Dynamic::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, item)| {
                        b.get(key)
                            .is_some_and(|other| objects_equal(&self.attributes, item, other))
                    })
            }
            (_, a, b) => a == b,
        }
    }

    /// Computed attributes the configuration leaves null do not take part
    fn same_element(&self, item: &Dynamic, prior: &Dynamic) -> bool {
        self.attributes.iter().all(|attr| {
            let value = item.attr(&attr.name).unwrap_or(&Dynamic::Null);
            (attr.computed && value.is_null())
                || value == prior.attr(&attr.name).unwrap_or(&Dynamic::Null)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Single,
    List,
    Set,
    Map,
}

/// Validator performs validation on attribute values during planning
pub trait Validator: Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    /// Value of the attribute being validated, may be null or unknown
    pub config_value: Dynamic,
    pub path: AttributePath,
}

pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier modifies planned values during planning
/// Common uses: RequiresReplace, UseStateForUnknown
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

pub struct PlanModifierRequest {
    pub config_value: Dynamic,
    pub state_value: Dynamic,
    pub plan_value: Dynamic,
    pub path: AttributePath,
}

pub struct PlanModifierResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of running framework planning over a configuration
#[derive(Debug)]
pub struct PlannedChange {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// The object type of a whole config, plan or state value
    pub fn value_type(&self) -> AttributeType {
        AttributeType::Object(
            self.block
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.r#type.clone()))
                .collect(),
        )
    }

    /// Checks required attributes and runs every attribute validator,
    /// descending into nested attributes.
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        validate_attributes(
            &self.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics
    }

    /// Fills in defaults for null attributes, including nested ones
    pub fn apply_defaults(&self, value: &mut DynamicValue) {
        apply_defaults_to(&self.block.attributes, &mut value.value);
    }

    /// Computes a planned state the way Terraform's framework does:
    /// defaults are applied, computed attributes absent from configuration
    /// keep their prior value unless the resource changes, in which case they
    /// become unknown, and plan modifiers then run on each top-level
    /// attribute. Computed attributes inside nested objects keep the value
    /// of the prior object they correlate with.
    pub fn plan(&self, config: &DynamicValue, prior_state: &DynamicValue) -> PlannedChange {
        let mut planned = config.clone();
        if !matches!(planned.value, Dynamic::Map(_)) {
            planned.value = Dynamic::Map(HashMap::new());
        }
        self.apply_defaults(&mut planned);
        let mut diagnostics = Vec::new();

        let unset_computed: Vec<&Attribute> = self
            .block
            .attributes
            .iter()
            .filter(|a| a.computed)
            .filter(|a| {
                config.value.attr(&a.name).map_or(true, Dynamic::is_null)
                    && planned.value.attr(&a.name).map_or(true, Dynamic::is_null)
            })
            .collect();

        for attr in &self.block.attributes {
            let (Some(nested), Dynamic::Map(map)) = (&attr.nested_type, &mut planned.value) else {
                continue;
            };
            if let (Some(value), Some(prior)) =
                (map.get_mut(&attr.name), prior_state.value.attr(&attr.name))
            {
                nested.propose_from_prior(value, prior);
            }
        }

        for attr in &unset_computed {
            let prior = prior_state
                .value
                .attr(&attr.name)
                .cloned()
                .unwrap_or(Dynamic::Null);
            set_planned(&mut planned, &AttributePath::new(&attr.name), prior, &mut diagnostics);
        }

        if prior_state.is_null()
            || !objects_equal(&self.block.attributes, &planned.value, &prior_state.value)
        {
            for attr in &unset_computed {
                set_planned(
                    &mut planned,
                    &AttributePath::new(&attr.name),
                    Dynamic::Unknown,
                    &mut diagnostics,
                );
            }
        }

        let mut requires_replace = Vec::new();
        for attr in &self.block.attributes {
            if attr.plan_modifiers.is_empty() {
                continue;
            }
            let path = AttributePath::new(&attr.name);
            let mut plan_value = planned
                .value
                .attr(&attr.name)
                .cloned()
                .unwrap_or(Dynamic::Null);
            let config_value = config
                .value
                .attr(&attr.name)
                .cloned()
                .unwrap_or(Dynamic::Null);
            let state_value = prior_state
                .value
                .attr(&attr.name)
                .cloned()
                .unwrap_or(Dynamic::Null);

            for modifier in &attr.plan_modifiers {
                let response = modifier.modify(PlanModifierRequest {
                    config_value: config_value.clone(),
                    state_value: state_value.clone(),
                    plan_value,
                    path: path.clone(),
                });
                plan_value = response.plan_value;
                diagnostics.extend(response.diagnostics);
                if response.requires_replace && !requires_replace.contains(&path) {
                    requires_replace.push(path.clone());
                }
            }
            set_planned(&mut planned, &path, plan_value, &mut diagnostics);
        }

        tracing::trace!(
            unknown_computed = unset_computed.len(),
            requires_replace = requires_replace.len(),
            "planned resource change"
        );

        PlannedChange {
            planned_state: planned,
            requires_replace,
            diagnostics,
        }
    }
}

/// Equality that ignores set element order and treats a missing attribute
/// as null
fn objects_equal(attributes: &[Attribute], a: &Dynamic, b: &Dynamic) -> bool {
    if !matches!((a, b), (Dynamic::Map(_), Dynamic::Map(_))) {
        return a == b;
    }
    attributes.iter().all(|attr| {
        let a = a.attr(&attr.name).unwrap_or(&Dynamic::Null);
        let b = b.attr(&attr.name).unwrap_or(&Dynamic::Null);
        match (&attr.nested_type, &attr.r#type) {
            (Some(nested), _) => nested.values_equal(a, b),
            (None, AttributeType::Set(_)) => a.set_equal(b),
            _ => a == b,
        }
    })
}

/// Writes a planned value, reporting a path that cannot be written
fn set_planned(
    planned: &mut DynamicValue,
    path: &AttributePath,
    value: Dynamic,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Err(e) = planned.set_value(path, value) {
        diagnostics.push(
            Diagnostic::error(
                "Failed to plan attribute",
                format!("Could not set the planned value of \"{}\": {}", path, e),
            )
            .with_attribute(path.clone()),
        );
    }
}

/// Null computed attributes of a nested object take the prior object's
/// value; known attributes are descended into
fn propose_object(attributes: &[Attribute], object: &mut Dynamic, prior: &Dynamic) {
    let Dynamic::Map(map) = object else {
        return;
    };
    for attr in attributes {
        let prior_value = prior.attr(&attr.name).unwrap_or(&Dynamic::Null);
        let value = map.entry(attr.name.clone()).or_insert(Dynamic::Null);
        if value.is_null() {
            if attr.computed {
                *value = prior_value.clone();
            }
        } else if let Some(nested) = &attr.nested_type {
            nested.propose_from_prior(value, prior_value);
        }
    }
}

fn validate_attributes(
    attributes: &[Attribute],
    object: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let value = object.attr(&attr.name).cloned().unwrap_or(Dynamic::Null);

        if attr.required && value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    "Missing required argument",
                    format!("The argument \"{}\" is required, but no definition was found.", attr_path),
                )
                .with_attribute(attr_path.clone()),
            );
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: value.clone(),
                path: attr_path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }

        if let Some(nested) = &attr.nested_type {
            nested.for_each_element(&value, &attr_path, |element, element_path| {
                validate_attributes(&nested.attributes, element, &element_path, diagnostics);
            });
        }
    }
}

fn apply_defaults_to(attributes: &[Attribute], object: &mut Dynamic) {
    let Dynamic::Map(map) = object else {
        return;
    };
    for attr in attributes {
        let value = map.entry(attr.name.clone()).or_insert(Dynamic::Null);
        if value.is_null() {
            if let Some(default) = &attr.default {
                *value = default.clone();
            }
        }
        if let Some(nested) = &attr.nested_type {
            nested.for_each_element_mut(value, |element| {
                apply_defaults_to(&nested.attributes, element)
            });
        }
    }
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                nested_type: None,
                deprecated: false,
            },
        }
    }

    /// Starts an attribute whose type is derived from its nested attributes
    pub fn nested(name: &str, nested: NestedType) -> Self {
        let type_ = nested.attribute_type();
        Self::new(name, type_).nested_type(nested)
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    pub fn default(mut self, value: Dynamic) -> Self {
        self.attribute.default = Some(value);
        self
    }

    pub fn nested_type(mut self, nested: NestedType) -> Self {
        self.attribute.nested_type = Some(nested);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    attributes: Vec::new(),
                    description: String::new(),
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::{RequiresReplace, UseStateForUnknown};
    use crate::validator::StringLengthValidator;
    use serde_json::json;

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLengthValidator::between(1, 8))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("kind", AttributeType::String)
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "rows",
                    NestedType::list(vec![
                        AttributeBuilder::new("default_row", AttributeType::Bool)
                            .optional()
                            .computed()
                            .default(Dynamic::Bool(false))
                            .build(),
                        AttributeBuilder::new("label", AttributeType::String)
                            .required()
                            .build(),
                    ]),
                )
                .optional()
                .build(),
            )
            .build()
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn nested_attribute_type_is_derived() {
        let attr = AttributeBuilder::nested(
            "fields",
            NestedType::set(vec![AttributeBuilder::new("name", AttributeType::String)
                .required()
                .build()]),
        )
        .build();

        match &attr.r#type {
            AttributeType::Set(inner) => match inner.as_ref() {
                AttributeType::Object(fields) => {
                    assert_eq!(fields.get("name"), Some(&AttributeType::String))
                }
                other => panic!("expected object, got {:?}", other),
            },
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn validate_reports_missing_required_and_nested_errors() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::from(json!({
            "rows": [{"label": "a"}, {"label": null}]
        })));

        let diags = schema.validate(&config);
        let paths: Vec<String> = diags
            .iter()
            .filter_map(|d| d.attribute.as_ref().map(|p| p.to_string()))
            .collect();

        assert_eq!(paths, vec!["name", "rows[1].label"]);
    }

    #[test]
    fn validate_runs_attribute_validators() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::from(json!({"name": "far-too-long"})));

        let diags = schema.validate(&config);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_error());
    }

    #[test]
    fn plan_on_create_marks_computed_unknown_and_applies_nested_defaults() {
        let schema = test_schema();
        let config = DynamicValue::new(Dynamic::from(json!({
            "name": "a",
            "rows": [{"label": "x"}]
        })));

        let planned = schema.plan(&config, &DynamicValue::null());
        let state = planned.planned_state;

        assert!(state.get(&AttributePath::new("id")).unwrap().is_unknown());
        assert!(state.get(&AttributePath::new("status")).unwrap().is_unknown());
        assert!(!state
            .get_bool(&AttributePath::new("rows").index(0).attribute("default_row"))
            .unwrap());
        assert!(planned.requires_replace.is_empty());
    }

    #[test]
    fn plan_on_update_keeps_state_and_flags_replacement() {
        let schema = test_schema();
        let prior = DynamicValue::new(Dynamic::from(json!({
            "id": "abc", "name": "a", "kind": "one", "status": "ok", "rows": null
        })));
        let config = DynamicValue::new(Dynamic::from(json!({
            "name": "b", "kind": "two"
        })));

        let planned = schema.plan(&config, &prior);
        let state = planned.planned_state;

        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "abc");
        assert!(state.get(&AttributePath::new("status")).unwrap().is_unknown());
        assert_eq!(planned.requires_replace, vec![AttributePath::new("kind")]);
    }

    #[test]
    fn plan_without_changes_keeps_computed_values() {
        let schema = test_schema();
        let prior = DynamicValue::new(Dynamic::from(json!({
            "id": "abc", "name": "a", "kind": null, "status": "ok", "rows": null
        })));
        let config = DynamicValue::new(Dynamic::from(json!({"name": "a"})));

        let planned = schema.plan(&config, &prior);
        assert_eq!(planned.planned_state, prior);
    }

    fn secrets_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::nested(
                    "secrets",
                    NestedType::set(vec![
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                        AttributeBuilder::new("value", AttributeType::String)
                            .optional()
                            .sensitive()
                            .build(),
                        AttributeBuilder::new("encrypted_value", AttributeType::String)
                            .optional()
                            .computed()
                            .build(),
                    ]),
                )
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "parent",
                    NestedType::single(vec![AttributeBuilder::new("id", AttributeType::String)
                        .required()
                        .build()]),
                )
                .optional()
                .computed()
                .build(),
            )
            .build()
    }

    #[test]
    fn plan_keeps_computed_values_of_correlated_set_elements() {
        let schema = secrets_schema();
        let prior = DynamicValue::new(Dynamic::from(json!({
            "secrets": [
                {"name": "a", "value": "one", "encrypted_value": "enc-a"},
                {"name": "b", "value": "two", "encrypted_value": "enc-b"}
            ],
            "parent": null
        })));
        let config = DynamicValue::new(Dynamic::from(json!({
            "secrets": [
                {"name": "b", "value": "two", "encrypted_value": null},
                {"name": "a", "value": "one", "encrypted_value": null}
            ],
            "parent": null
        })));

        let planned = schema.plan(&config, &prior);
        assert!(planned.diagnostics.is_empty());
        assert!(planned.planned_state.value.attr("secrets").unwrap().set_equal(
            prior.value.attr("secrets").unwrap()
        ));
        assert_eq!(planned.planned_state.value.attr("parent"), Some(&Dynamic::Null));
    }

    #[test]
    fn plan_does_not_correlate_changed_set_elements() {
        let schema = secrets_schema();
        let prior = DynamicValue::new(Dynamic::from(json!({
            "secrets": [{"name": "a", "value": "one", "encrypted_value": "enc-a"}],
            "parent": null
        })));
        let config = DynamicValue::new(Dynamic::from(json!({
            "secrets": [{"name": "a", "value": "changed", "encrypted_value": null}],
            "parent": null
        })));

        let planned = schema.plan(&config, &prior).planned_state;
        let path = AttributePath::new("secrets").index(0).attribute("encrypted_value");
        assert_eq!(planned.get(&path).unwrap(), &Dynamic::Null);
        assert!(planned.value.attr("parent").unwrap().is_unknown());
    }

    #[test]
    fn map_elements_correlate_by_key() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::nested(
                    "mapping",
                    NestedType::map(vec![
                        AttributeBuilder::new("source", AttributeType::String)
                            .required()
                            .build(),
                        AttributeBuilder::new("value", AttributeType::String)
                            .optional()
                            .computed()
                            .build(),
                    ]),
                )
                .optional()
                .build(),
            )
            .build();
        let prior = DynamicValue::new(Dynamic::from(json!({
            "mapping": {
                "subject": {"source": "ADAPTER", "value": "subject"},
                "mail": {"source": "TEXT", "value": "a@example.com"}
            }
        })));
        let config = DynamicValue::new(Dynamic::from(json!({
            "mapping": {
                "subject": {"source": "ADAPTER", "value": null},
                "mail": {"source": "TEXT", "value": "a@example.com"}
            }
        })));

        let planned = schema.plan(&config, &prior);
        assert_eq!(planned.planned_state, prior);
        assert!(matches!(
            schema.attribute("mapping").unwrap().r#type,
            AttributeType::Map(_)
        ));
    }

    #[test]
    fn unwritable_planned_path_is_reported() {
        let mut planned = DynamicValue::new(Dynamic::string("not an object"));
        let mut diagnostics = Vec::new();
        set_planned(
            &mut planned,
            &AttributePath::root().index(0),
            Dynamic::Unknown,
            &mut diagnostics,
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].summary, "Failed to plan attribute");
    }

    #[test]
    fn conform_fills_missing_object_attributes_and_drops_extras() {
        let schema = test_schema();
        let value = Dynamic::from(json!({"name": "web", "extra": true}));
        let conformed = schema.value_type().conform(&value).unwrap();

        assert_eq!(conformed.attr("name"), Some(&Dynamic::string("web")));
        assert_eq!(conformed.attr("id"), Some(&Dynamic::Null));
        assert!(conformed.attr("extra").is_none());
    }

    #[test]
    fn conform_rejects_mistyped_values() {
        let type_ = AttributeType::List(Box::new(AttributeType::String));
        let err = type_
            .conform(&Dynamic::List(vec![Dynamic::Bool(true)]))
            .unwrap_err();
        assert!(matches!(err, TfplugError::TypeMismatch { .. }));
        assert_eq!(type_.conform(&Dynamic::Unknown).unwrap(), Dynamic::Unknown);
    }
}
