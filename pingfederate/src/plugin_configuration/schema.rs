//! Schema of the `configuration` attribute shared by plugin resources

use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::schema::Attribute;
use tfplug::{AttributeBuilder, AttributeType, Dynamic, NestedType};

use super::validator::{DuplicateFieldsValidator, SensitiveValueValidator};

fn field_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the configuration field.")
            .required()
            .build(),
        AttributeBuilder::new("value", AttributeType::String)
            .description("The value for the configuration field.")
            .required()
            .build(),
    ]
}

fn sensitive_field_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the configuration field.")
            .required()
            .build(),
        AttributeBuilder::new("value", AttributeType::String)
            .description("The sensitive value for the configuration field. Either this attribute or `encrypted_value` must be specified.")
            .optional()
            .sensitive()
            .build(),
        AttributeBuilder::new("encrypted_value", AttributeType::String)
            .description("For encrypted or hashed fields, this attribute contains the encrypted representation of the field's value, if a value is defined. Either this attribute or `value` must be specified.")
            .optional()
            .computed()
            .build(),
    ]
}

fn fields(name: &str, description: &str) -> Attribute {
    AttributeBuilder::nested(name, NestedType::set(field_attributes()))
        .description(description)
        .optional()
        .computed()
        .default(Dynamic::List(vec![]))
        .build()
}

fn sensitive_fields(name: &str, description: &str) -> Attribute {
    AttributeBuilder::nested(name, NestedType::set(sensitive_field_attributes()))
        .description(description)
        .optional()
        .computed()
        .default(Dynamic::List(vec![]))
        .validator(SensitiveValueValidator::create())
        .build()
}

fn default_row() -> Attribute {
    AttributeBuilder::new("default_row", AttributeType::Bool)
        .description("Whether this row is the default.")
        .optional()
        .computed()
        .default(Dynamic::Bool(false))
        .build()
}

fn table_name() -> Attribute {
    AttributeBuilder::new("name", AttributeType::String)
        .description("The name of the table.")
        .required()
        .build()
}

fn tables() -> Attribute {
    let rows = AttributeBuilder::nested(
        "rows",
        NestedType::list(vec![
            fields("fields", "The configuration fields in the row."),
            sensitive_fields(
                "sensitive_fields",
                "The sensitive configuration fields in the row.",
            ),
            default_row(),
        ]),
    )
    .description("List of table rows.")
    .optional()
    .build();

    AttributeBuilder::nested("tables", NestedType::list(vec![table_name(), rows]))
        .description("List of configuration tables.")
        .optional()
        .computed()
        .default(Dynamic::List(vec![]))
        .build()
}

fn tables_all() -> Attribute {
    let rows = AttributeBuilder::nested(
        "rows",
        NestedType::list(vec![
            AttributeBuilder::nested("fields", NestedType::set(field_attributes()))
                .description("The configuration fields in the row.")
                .optional()
                .build(),
            default_row(),
        ]),
    )
    .description("List of table rows.")
    .optional()
    .build();

    AttributeBuilder::nested("tables_all", NestedType::list(vec![table_name(), rows]))
        .description("List of configuration tables. This attribute will include any values set by default by PingFederate.")
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

/// The `configuration` attribute of plugin instance resources
pub fn resource_attribute() -> Attribute {
    AttributeBuilder::nested(
        "configuration",
        NestedType::single(vec![
            tables(),
            tables_all(),
            fields("fields", "List of configuration fields."),
            sensitive_fields("sensitive_fields", "List of sensitive configuration fields."),
            AttributeBuilder::nested("fields_all", NestedType::set(field_attributes()))
                .description("List of configuration fields. This attribute will include any values set by default by PingFederate.")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        ]),
    )
    .description("Plugin instance configuration.")
    .required()
    .validator(DuplicateFieldsValidator::create())
    .build()
}

fn data_source_field_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the configuration field.")
            .computed()
            .build(),
        AttributeBuilder::new("value", AttributeType::String)
            .description("The value for the configuration field.")
            .computed()
            .build(),
        AttributeBuilder::new("inherited", AttributeType::Bool)
            .description("Whether this field is inherited from its parent instance.")
            .computed()
            .build(),
    ]
}

/// The read-only `configuration` attribute of plugin instance data sources
pub fn data_source_attribute() -> Attribute {
    let rows = AttributeBuilder::nested(
        "rows",
        NestedType::list(vec![
            AttributeBuilder::nested("fields", NestedType::list(data_source_field_attributes()))
                .description("The configuration fields in the row.")
                .computed()
                .build(),
            AttributeBuilder::new("default_row", AttributeType::Bool)
                .description("Whether this row is the default.")
                .computed()
                .build(),
        ]),
    )
    .description("List of table rows.")
    .computed()
    .build();

    let tables = AttributeBuilder::nested(
        "tables",
        NestedType::list(vec![
            AttributeBuilder::new("name", AttributeType::String)
                .description("The name of the table.")
                .computed()
                .build(),
            AttributeBuilder::new("inherited", AttributeType::Bool)
                .description("Whether this table is inherited from its parent instance.")
                .computed()
                .build(),
            rows,
        ]),
    )
    .description("List of configuration tables.")
    .computed()
    .build();

    AttributeBuilder::nested(
        "configuration",
        NestedType::single(vec![
            AttributeBuilder::nested("fields", NestedType::list(data_source_field_attributes()))
                .description("List of configuration fields.")
                .computed()
                .build(),
            AttributeBuilder::nested("fields_all", NestedType::list(data_source_field_attributes()))
                .description("List of configuration fields. This attribute will include any values set by default by PingFederate.")
                .computed()
                .build(),
            tables,
        ]),
    )
    .description("Plugin instance configuration.")
    .computed()
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tfplug::{DynamicValue, SchemaBuilder};

    fn nested<'a>(attr: &'a Attribute, name: &str) -> &'a Attribute {
        attr.nested_type
            .as_ref()
            .and_then(|n| n.attributes.iter().find(|a| a.name == name))
            .unwrap()
    }

    #[test]
    fn resource_attribute_shape() {
        let configuration = resource_attribute();
        assert!(configuration.required);
        assert_eq!(configuration.validators.len(), 1);

        let fields_all = nested(&configuration, "fields_all");
        assert!(fields_all.computed && !fields_all.optional);
        assert_eq!(fields_all.plan_modifiers.len(), 1);

        let sensitive = nested(&configuration, "sensitive_fields");
        assert!(nested(sensitive, "value").sensitive);
        assert!(nested(sensitive, "encrypted_value").computed);

        let rows = nested(nested(&configuration, "tables"), "rows");
        assert_eq!(nested(rows, "default_row").default, Some(Dynamic::Bool(false)));
    }

    #[test]
    fn defaults_fill_empty_collections() {
        let schema = SchemaBuilder::new().attribute(resource_attribute()).build();
        let mut value = DynamicValue::new(Dynamic::object([(
            "configuration",
            Dynamic::object([(
                "tables",
                Dynamic::List(vec![Dynamic::object([
                    ("name", Dynamic::string("T")),
                    ("rows", Dynamic::List(vec![Dynamic::Map(HashMap::new())])),
                ])]),
            )]),
        )]));
        schema.apply_defaults(&mut value);

        let configuration = value.value.attr("configuration").unwrap();
        assert_eq!(configuration.attr("fields"), Some(&Dynamic::List(vec![])));
        assert_eq!(configuration.attr("sensitive_fields"), Some(&Dynamic::List(vec![])));
        let row = &configuration.attr("tables").unwrap().try_as_list().unwrap()[0]
            .attr("rows")
            .unwrap()
            .try_as_list()
            .unwrap()[0];
        assert_eq!(row.attr("default_row"), Some(&Dynamic::Bool(false)));
        assert_eq!(row.attr("fields"), Some(&Dynamic::List(vec![])));
    }

    #[test]
    fn schema_validation_reaches_nested_validators() {
        let schema = SchemaBuilder::new().attribute(resource_attribute()).build();
        let config = DynamicValue::new(Dynamic::object([(
            "configuration",
            Dynamic::object([
                (
                    "fields",
                    Dynamic::List(vec![Dynamic::object([
                        ("name", Dynamic::string("x")),
                        ("value", Dynamic::string("1")),
                    ])]),
                ),
                (
                    "sensitive_fields",
                    Dynamic::List(vec![Dynamic::object([
                        ("name", Dynamic::string("x")),
                        ("value", Dynamic::Null),
                        ("encrypted_value", Dynamic::Null),
                    ])]),
                ),
            ]),
        )]));

        let diags = schema.validate(&config);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.is_error()));
    }
}
