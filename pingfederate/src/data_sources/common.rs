//! Schema pieces shared by the plugin instance data sources

use tfplug::schema::Attribute;
use tfplug::{AttributeBuilder, AttributeType, NestedType};

pub fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("The ID of this data source.")
        .computed()
        .build()
}

/// The id used to look up the plugin instance
pub fn lookup_id_attribute(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description("ID of the plugin instance.")
        .required()
        .build()
}

pub fn name_attribute() -> Attribute {
    AttributeBuilder::new("name", AttributeType::String)
        .description("The plugin instance name.")
        .computed()
        .build()
}

pub fn link_attribute(name: &str, description: &str) -> Attribute {
    AttributeBuilder::nested(
        name,
        NestedType::single(vec![AttributeBuilder::new("id", AttributeType::String)
            .description("The ID of the resource.")
            .computed()
            .build()]),
    )
    .description(description)
    .computed()
    .build()
}

/// Read-only view of a resource attribute. Every nested level becomes
/// computed and loses its defaults.
pub fn computed_view(mut attribute: Attribute) -> Attribute {
    attribute.required = false;
    attribute.optional = false;
    attribute.computed = true;
    attribute.default = None;
    if let Some(nested) = attribute.nested_type.take() {
        attribute.nested_type = Some(NestedType {
            attributes: nested.attributes.into_iter().map(computed_view).collect(),
            nesting: nested.nesting,
        });
    }
    attribute
}

pub fn inherited_attribute(description: &str) -> Attribute {
    AttributeBuilder::new("inherited", AttributeType::Bool)
        .description(description)
        .computed()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_view_reaches_nested_attributes() {
        let attribute = AttributeBuilder::nested(
            "mapping",
            NestedType::map(vec![AttributeBuilder::new("value", AttributeType::String)
                .optional()
                .computed()
                .default(tfplug::types::Dynamic::string(""))
                .build()]),
        )
        .required()
        .build();

        let view = computed_view(attribute);
        assert!(view.computed && !view.required);
        let value = &view.nested_type.unwrap().attributes[0];
        assert!(value.computed && !value.optional);
        assert!(value.default.is_none());
    }
}
