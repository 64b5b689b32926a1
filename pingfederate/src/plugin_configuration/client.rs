//! Builds the request body for a plugin configuration

use tfplug::types::Dynamic;
use tfplug::Result;

use super::model::{PlanConfiguration, PlanField, PlanRow, PlanSensitiveField};
use crate::api::models::{ConfigField, ConfigRow, ConfigTable, PluginConfiguration};

fn cleartext_field(field: &PlanField) -> ConfigField {
    ConfigField {
        name: field.name.clone(),
        value: field.value.clone(),
        ..Default::default()
    }
}

fn sensitive_field(field: &PlanSensitiveField) -> ConfigField {
    ConfigField {
        name: field.name.clone(),
        value: field.value.clone(),
        encrypted_value: field.encrypted_value.clone(),
        inherited: None,
    }
}

fn request_fields(fields: &[PlanField], sensitive_fields: &[PlanSensitiveField]) -> Vec<ConfigField> {
    fields
        .iter()
        .map(cleartext_field)
        .chain(sensitive_fields.iter().map(sensitive_field))
        .collect()
}

fn request_row(row: &PlanRow) -> ConfigRow {
    ConfigRow {
        fields: request_fields(&row.fields, &row.sensitive_fields),
        default_row: row.default_row,
    }
}

/// Converts the planned `configuration` attribute into the API shape.
/// Only declared attributes are sent; `fields_all` and `tables_all` are
/// server output.
pub fn to_client_struct(configuration: &Dynamic) -> Result<PluginConfiguration> {
    let plan = PlanConfiguration::from_value(configuration)?;

    Ok(PluginConfiguration {
        fields: request_fields(&plan.fields, &plan.sensitive_fields),
        tables: plan
            .tables
            .iter()
            .map(|table| ConfigTable {
                name: table.name.clone(),
                rows: table
                    .rows
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(request_row)
                    .collect(),
                inherited: None,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_configuration::state::{field_object, sensitive_field_object};
    use serde_json::json;

    #[test]
    fn builds_request_body_from_plan() {
        let configuration = Dynamic::object([
            (
                "fields",
                Dynamic::List(vec![field_object("Client Id", Some("abc".to_string()))]),
            ),
            (
                "sensitive_fields",
                Dynamic::List(vec![
                    sensitive_field_object("Client Secret", Some("s3cret".to_string()), None),
                    sensitive_field_object("Key", None, Some("OBF:enc".to_string())),
                ]),
            ),
            ("fields_all", Dynamic::Unknown),
            (
                "tables",
                Dynamic::List(vec![
                    Dynamic::object([
                        ("name", Dynamic::string("Users")),
                        (
                            "rows",
                            Dynamic::List(vec![Dynamic::object([
                                (
                                    "fields",
                                    Dynamic::List(vec![field_object(
                                        "Username",
                                        Some("bob".to_string()),
                                    )]),
                                ),
                                ("sensitive_fields", Dynamic::List(vec![])),
                                ("default_row", Dynamic::Bool(true)),
                            ])]),
                        ),
                    ]),
                    Dynamic::object([("name", Dynamic::string("Empty")), ("rows", Dynamic::Null)]),
                ]),
            ),
            ("tables_all", Dynamic::Unknown),
        ]);

        let body = to_client_struct(&configuration).unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "fields": [
                    {"name": "Client Id", "value": "abc"},
                    {"name": "Client Secret", "value": "s3cret"},
                    {"name": "Key", "encryptedValue": "OBF:enc"}
                ],
                "tables": [
                    {
                        "name": "Users",
                        "rows": [
                            {"fields": [{"name": "Username", "value": "bob"}], "defaultRow": true}
                        ]
                    },
                    {"name": "Empty", "rows": []}
                ]
            })
        );
    }

    #[test]
    fn null_configuration_is_empty_body() {
        assert_eq!(
            to_client_struct(&Dynamic::Null).unwrap(),
            PluginConfiguration::default()
        );
    }
}
