//! Configuration validators

use std::collections::HashSet;
use tfplug::schema::{Validator, ValidatorRequest, ValidatorResponse};
use tfplug::types::{AttributePath, Diagnostic, Dynamic};

use crate::diagnostics::INVALID_ATTRIBUTE_CONFIGURATION;

/// Rejects a field name declared both in `fields` and `sensitive_fields` of
/// the same scope: the top level or a single table row.
pub struct DuplicateFieldsValidator;

impl DuplicateFieldsValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

fn elements(value: Option<&Dynamic>) -> &[Dynamic] {
    match value {
        Some(Dynamic::List(items)) => items,
        _ => &[],
    }
}

/// Names that are known strings; unknown names cannot be compared yet
fn known_names(fields: Option<&Dynamic>) -> impl Iterator<Item = &str> {
    elements(fields)
        .iter()
        .filter_map(|field| field.attr("name").and_then(Dynamic::as_str))
}

fn duplicate_names<'a>(scope: &'a Dynamic) -> Vec<&'a str> {
    let cleartext: HashSet<&str> = known_names(scope.attr("fields")).collect();
    known_names(scope.attr("sensitive_fields"))
        .filter(|name| cleartext.contains(name))
        .collect()
}

impl Validator for DuplicateFieldsValidator {
    fn description(&self) -> String {
        "Validates there are no duplicate fields in the user-defined configuration".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();
        let configuration = &request.config_value;
        if configuration.known().is_none() {
            return ValidatorResponse { diagnostics };
        }

        let mut report = |detail: String| {
            diagnostics.push(
                Diagnostic::error(INVALID_ATTRIBUTE_CONFIGURATION, detail)
                    .with_attribute(request.path.clone()),
            );
        };

        for name in duplicate_names(configuration) {
            report(format!(
                "Duplicate field name in 'fields' and 'sensitive_fields': {}",
                name
            ));
        }

        for table in elements(configuration.attr("tables")) {
            let Some(table_name) = table.attr("name").and_then(Dynamic::as_str) else {
                continue;
            };
            for (idx, row) in elements(table.attr("rows")).iter().enumerate() {
                for name in duplicate_names(row) {
                    report(format!(
                        "Duplicate field name in 'fields' and 'sensitive_fields' in table '{}' at row with index {}: {}",
                        table_name, idx, name
                    ));
                }
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Requires exactly one of `value` and `encrypted_value` on each sensitive
/// field. Unknown values are assumed to satisfy the rule.
pub struct SensitiveValueValidator;

impl SensitiveValueValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for SensitiveValueValidator {
    fn description(&self) -> String {
        "Ensure that one and only one of value or encrypted_value is specified".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = Vec::new();

        for (idx, field) in elements(Some(&request.config_value)).iter().enumerate() {
            let value = field.attr("value").unwrap_or(&Dynamic::Null);
            let encrypted = field.attr("encrypted_value").unwrap_or(&Dynamic::Null);
            if value.is_unknown() || encrypted.is_unknown() {
                continue;
            }

            let element = request.path.clone().index(idx as i64);
            let encrypted_path = element.clone().attribute("encrypted_value");
            let value_path = element.attribute("value");
            let detail = match (value.is_null(), encrypted.is_null()) {
                (false, false) => format!(
                    "2 attributes specified when one (and only one) of [{}, {}] is required",
                    encrypted_path, value_path
                ),
                (true, true) => format!(
                    "No attribute specified when one (and only one) of [{}, {}] is required",
                    encrypted_path, value_path
                ),
                _ => continue,
            };
            diagnostics.push(
                Diagnostic::error("Invalid Attribute Combination", detail)
                    .with_attribute(encrypted_path),
            );
        }

        ValidatorResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_configuration::state::{field_object, sensitive_field_object};

    fn field(name: &str) -> Dynamic {
        field_object(name, Some("v".to_string()))
    }

    fn sensitive(name: &str) -> Dynamic {
        sensitive_field_object(name, Some("s".to_string()), None)
    }

    fn run(validator: &dyn Validator, value: Dynamic, path: AttributePath) -> Vec<Diagnostic> {
        validator
            .validate(ValidatorRequest {
                config_value: value,
                path,
            })
            .diagnostics
    }

    fn validate_configuration(value: Dynamic) -> Vec<Diagnostic> {
        run(
            DuplicateFieldsValidator::create().as_ref(),
            value,
            AttributePath::new("configuration"),
        )
    }

    fn table(name: &str, rows: Vec<Dynamic>) -> Dynamic {
        Dynamic::object([("name", Dynamic::string(name)), ("rows", Dynamic::List(rows))])
    }

    fn row(fields: Vec<Dynamic>, sensitive_fields: Vec<Dynamic>) -> Dynamic {
        Dynamic::object([
            ("fields", Dynamic::List(fields)),
            ("sensitive_fields", Dynamic::List(sensitive_fields)),
        ])
    }

    #[test]
    fn top_level_duplicate_is_reported_once() {
        let diags = validate_configuration(Dynamic::object([
            ("fields", Dynamic::List(vec![field("x"), field("y")])),
            ("sensitive_fields", Dynamic::List(vec![sensitive("x"), sensitive("z")])),
        ]));

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, INVALID_ATTRIBUTE_CONFIGURATION);
        assert_eq!(
            diags[0].detail,
            "Duplicate field name in 'fields' and 'sensitive_fields': x"
        );
        assert_eq!(diags[0].attribute, Some(AttributePath::new("configuration")));
    }

    #[test]
    fn table_row_duplicate_names_table_and_index() {
        let rows = vec![
            row(vec![field("a")], vec![]),
            row(vec![], vec![sensitive("a")]),
            row(vec![field("x")], vec![sensitive("x")]),
        ];
        let diags = validate_configuration(Dynamic::object([
            ("fields", Dynamic::List(vec![])),
            ("sensitive_fields", Dynamic::List(vec![])),
            ("tables", Dynamic::List(vec![table("Table1", rows)])),
        ]));

        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].detail,
            "Duplicate field name in 'fields' and 'sensitive_fields' in table 'Table1' at row with index 2: x"
        );
    }

    #[test]
    fn unknown_and_null_are_skipped() {
        assert!(validate_configuration(Dynamic::Null).is_empty());
        assert!(validate_configuration(Dynamic::Unknown).is_empty());

        let unknown_name = Dynamic::object([("name", Dynamic::Unknown), ("value", Dynamic::string("v"))]);
        let diags = validate_configuration(Dynamic::object([
            ("fields", Dynamic::List(vec![unknown_name.clone()])),
            ("sensitive_fields", Dynamic::List(vec![unknown_name])),
            ("tables", Dynamic::Unknown),
        ]));
        assert!(diags.is_empty());
    }

    #[test]
    fn sensitive_field_needs_exactly_one_value() {
        let path = AttributePath::new("configuration").attribute("sensitive_fields");
        let validator = SensitiveValueValidator::create();

        let fields = Dynamic::List(vec![
            sensitive_field_object("ok", Some("v".to_string()), None),
            sensitive_field_object("both", Some("v".to_string()), Some("enc".to_string())),
            sensitive_field_object("neither", None, None),
            Dynamic::object([
                ("name", Dynamic::string("pending")),
                ("value", Dynamic::Unknown),
                ("encrypted_value", Dynamic::Null),
            ]),
        ]);
        let diags = run(validator.as_ref(), fields, path.clone());

        assert_eq!(diags.len(), 2);
        assert!(diags[0].detail.starts_with("2 attributes specified"));
        assert_eq!(
            diags[0].attribute,
            Some(path.clone().index(1).attribute("encrypted_value"))
        );
        assert!(diags[1].detail.starts_with("No attribute specified"));
        assert!(run(validator.as_ref(), Dynamic::Null, path).is_empty());
    }
}
