//! Reconciles server configuration with the prior plan
//!
//! The server never echoes encrypted values and may add defaulted fields,
//! rows and tables. Two views are produced: the planned view holds only what
//! the user declared, using remembered plan values where the server is
//! silent, and the full view holds everything the server returned.

use std::collections::HashMap;
use tfplug::types::{AttributePath, Diagnostic, Dynamic};

use super::model::{PlanConfiguration, PlanField, PlanRow, PlanSensitiveField, PlanTable};
use crate::api::models::{ConfigField, ConfigRow, ConfigTable, PluginConfiguration};
use crate::diagnostics::{internal_error, CONFIGURATION_WARNING};

pub(crate) fn field_object(name: &str, value: Option<String>) -> Dynamic {
    Dynamic::object([
        ("name", Dynamic::string(name)),
        ("value", Dynamic::optional_string(value)),
    ])
}

pub(crate) fn sensitive_field_object(
    name: &str,
    value: Option<String>,
    encrypted_value: Option<String>,
) -> Dynamic {
    Dynamic::object([
        ("name", Dynamic::string(name)),
        ("value", Dynamic::optional_string(value)),
        ("encrypted_value", Dynamic::optional_string(encrypted_value)),
    ])
}

/// Result of reconciling one list of fields
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconciledFields {
    pub planned_cleartext: Vec<Dynamic>,
    pub planned_sensitive: Vec<Dynamic>,
    pub all_cleartext: Vec<Dynamic>,
    pub all_sensitive: Vec<Dynamic>,
    pub all_fields: Vec<Dynamic>,
}

/// Result of reconciling the rows of one table. Both are null when there is
/// nothing to report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRows {
    pub merged: Dynamic,
    pub sensitive_split: Dynamic,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconciledTables {
    pub merged: Vec<Dynamic>,
    pub sensitive_split: Vec<Dynamic>,
    pub planned: Vec<Dynamic>,
}

fn configuration_warning(detail: String) -> Diagnostic {
    Diagnostic::warning(CONFIGURATION_WARNING, detail)
        .with_attribute(AttributePath::new("configuration"))
}

/// Reconciles server fields against the declared cleartext and sensitive
/// fields. Planned views follow server order and only hold fields the
/// server returned.
pub fn reconcile_fields(
    server_fields: &[ConfigField],
    plan_fields: &[PlanField],
    plan_sensitive_fields: &[PlanSensitiveField],
    diagnostics: &mut Vec<Diagnostic>,
) -> ReconciledFields {
    let planned_values: HashMap<&str, Option<&str>> = plan_fields
        .iter()
        .map(|f| (f.name.as_str(), f.value.as_deref()))
        .collect();
    let planned_sensitive: HashMap<&str, &PlanSensitiveField> = plan_sensitive_fields
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect();

    let mut result = ReconciledFields::default();

    for field in server_fields {
        let server_value = field.value.as_deref();

        if let Some(plan_value) = planned_values.get(field.name.as_str()) {
            if field.is_encrypted() {
                diagnostics.push(configuration_warning(format!(
                    "Field with name {} was return encrypted by the PingFederate API. If the field is sensitive, move it to the `sensitive_fields` attribute.",
                    field.name
                )));
            }
            // An empty plan value that the server replaced with a default
            // keeps the plan value; the default shows up in fields_all
            let value = match (server_value, plan_value) {
                (None, plan) => plan.map(str::to_string),
                (Some(server), Some("")) if !server.is_empty() => Some(String::new()),
                (Some(server), _) => Some(server.to_string()),
            };
            result
                .planned_cleartext
                .push(field_object(&field.name, value));
        } else if let Some(plan) = planned_sensitive.get(field.name.as_str()) {
            if field.encrypted_value.is_none() && server_value.is_some_and(|v| !v.is_empty()) {
                diagnostics.push(configuration_warning(format!(
                    "Sensitive field with name {} was returned in cleartext by the PingFederate API. If the field is not sensitive, move it to the `fields` attribute.",
                    field.name
                )));
            }
            let value = field.value.clone().or_else(|| plan.value.clone());
            let encrypted_value = plan
                .encrypted_value
                .clone()
                .or_else(|| field.encrypted_value.clone());
            result.planned_sensitive.push(sensitive_field_object(
                &field.name,
                value,
                encrypted_value,
            ));
        }

        let merged = field_object(&field.name, field.value.clone());
        result.all_fields.push(merged.clone());
        if field.is_encrypted() {
            result.all_sensitive.push(sensitive_field_object(
                &field.name,
                field.value.clone(),
                field.encrypted_value.clone(),
            ));
        } else {
            result.all_cleartext.push(merged);
        }
    }

    result
}

fn merged_row(row: &ConfigRow, fields: Vec<Dynamic>) -> Dynamic {
    Dynamic::object([
        ("fields", Dynamic::List(fields)),
        ("default_row", Dynamic::optional_bool(row.default_row)),
    ])
}

fn split_row(row: &ConfigRow, fields: Vec<Dynamic>, sensitive_fields: Vec<Dynamic>) -> Dynamic {
    Dynamic::object([
        ("fields", Dynamic::List(fields)),
        ("sensitive_fields", Dynamic::List(sensitive_fields)),
        ("default_row", Dynamic::optional_bool(row.default_row)),
    ])
}

/// Reconciles the rows of table `table_name`. Server row `i` correlates with
/// plan row `i`; rows beyond the plan are read without plan context.
pub fn reconcile_rows(
    table_name: &str,
    server_rows: &[ConfigRow],
    plan_rows: Option<&[PlanRow]>,
    diagnostics: &mut Vec<Diagnostic>,
) -> ReconciledRows {
    let Some(plan_rows) = plan_rows else {
        if server_rows.is_empty() {
            return ReconciledRows {
                merged: Dynamic::Null,
                sensitive_split: Dynamic::Null,
            };
        }

        let mut merged = Vec::with_capacity(server_rows.len());
        let mut split = Vec::with_capacity(server_rows.len());
        for row in server_rows {
            let fields = reconcile_fields(&row.fields, &[], &[], diagnostics);
            merged.push(merged_row(row, fields.all_fields));
            split.push(split_row(row, fields.all_cleartext, fields.all_sensitive));
        }
        return ReconciledRows {
            merged: Dynamic::List(merged),
            sensitive_split: Dynamic::List(split),
        };
    };

    if plan_rows.len() != server_rows.len() {
        tracing::warn!(
            table = table_name,
            planned = plan_rows.len(),
            returned = server_rows.len(),
            "row count mismatch"
        );
        diagnostics.push(configuration_warning(format!(
            "Table {} has {} rows in the configuration but {} rows were returned by the PingFederate API. Rows are matched by position, so rows should not be added or removed outside of Terraform.",
            table_name,
            plan_rows.len(),
            server_rows.len()
        )));
    }

    let mut merged = Vec::with_capacity(server_rows.len());
    let mut split = Vec::with_capacity(server_rows.len());
    for (idx, row) in server_rows.iter().enumerate() {
        match plan_rows.get(idx) {
            Some(plan_row) => {
                let fields = reconcile_fields(
                    &row.fields,
                    &plan_row.fields,
                    &plan_row.sensitive_fields,
                    diagnostics,
                );
                merged.push(merged_row(row, fields.all_fields));
                split.push(split_row(
                    row,
                    fields.planned_cleartext,
                    fields.planned_sensitive,
                ));
            }
            None => {
                let fields = reconcile_fields(&row.fields, &[], &[], diagnostics);
                merged.push(merged_row(row, fields.all_fields));
                split.push(split_row(row, fields.all_cleartext, fields.all_sensitive));
            }
        }
    }

    ReconciledRows {
        merged: Dynamic::List(merged),
        sensitive_split: Dynamic::List(split),
    }
}

/// Reconciles server tables with planned tables, correlated by name
pub fn reconcile_tables(
    server_tables: &[ConfigTable],
    plan_tables: &[PlanTable],
    diagnostics: &mut Vec<Diagnostic>,
) -> ReconciledTables {
    let planned: HashMap<&str, &PlanTable> =
        plan_tables.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut result = ReconciledTables::default();
    for table in server_tables {
        let plan_table = planned.get(table.name.as_str());
        let plan_rows = plan_table.and_then(|t| t.rows.as_deref());

        let rows = reconcile_rows(&table.name, &table.rows, plan_rows, diagnostics);

        result.merged.push(Dynamic::object([
            ("name", Dynamic::string(&table.name)),
            ("rows", rows.merged),
        ]));
        let split = Dynamic::object([
            ("name", Dynamic::string(&table.name)),
            ("rows", rows.sensitive_split),
        ]);
        if plan_table.is_some() {
            result.planned.push(split.clone());
        }
        result.sensitive_split.push(split);
    }
    result
}

/// Builds the `configuration` state value from the server's configuration,
/// using `plan_configuration` (the prior plan or state) as context. Import
/// reads have no meaningful plan, so the declared attributes take the full
/// view.
pub fn to_state(
    plan_configuration: &Dynamic,
    configuration: &PluginConfiguration,
    is_import_read: bool,
) -> (Dynamic, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let plan = match PlanConfiguration::from_value(plan_configuration) {
        Ok(plan) => plan,
        Err(e) => {
            diagnostics.push(
                internal_error(format!("Failed to read planned configuration: {}", e))
                    .with_attribute(AttributePath::new("configuration")),
            );
            return (Dynamic::Null, diagnostics);
        }
    };

    let fields = reconcile_fields(
        &configuration.fields,
        &plan.fields,
        &plan.sensitive_fields,
        &mut diagnostics,
    );
    let tables = reconcile_tables(&configuration.tables, &plan.tables, &mut diagnostics);

    let (declared_fields, declared_sensitive, declared_tables) = if is_import_read {
        (fields.all_cleartext, fields.all_sensitive, tables.sensitive_split)
    } else {
        (
            fields.planned_cleartext,
            fields.planned_sensitive,
            tables.planned,
        )
    };

    let state = Dynamic::object([
        ("fields", Dynamic::List(declared_fields)),
        ("sensitive_fields", Dynamic::List(declared_sensitive)),
        ("fields_all", Dynamic::List(fields.all_fields)),
        ("tables", Dynamic::List(declared_tables)),
        ("tables_all", Dynamic::List(tables.merged)),
    ]);

    (state, diagnostics)
}

fn data_source_field(field: &ConfigField) -> Dynamic {
    Dynamic::object([
        ("name", Dynamic::string(&field.name)),
        ("value", Dynamic::optional_string(field.value.clone())),
        ("inherited", Dynamic::optional_bool(field.inherited)),
    ])
}

/// The read-only `configuration` value exposed by data sources
pub fn to_data_source_state(configuration: &PluginConfiguration) -> Dynamic {
    let fields: Vec<Dynamic> = configuration.fields.iter().map(data_source_field).collect();
    let tables = configuration
        .tables
        .iter()
        .map(|table| {
            let rows = table
                .rows
                .iter()
                .map(|row| {
                    Dynamic::object([
                        (
                            "fields",
                            Dynamic::List(row.fields.iter().map(data_source_field).collect()),
                        ),
                        ("default_row", Dynamic::optional_bool(row.default_row)),
                    ])
                })
                .collect();
            Dynamic::object([
                ("name", Dynamic::string(&table.name)),
                ("inherited", Dynamic::optional_bool(table.inherited)),
                ("rows", Dynamic::List(rows)),
            ])
        })
        .collect();

    Dynamic::object([
        ("fields", Dynamic::List(fields.clone())),
        ("fields_all", Dynamic::List(fields)),
        ("tables", Dynamic::List(tables)),
    ])
}
