//! Plan-time handling of the computed `fields_all` and `tables_all`
//! attributes and of unset encrypted values

use std::collections::HashMap;
use tfplug::types::Dynamic;

const FIELDS_ALL: &str = "fields_all";
const TABLES_ALL: &str = "tables_all";
const SENSITIVE_FIELDS: &str = "sensitive_fields";
const ENCRYPTED_VALUE: &str = "encrypted_value";

fn is_defined(value: &Dynamic) -> bool {
    value.known().is_some()
}

fn attr_or_null<'a>(value: &'a Dynamic, name: &str) -> &'a Dynamic {
    value.attr(name).unwrap_or(&Dynamic::Null)
}

fn set_attr(configuration: &mut Dynamic, name: &str, value: Dynamic) {
    if let Dynamic::Map(attributes) = configuration {
        attributes.insert(name.to_string(), value);
    }
}

/// Carries the prior `fields_all` and `tables_all` into a plan that left
/// them unset. Nested computed attributes are not planned from state by the
/// framework.
pub fn use_state_for_computed_attrs(plan: &mut Dynamic, state: &Dynamic) {
    if !is_defined(plan) || !is_defined(state) {
        return;
    }
    for name in [FIELDS_ALL, TABLES_ALL] {
        if is_defined(attr_or_null(plan, name)) {
            continue;
        }
        if let Some(prior) = state.attr(name).and_then(Dynamic::known) {
            let prior = prior.clone();
            set_attr(plan, name, prior);
        }
    }
}

/// Plans `encrypted_value` for sensitive fields that leave it unset, at the
/// top level and in every table row. A field whose value is unchanged from
/// the prior element of the same name keeps the prior encrypted value; any
/// other field is encrypted by the server, so its encrypted value is
/// unknown. Tables correlate by name and rows by position.
pub fn plan_encrypted_values(plan: &mut Dynamic, state: &Dynamic) {
    if !is_defined(plan) {
        return;
    }
    plan_sensitive_fields(plan, attr_or_null(state, SENSITIVE_FIELDS));

    let state_tables = list(attr_or_null(state, "tables"));
    let Some(Dynamic::List(tables)) = attr_mut(plan, "tables") else {
        return;
    };
    for table in tables {
        let name = table.attr("name").and_then(Dynamic::as_str).map(str::to_string);
        let prior_rows = name
            .and_then(|name| {
                state_tables
                    .iter()
                    .find(|t| t.attr("name").and_then(Dynamic::as_str) == Some(name.as_str()))
            })
            .map(|t| list(attr_or_null(t, "rows")))
            .unwrap_or_default();
        let Some(Dynamic::List(rows)) = attr_mut(table, "rows") else {
            continue;
        };
        for (idx, row) in rows.iter_mut().enumerate() {
            let prior = prior_rows
                .get(idx)
                .map_or(&Dynamic::Null, |r| attr_or_null(r, SENSITIVE_FIELDS));
            plan_sensitive_fields(row, prior);
        }
    }
}

fn attr_mut<'a>(value: &'a mut Dynamic, name: &str) -> Option<&'a mut Dynamic> {
    match value {
        Dynamic::Map(attributes) => attributes.get_mut(name),
        _ => None,
    }
}

fn plan_sensitive_fields(object: &mut Dynamic, prior_fields: &Dynamic) {
    let Some(Dynamic::List(fields)) = attr_mut(object, SENSITIVE_FIELDS) else {
        return;
    };
    for field in fields {
        if !attr_or_null(field, ENCRYPTED_VALUE).is_null() {
            continue;
        }
        let Some(name) = field.attr("name").and_then(Dynamic::as_str) else {
            continue;
        };
        let planned = list(prior_fields)
            .iter()
            .find(|prior| prior.attr("name").and_then(Dynamic::as_str) == Some(name))
            .filter(|prior| prior.attr("value") == field.attr("value"))
            .map_or(Dynamic::Unknown, |prior| {
                attr_or_null(prior, ENCRYPTED_VALUE).clone()
            });
        set_attr(field, ENCRYPTED_VALUE, planned);
    }
}

/// Marks both computed attributes unknown, as on create
pub fn mark_computed_attrs_unknown(plan: &mut Dynamic) {
    if !is_defined(plan) {
        return;
    }
    set_attr(plan, FIELDS_ALL, Dynamic::Unknown);
    set_attr(plan, TABLES_ALL, Dynamic::Unknown);
}

/// Marks the computed attributes unknown when the declared attributes they
/// summarize have changed, or when the prior `tables_all` holds rows that
/// no planned table accounts for.
pub fn mark_computed_attrs_unknown_on_change(plan: &mut Dynamic, state: &Dynamic) {
    if !is_defined(plan) || !is_defined(state) {
        return;
    }

    if !attr_or_null(plan, "fields").set_equal(attr_or_null(state, "fields")) {
        set_attr(plan, FIELDS_ALL, Dynamic::Unknown);
    }

    let plan_tables = attr_or_null(plan, "tables");
    let tables_changed = !tables_equal(plan_tables, attr_or_null(state, "tables"));
    if tables_changed || has_unmatched_table_rows(plan_tables, attr_or_null(state, TABLES_ALL)) {
        set_attr(plan, TABLES_ALL, Dynamic::Unknown);
    }
}

fn list(value: &Dynamic) -> &[Dynamic] {
    value.try_as_list().unwrap_or_default()
}

fn row_count(table: &Dynamic) -> usize {
    table.attr("rows").map_or(0, |rows| list(rows).len())
}

/// True when some prior `tables_all` table with rows has no planned table of
/// the same name declaring the same number of rows
fn has_unmatched_table_rows(plan_tables: &Dynamic, tables_all: &Dynamic) -> bool {
    let mut with_rows: HashMap<&str, (usize, bool)> = list(tables_all)
        .iter()
        .filter_map(|table| {
            let count = row_count(table);
            let name = table.attr("name").and_then(Dynamic::as_str)?;
            (count > 0).then_some((name, (count, false)))
        })
        .collect();

    for table in list(plan_tables) {
        let Some(name) = table.attr("name").and_then(Dynamic::as_str) else {
            continue;
        };
        if let Some((count, matched)) = with_rows.get_mut(name) {
            if *count == row_count(table) {
                *matched = true;
            }
        }
    }

    with_rows.values().any(|(_, matched)| !matched)
}

/// Table lists are ordered; the fields inside each row are sets
fn tables_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| table_equal(a, b))
        }
        _ => a == b,
    }
}

fn table_equal(a: &Dynamic, b: &Dynamic) -> bool {
    if a.attr("name") != b.attr("name") {
        return false;
    }
    match (attr_or_null(a, "rows"), attr_or_null(b, "rows")) {
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| row_equal(a, b))
        }
        (a, b) => a == b,
    }
}

fn row_equal(a: &Dynamic, b: &Dynamic) -> bool {
    attr_or_null(a, "fields").set_equal(attr_or_null(b, "fields"))
        && attr_or_null(a, "sensitive_fields").set_equal(attr_or_null(b, "sensitive_fields"))
        && a.attr("default_row") == b.attr("default_row")
}
