//! Typed view of a `configuration` plan or state value

use tfplug::types::Dynamic;
use tfplug::{Result, TfplugError};

/// A declared cleartext field. `value` is `None` when null or unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanField {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanSensitiveField {
    pub name: String,
    pub value: Option<String>,
    pub encrypted_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanRow {
    pub fields: Vec<PlanField>,
    pub sensitive_fields: Vec<PlanSensitiveField>,
    pub default_row: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanTable {
    pub name: String,
    /// `None` when the table declares no rows
    pub rows: Option<Vec<PlanRow>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanConfiguration {
    pub fields: Vec<PlanField>,
    pub sensitive_fields: Vec<PlanSensitiveField>,
    pub tables: Vec<PlanTable>,
}

impl PlanField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl PlanConfiguration {
    /// Decodes a configuration object. Null or unknown collections read as
    /// empty, a null or unknown configuration as an empty plan.
    pub fn from_value(value: &Dynamic) -> Result<Self> {
        let Some(value) = value.known() else {
            return Ok(Self::default());
        };
        value.try_as_map()?;

        Ok(Self {
            fields: fields_from(value.attr("fields"))?,
            sensitive_fields: sensitive_fields_from(value.attr("sensitive_fields"))?,
            tables: elements(value.attr("tables"))?
                .iter()
                .filter_map(|table| table_from(table).transpose())
                .collect::<Result<_>>()?,
        })
    }

    /// Every declared field name, cleartext and sensitive
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.sensitive_fields.iter().map(|f| f.name.as_str()))
    }

    pub fn table(&self, name: &str) -> Option<&PlanTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl PlanRow {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.sensitive_fields.iter().map(|f| f.name.as_str()))
    }
}

/// Elements of a list or set attribute; missing, null and unknown are empty
fn elements(value: Option<&Dynamic>) -> Result<&[Dynamic]> {
    match value.and_then(Dynamic::known) {
        Some(v) => v.try_as_list(),
        None => Ok(&[]),
    }
}

fn optional_string(object: &Dynamic, name: &str) -> Result<Option<String>> {
    match object.attr(name).and_then(Dynamic::known) {
        Some(v) => Ok(Some(v.try_as_str()?.to_string())),
        None => Ok(None),
    }
}

fn optional_bool(object: &Dynamic, name: &str) -> Result<Option<bool>> {
    match object.attr(name).and_then(Dynamic::known) {
        Some(v) => Ok(Some(v.try_as_bool()?)),
        None => Ok(None),
    }
}

/// Objects whose name is not known yet cannot be correlated and are skipped
fn known_name(object: &Dynamic) -> Result<Option<String>> {
    object.try_as_map()?;
    optional_string(object, "name")
}

fn fields_from(value: Option<&Dynamic>) -> Result<Vec<PlanField>> {
    let mut fields = Vec::new();
    for field in elements(value)? {
        if let Some(name) = known_name(field)? {
            fields.push(PlanField {
                name,
                value: optional_string(field, "value")?,
            });
        }
    }
    Ok(fields)
}

fn sensitive_fields_from(value: Option<&Dynamic>) -> Result<Vec<PlanSensitiveField>> {
    let mut fields = Vec::new();
    for field in elements(value)? {
        if let Some(name) = known_name(field)? {
            fields.push(PlanSensitiveField {
                name,
                value: optional_string(field, "value")?,
                encrypted_value: optional_string(field, "encrypted_value")?,
            });
        }
    }
    Ok(fields)
}

fn row_from(row: &Dynamic) -> Result<PlanRow> {
    if row.is_unknown() {
        return Ok(PlanRow::default());
    }
    row.try_as_map()?;
    Ok(PlanRow {
        fields: fields_from(row.attr("fields"))?,
        sensitive_fields: sensitive_fields_from(row.attr("sensitive_fields"))?,
        default_row: optional_bool(row, "default_row")?,
    })
}

fn table_from(table: &Dynamic) -> Result<Option<PlanTable>> {
    let Some(name) = known_name(table)? else {
        return Ok(None);
    };
    let rows = match table.attr("rows") {
        None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => None,
        Some(Dynamic::List(rows)) => Some(rows.iter().map(row_from).collect::<Result<_>>()?),
        Some(other) => {
            return Err(TfplugError::type_mismatch("list", other.type_name()));
        }
    };
    Ok(Some(PlanTable { name, rows }))
}
