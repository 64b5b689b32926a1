//! Core type system for tfplug
//!
//! Dynamic values, attribute paths, diagnostics and private state.

use crate::error::{Result, TfplugError};
use crate::schema::AttributeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Dynamic represents Terraform values that can be of any type.
/// Objects are represented as maps and both lists and sets as lists.
/// Prefer the `try_as_*` accessors over matching on variants directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    List(Vec<Dynamic>),
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    /// Builds an object value from attribute name/value pairs
    pub fn object<'a, I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Dynamic)>,
    {
        Dynamic::Map(
            attributes
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn string(value: impl Into<String>) -> Self {
        Dynamic::String(value.into())
    }

    /// `None` becomes null
    pub fn optional_string(value: Option<String>) -> Self {
        value.map_or(Dynamic::Null, Dynamic::String)
    }

    pub fn optional_bool(value: Option<bool>) -> Self {
        value.map_or(Dynamic::Null, Dynamic::Bool)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "object",
            Dynamic::Unknown => "unknown",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// Returns the value only when it is neither null nor unknown
    pub fn known(&self) -> Option<&Dynamic> {
        match self {
            Dynamic::Null | Dynamic::Unknown => None,
            other => Some(other),
        }
    }

    /// Looks up an attribute of an object value
    pub fn attr(&self, name: &str) -> Option<&Dynamic> {
        match self {
            Dynamic::Map(m) => m.get(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Dynamic::String(s) => Ok(s),
            other => Err(TfplugError::type_mismatch("string", other.type_name())),
        }
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Dynamic::Bool(b) => Ok(*b),
            other => Err(TfplugError::type_mismatch("bool", other.type_name())),
        }
    }

    pub fn try_as_list(&self) -> Result<&[Dynamic]> {
        match self {
            Dynamic::List(l) => Ok(l),
            other => Err(TfplugError::type_mismatch("list", other.type_name())),
        }
    }

    pub fn try_as_map(&self) -> Result<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Ok(m),
            other => Err(TfplugError::type_mismatch("object", other.type_name())),
        }
    }

    /// Compares two collection values ignoring element order, the way
    /// Terraform compares sets. Non-list values fall back to plain equality.
    pub fn set_equal(&self, other: &Dynamic) -> bool {
        match (self, other) {
            (Dynamic::List(a), Dynamic::List(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut matched = vec![false; b.len()];
                a.iter().all(|item| {
                    let found = b
                        .iter()
                        .enumerate()
                        .find(|(idx, candidate)| !matched[*idx] && *candidate == item);
                    match found {
                        Some((idx, _)) => {
                            matched[idx] = true;
                            true
                        }
                        None => false,
                    }
                })
            }
            _ => self == other,
        }
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Dynamic::Null, Dynamic::Number),
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from).collect())
            }
            serde_json::Value::Object(map) => Dynamic::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Dynamic::from(v)))
                    .collect(),
            ),
        }
    }
}

// Terraform encodes unknown values as msgpack extension 0 with one zero byte
const UNKNOWN_EXT_TYPE: i8 = 0;

struct UnknownExtData;

impl Serialize for UnknownExtData {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&[0])
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            // Whole numbers go out as integers so ids and ports stay exact
            Dynamic::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                serializer.serialize_i64(*n as i64)
            }
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_newtype_struct(
                rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                &(UNKNOWN_EXT_TYPE, UnknownExtData),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, IgnoredAny, Visitor};

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a Terraform value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value))
            }

            // msgpack extensions only carry unknown values, refined or not
            fn visit_newtype_struct<D>(self, ext: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                IgnoredAny::deserialize(ext)?;
                Ok(Dynamic::Unknown)
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Dynamic::List(items))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut values = HashMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Dynamic>()? {
                    values.insert(key, value);
                }
                Ok(Dynamic::Map(values))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// DynamicValue wraps a root Dynamic and provides path based access.
/// This is what gets passed between Terraform and the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    /// Encodes the value for the wire. Terraform decodes msgpack against the
    /// schema type, so objects are written with exactly the attributes the
    /// type declares.
    pub fn encode_msgpack(&self, type_: &AttributeType) -> Result<Vec<u8>> {
        let value = type_.conform(&self.value)?;
        rmp_serde::encode::to_vec(&value)
            .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))
    }

    /// Empty input decodes to null
    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        rmp_serde::decode::from_slice(data)
            .map(Self::new)
            .map_err(|e| TfplugError::DecodingError(format!("msgpack decoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        serde_json::from_slice::<serde_json::Value>(data)
            .map(|value| Self::new(Dynamic::from(value)))
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))
    }

    /// Returns the raw value at a path
    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        self.navigate_path(path)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        self.navigate_path(path)?.try_as_str().map(str::to_string)
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        match self.navigate_path(path)? {
            Dynamic::Number(n) => Ok(*n),
            other => Err(TfplugError::type_mismatch("number", other.type_name())),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        self.navigate_path(path)?.try_as_bool()
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        self.navigate_path(path)?.try_as_list().map(<[Dynamic]>::to_vec)
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        self.navigate_path(path)?.try_as_map().cloned()
    }

    /// Missing, null and unknown attributes read as `None`; a value of the
    /// wrong type is still an error.
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        match self.navigate_path(path) {
            Ok(value) => value
                .known()
                .map(|v| v.try_as_str().map(str::to_string))
                .transpose(),
            Err(TfplugError::AttributeNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_optional_bool(&self, path: &AttributePath) -> Result<Option<bool>> {
        match self.navigate_path(path) {
            Ok(value) => value.known().map(Dynamic::try_as_bool).transpose(),
            Err(TfplugError::AttributeNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(name.clone()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = usize::try_from(*idx)
                        .map_err(|_| TfplugError::InvalidPath(path.to_string()))?;
                    l.get(idx).ok_or(TfplugError::IndexOutOfBounds(idx))?
                }
                // An absent object has no attributes
                (Dynamic::Null, AttributePathStep::AttributeName(name)) => {
                    return Err(TfplugError::AttributeNotFound(name.clone()))
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        Ok(current)
    }

    /// Sets a value, creating intermediate objects along the path
    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let next = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if next.is_null() {
                        *next = match path.steps.get(idx + 1) {
                            Some(AttributePathStep::ElementKeyInt(_)) => Dynamic::List(Vec::new()),
                            _ => Dynamic::Map(HashMap::new()),
                        };
                    }
                    next
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                    let i = usize::try_from(*i)
                        .map_err(|_| TfplugError::InvalidPath(path.to_string()))?;
                    l.get_mut(i).ok_or(TfplugError::IndexOutOfBounds(i))?
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                let i =
                    usize::try_from(*i).map_err(|_| TfplugError::InvalidPath(path.to_string()))?;
                let slot = l.get_mut(i).ok_or(TfplugError::IndexOutOfBounds(i))?;
                *slot = new_value;
                Ok(())
            }
            _ => Err(TfplugError::InvalidPath(path.to_string())),
        }
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[\"{}\"]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Provider-specific data stored alongside state but not visible to users.
/// Encoded with msgpack so Terraform can carry it as opaque bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateStateData {
    data: HashMap<String, Vec<u8>>,
}

impl PrivateStateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_key(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(|v| v.as_slice())
    }

    pub fn set_key(&mut self, key: &str, value: Vec<u8>) {
        self.data.insert(key.to_string(), value);
    }

    pub fn remove_key(&mut self, key: &str) {
        self.data.remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.data.is_empty() {
            return Ok(Vec::new());
        }
        rmp_serde::encode::to_vec(self).map_err(|e| {
            TfplugError::EncodingError(format!("private state encoding failed: {}", e))
        })
    }

    /// Empty input decodes to empty private state
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::new());
        }
        rmp_serde::decode::from_slice(data).map_err(|e| {
            TfplugError::DecodingError(format!("private state decoding failed: {}", e))
        })
    }
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Returns true when any diagnostic is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// ClientCapabilities indicates Terraform client capabilities
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}
