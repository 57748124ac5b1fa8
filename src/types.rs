//! Core types for parameter declarations.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParamError;

/// Suffix marking an array of the named element type (`Integer[]`).
pub const ARRAY_SUFFIX: &str = "[]";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders a value for human-readable messages: strings without quotes,
/// everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn default_format() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_true(b: &bool) -> bool {
    *b
}

/// Declarative description of one field.
///
/// ```
/// use param_schema::Descriptor;
/// use serde_json::json;
///
/// let d = Descriptor::new("Integer")
///     .required()
///     .params(json!({ "min": 1, "max": 100 }));
/// assert_eq!(d.type_name, "Integer");
/// assert!(d.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// When false, the checker runs but the raw value is passed through.
    #[serde(default = "default_format", skip_serializing_if = "is_true")]
    pub format: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Descriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            required: false,
            default: None,
            params: None,
            format: true,
            comment: None,
        }
    }

    /// Shorthand for `Descriptor::new(format!("{element}[]"))`.
    pub fn array_of(element: &str) -> Self {
        Self::new(format!("{element}{ARRAY_SUFFIX}"))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Parse a descriptor from its JSON form.
    pub fn from_json(name: &str, value: &Value) -> Result<Self, ParamError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ParamError::internal(format!("invalid descriptor for parameter '{name}': {e}"))
        })
    }

    /// True if the JSON value has the shape of a descriptor: an object with
    /// a string `type`.
    pub fn looks_like(value: &Value) -> bool {
        value
            .as_object()
            .and_then(|map| map.get("type"))
            .map(Value::is_string)
            .unwrap_or(false)
    }
}

/// Ordered mapping of field name to [`Descriptor`] for one request location.
///
/// Insertion order only affects documentation. Duplicate names are kept so
/// the compiler can reject them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorRecord {
    fields: Vec<(String, Descriptor)>,
}

impl DescriptorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn field(mut self, name: impl Into<String>, descriptor: Descriptor) -> Self {
        self.insert(name, descriptor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: Descriptor) {
        self.fields.push((name.into(), descriptor));
    }

    pub fn extend(&mut self, other: DescriptorRecord) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a record whose every value is a descriptor object.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self, ParamError> {
        let mut record = Self::new();
        for (name, value) in map {
            record.insert(name.clone(), Descriptor::from_json(name, value)?);
        }
        Ok(record)
    }

    pub(crate) fn map_names(self, f: impl Fn(&str) -> String) -> Self {
        Self {
            fields: self
                .fields
                .into_iter()
                .map(|(n, d)| (f(&n), d))
                .collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, Descriptor)> for DescriptorRecord {
    fn from_iter<T: IntoIterator<Item = (S, Descriptor)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(n, d)| (n.into(), d)).collect(),
        }
    }
}

/// Where in a request a group of parameters lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Params,
    Query,
    Body,
    Headers,
}

impl Location {
    /// All locations, in merge order.
    pub const ALL: [Location; 4] = [
        Location::Params,
        Location::Query,
        Location::Body,
        Location::Headers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Params => "params",
            Location::Query => "query",
            Location::Body => "body",
            Location::Headers => "headers",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "HEAD")]
    Head,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "PUT")]
    Put,
    #[serde(alias = "PATCH")]
    Patch,
    #[serde(alias = "DELETE")]
    Delete,
    #[serde(alias = "OPTIONS")]
    Options,
}

impl Method {
    /// Parse a method name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Method::Get),
            "head" => Some(Method::Head),
            "post" => Some(Method::Post),
            "put" => Some(Method::Put),
            "patch" => Some(Method::Patch),
            "delete" => Some(Method::Delete),
            "options" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
