//! Native schemas: validation objects authored outside the descriptor
//! format.
//!
//! The engine only talks to them through [`Parseable`]. Two adapters ship
//! with the crate: [`JsonSchema`] wraps a `jsonschema` validator and
//! [`FnSchema`] wraps a closure.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ParamError;
use crate::translate;

/// One step in the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Classification of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    /// A required value is absent.
    Missing,
    /// The value has the wrong type.
    InvalidType,
    /// The value has the right type but breaks a constraint.
    Constraint,
}

/// A single failure reported by a native schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: Vec<PathSegment>,
    pub code: IssueCode,
    /// Expected type, when the schema declares one.
    pub expected: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn new(code: IssueCode, path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            code,
            expected: None,
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{field} is required");
        Self::new(IssueCode::Missing, vec![PathSegment::Key(field)], message)
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Render the path as `a.b[2].c`.
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }

    /// The top-level field the issue belongs to, if any.
    pub fn field(&self) -> Option<&str> {
        match self.path.first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }
}

pub(crate) fn render_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(k) if out.is_empty() => out.push_str(k),
            PathSegment::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            PathSegment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Capability every native schema adapter provides.
pub trait Parseable: fmt::Debug + Send + Sync {
    /// Validate and normalize `input`.
    fn parse(&self, input: &Value) -> Result<Value, Vec<Issue>>;

    /// Documentation view of the schema.
    fn describe(&self) -> Value {
        Value::Null
    }
}

/// JSON Schema adapter backed by the `jsonschema` crate.
///
/// Before validating an object input, declared top-level `default`s are
/// filled in for absent properties.
pub struct JsonSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile a JSON Schema.
    ///
    /// # Errors
    ///
    /// Returns `ParamError::Internal` if the schema itself is invalid.
    pub fn new(schema: Value) -> Result<Self, ParamError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| ParamError::internal(format!("invalid native schema: {e}")))?;
        Ok(Self { schema, validator })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn into_parseable(self) -> Arc<dyn Parseable> {
        Arc::new(self)
    }

    fn with_defaults(&self, input: &Value) -> Value {
        let (Value::Object(map), Some(props)) = (
            input,
            self.schema.get("properties").and_then(Value::as_object),
        ) else {
            return input.clone();
        };
        let mut out: Map<String, Value> = map.clone();
        for (name, prop) in props {
            if out.contains_key(name) {
                continue;
            }
            if let Some(default) = prop.get("default") {
                out.insert(name.clone(), default.clone());
            }
        }
        Value::Object(out)
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Parseable for JsonSchema {
    fn parse(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        let value = self.with_defaults(input);
        let issues: Vec<Issue> = self
            .validator
            .iter_errors(&value)
            .map(|e| translate::issue_from_json_schema(&self.schema, &value, &e))
            .collect();
        if issues.is_empty() {
            Ok(value)
        } else {
            Err(issues)
        }
    }

    fn describe(&self) -> Value {
        self.schema.clone()
    }
}

type ParseFn = dyn Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync;

/// Closure adapter for hand-written native schemas.
///
/// ```
/// use param_schema::{FnSchema, Issue, Parseable};
/// use serde_json::json;
///
/// let schema = FnSchema::new(|v| match v.get("token") {
///     Some(t) if t.is_string() => Ok(json!({ "token": t })),
///     _ => Err(vec![Issue::missing("token")]),
/// });
/// assert!(schema.parse(&json!({ "token": "abc" })).is_ok());
/// ```
pub struct FnSchema {
    parse: Box<ParseFn>,
    description: Value,
}

impl FnSchema {
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync + 'static,
    {
        Self {
            parse: Box::new(parse),
            description: Value::Null,
        }
    }

    pub fn description(mut self, description: Value) -> Self {
        self.description = description;
        self
    }
}

impl fmt::Debug for FnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSchema")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Parseable for FnSchema {
    fn parse(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        (self.parse)(input)
    }

    fn describe(&self) -> Value {
        self.description.clone()
    }
}
