//! Operation definitions loaded from JSON documents.
//!
//! ```json
//! {
//!   "method": "post",
//!   "path": "/users",
//!   "title": "Create a user",
//!   "schemas": { "Address": { "city": { "type": "String", "required": true } } },
//!   "body": {
//!     "name": { "type": "TrimString", "required": true },
//!     "address": { "type": "Address" }
//!   },
//!   "headers": { "$schema": "https://json-schema.org/draft/2020-12/schema", "type": "object" },
//!   "required": ["name"],
//!   "requiredOneOf": [["email", "phone"]]
//! }
//! ```
//!
//! Each location holds either a descriptor record or a JSON Schema; see
//! [`SchemaInput::from_json`]. `schemas` are registered as custom object
//! types, in document order, before the locations compile.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::compiler::{CompileOptions, SchemaInput};
use crate::error::{LoadError, ParamError};
use crate::operation::Operation;
use crate::registry::TypeRegistry;
use crate::types::{DescriptorRecord, Location, Method};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperationDefinition {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub schemas: Map<String, Value>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: Option<Value>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub required_one_of: Vec<Vec<String>>,
}

impl OperationDefinition {
    /// Parse a definition document.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDefinition` if the document does not have
    /// the definition shape.
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        serde_json::from_value(value.clone())
            .map_err(|source| LoadError::InvalidDefinition { source })
    }

    fn location(&self, location: Location) -> Option<&Value> {
        match location {
            Location::Params => self.params.as_ref(),
            Location::Query => self.query.as_ref(),
            Location::Body => self.body.as_ref(),
            Location::Headers => self.headers.as_ref(),
        }
    }

    /// Register the definition's custom schemas, then build and seal the
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns `ParamError::Internal` for any declaration mistake.
    pub fn build(
        &self,
        registry: &mut TypeRegistry,
        options: &CompileOptions,
    ) -> Result<Operation, ParamError> {
        for (name, value) in &self.schemas {
            let record = match value {
                Value::Object(map) => DescriptorRecord::from_json(map)?,
                _ => {
                    return Err(ParamError::internal(format!(
                        "schema '{name}' must be a descriptor record"
                    )))
                }
            };
            registry.register_schema(name, &record)?;
        }

        let mut operation = Operation::new(self.method, self.path.clone());
        if let Some(title) = &self.title {
            operation.title(title.clone())?;
        }
        for location in Location::ALL {
            if let Some(value) = self.location(location) {
                operation.input(location, SchemaInput::from_json(value)?)?;
            }
        }
        operation.required(self.required.iter().cloned())?;
        for group in &self.required_one_of {
            operation.required_one_of(group.iter().cloned())?;
        }
        operation.seal_with(registry, options)?;
        Ok(operation)
    }
}
