//! Operations: per-location parameter schemas plus operation-wide
//! required sets, sealed once and then validated per request.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::compiler::{compile_with, CompileOptions, CompiledSchema, SchemaInput, SchemaKind};
use crate::error::ParamError;
use crate::native::Parseable;
use crate::registry::TypeRegistry;
use crate::types::{DescriptorRecord, Location, Method};
use crate::validator::{check_one_of, run_group};

/// Raw request inputs, one value per location. Absent locations are `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationInputs {
    pub params: Value,
    pub query: Value,
    pub body: Value,
    pub headers: Value,
}

impl OperationInputs {
    pub fn get(&self, location: Location) -> &Value {
        match location {
            Location::Params => &self.params,
            Location::Query => &self.query,
            Location::Body => &self.body,
            Location::Headers => &self.headers,
        }
    }
}

/// Accumulated, not yet compiled, input for one location.
#[derive(Debug, Clone)]
enum GroupInput {
    Descriptors(DescriptorRecord),
    Native(Arc<dyn Parseable>),
}

impl GroupInput {
    fn kind(&self) -> SchemaKind {
        match self {
            GroupInput::Descriptors(_) => SchemaKind::Descriptor,
            GroupInput::Native(_) => SchemaKind::Native,
        }
    }

    fn to_schema_input(&self) -> SchemaInput {
        match self {
            GroupInput::Descriptors(record) => SchemaInput::Descriptors(record.clone()),
            GroupInput::Native(schema) => SchemaInput::Native(Arc::clone(schema)),
        }
    }
}

/// A declared operation.
///
/// Declare inputs, then [`seal`](Operation::seal) it against a registry.
/// Sealing compiles every location once; afterwards the operation only
/// validates, and any further declaration fails with `Internal`.
///
/// ```
/// use param_schema::{Descriptor, DescriptorRecord, Method, Operation, OperationInputs, TypeRegistry};
/// use serde_json::json;
///
/// let mut op = Operation::new(Method::Get, "/users/:id");
/// op.params(DescriptorRecord::new().field("id", Descriptor::new("Integer").required()))
///     .unwrap();
/// op.seal(&TypeRegistry::new()).unwrap();
///
/// let inputs = OperationInputs { params: json!({ "id": "7" }), ..Default::default() };
/// let merged = op.validate_inputs(&inputs).unwrap();
/// assert_eq!(merged["id"], json!(7));
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    method: Method,
    path: String,
    title: Option<String>,
    groups: BTreeMap<Location, GroupInput>,
    required: Vec<String>,
    required_one_of: Vec<Vec<String>>,
    compiled: Option<BTreeMap<Location, CompiledSchema>>,
    /// Declared header names, canonical spelling, filled at seal.
    header_names: Vec<String>,
}

impl Operation {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            title: None,
            groups: BTreeMap::new(),
            required: Vec::new(),
            required_one_of: Vec::new(),
            compiled: None,
            header_names: Vec::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `"GET /users/:id"`.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn is_sealed(&self) -> bool {
        self.compiled.is_some()
    }

    fn ensure_open(&self) -> Result<(), ParamError> {
        if self.is_sealed() {
            return Err(ParamError::internal(format!(
                "operation {} is sealed and cannot be modified",
                self.key()
            )));
        }
        Ok(())
    }

    pub fn title(&mut self, title: impl Into<String>) -> Result<&mut Self, ParamError> {
        self.ensure_open()?;
        self.title = Some(title.into());
        Ok(self)
    }

    /// Declare input for a location.
    ///
    /// Descriptor records accumulate across calls. A location holds either
    /// descriptors or a single native schema, never both.
    pub fn input(
        &mut self,
        location: Location,
        input: impl Into<SchemaInput>,
    ) -> Result<&mut Self, ParamError> {
        self.ensure_open()?;
        let input = input.into();
        let key = self.key();

        let Some(existing) = self.groups.get_mut(&location) else {
            let group = match input {
                SchemaInput::Descriptors(record) => GroupInput::Descriptors(record),
                SchemaInput::Native(schema) => GroupInput::Native(schema),
            };
            self.groups.insert(location, group);
            return Ok(self);
        };

        match (existing, input) {
            (GroupInput::Descriptors(existing), SchemaInput::Descriptors(record)) => {
                existing.extend(record);
            }
            (existing, input) => {
                let message = if existing.kind() == input.kind() {
                    format!("native schema for {location} of {key} is already set")
                } else {
                    format!(
                        "cannot mix descriptor and native schema representations for {location} of {key}"
                    )
                };
                return Err(ParamError::internal(message));
            }
        }
        Ok(self)
    }

    pub fn params(&mut self, input: impl Into<SchemaInput>) -> Result<&mut Self, ParamError> {
        self.input(Location::Params, input)
    }

    pub fn query(&mut self, input: impl Into<SchemaInput>) -> Result<&mut Self, ParamError> {
        self.input(Location::Query, input)
    }

    pub fn body(&mut self, input: impl Into<SchemaInput>) -> Result<&mut Self, ParamError> {
        self.input(Location::Body, input)
    }

    /// Header names are matched case-insensitively.
    pub fn headers(&mut self, input: impl Into<SchemaInput>) -> Result<&mut Self, ParamError> {
        self.input(Location::Headers, input)
    }

    /// Fields that must be present in the merged output.
    pub fn required<I, S>(&mut self, names: I) -> Result<&mut Self, ParamError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open()?;
        for name in names {
            let name = name.into();
            if !self.required.contains(&name) {
                self.required.push(name);
            }
        }
        Ok(self)
    }

    /// At least one of `names` must be present in the merged output.
    pub fn required_one_of<I, S>(&mut self, names: I) -> Result<&mut Self, ParamError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open()?;
        let group: Vec<String> = names.into_iter().map(Into::into).collect();
        if group.is_empty() {
            return Err(ParamError::internal(format!(
                "required-one-of group for {} must not be empty",
                self.key()
            )));
        }
        self.required_one_of.push(group);
        Ok(self)
    }

    /// Compile every location with default options.
    pub fn seal(&mut self, registry: &TypeRegistry) -> Result<(), ParamError> {
        self.seal_with(registry, &CompileOptions::default())
    }

    /// Compile every location. Fails if already sealed or if any location
    /// does not compile; on failure the operation stays open.
    ///
    /// Operation-wide `required` and one-of names that match a declared
    /// header (ignoring case) are rewritten to the header's spelling.
    pub fn seal_with(
        &mut self,
        registry: &TypeRegistry,
        options: &CompileOptions,
    ) -> Result<(), ParamError> {
        self.ensure_open()?;

        let mut compiled = BTreeMap::new();
        for (&location, group) in &self.groups {
            let input = match (location, group) {
                (Location::Headers, GroupInput::Descriptors(record)) => {
                    SchemaInput::Descriptors(record.clone().map_names(|n| n.to_ascii_lowercase()))
                }
                _ => group.to_schema_input(),
            };
            let schema = compile_with(registry, &input, options).map_err(|e| match e {
                ParamError::Internal { message } => ParamError::internal(format!(
                    "{message} in {location} of {}",
                    self.key()
                )),
                other => other,
            })?;
            compiled.insert(location, schema);
        }

        let header_names = compiled
            .get(&Location::Headers)
            .map(declared_names)
            .unwrap_or_default();
        let names = self
            .required
            .iter_mut()
            .chain(self.required_one_of.iter_mut().flatten());
        for name in names {
            if let Some(header) = find_ignore_case(&header_names, name) {
                *name = header.to_string();
            }
        }
        let mut seen = BTreeSet::new();
        self.required.retain(|n| seen.insert(n.clone()));
        self.header_names = header_names;

        tracing::debug!(
            operation = %self.key(),
            locations = compiled.len(),
            required = self.required.len(),
            one_of = self.required_one_of.len(),
            "sealed operation"
        );
        self.compiled = Some(compiled);
        Ok(())
    }

    /// The compiled schema for a location, once sealed.
    pub fn schema(&self, location: Location) -> Option<&CompiledSchema> {
        self.compiled.as_ref().and_then(|c| c.get(&location))
    }

    /// Validate every location, merge the results (params, query, body,
    /// headers; later locations win on key clashes), then enforce the
    /// operation-wide required fields and one-of groups.
    ///
    /// # Errors
    ///
    /// `Internal` if the operation is not sealed; otherwise the first
    /// `Missing`/`Invalid` failure.
    pub fn validate_inputs(
        &self,
        inputs: &OperationInputs,
    ) -> Result<Map<String, Value>, ParamError> {
        let compiled = self.compiled.as_ref().ok_or_else(|| {
            ParamError::internal(format!(
                "operation {} must be sealed before validation",
                self.key()
            ))
        })?;

        let mut merged = Map::new();
        for location in Location::ALL {
            let Some(schema) = compiled.get(&location) else {
                continue;
            };
            let raw = match location {
                Location::Headers => {
                    canonical_header_keys(inputs.get(location), &self.header_names)
                }
                _ => inputs.get(location).clone(),
            };
            let output = run_group(&raw, schema, &self.required_one_of, location.as_str())?;
            merged.extend(output);
        }

        if let Some(name) = self.required.iter().find(|n| !merged.contains_key(n.as_str())) {
            return Err(ParamError::missing(name.clone()));
        }
        check_one_of(&merged, &self.required_one_of)?;
        Ok(merged)
    }

    /// Documentation view of the operation.
    pub fn describe(&self) -> Value {
        let mut doc = json!({
            "method": self.method.as_str(),
            "path": self.path,
            "sealed": self.is_sealed(),
        });
        if let Some(title) = &self.title {
            doc["title"] = json!(title);
        }
        for location in Location::ALL {
            if let Some(schema) = self.schema(location) {
                doc[location.as_str()] = schema.describe();
            }
        }
        if !self.required.is_empty() {
            doc["required"] = json!(self.required);
        }
        if !self.required_one_of.is_empty() {
            doc["requiredOneOf"] = json!(self.required_one_of);
        }
        doc
    }
}

/// Names a header schema declares. Descriptor headers are already
/// lowercased; native schemas expose theirs through `properties` and
/// `required` in their description.
fn declared_names(schema: &CompiledSchema) -> Vec<String> {
    match schema {
        CompiledSchema::Descriptor(s) => s.fields().iter().map(|f| f.name().to_string()).collect(),
        CompiledSchema::Native(p) => {
            let doc = p.describe();
            let mut names: Vec<String> = doc
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default();
            let required = doc.get("required").and_then(Value::as_array);
            for name in required.into_iter().flatten().filter_map(Value::as_str) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            names
        }
    }
}

fn find_ignore_case<'a>(names: &'a [String], name: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(name))
        .map(String::as_str)
}

/// Rename incoming header keys to the declared spelling. Undeclared keys
/// pass through unchanged.
fn canonical_header_keys(value: &Value, names: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let key = find_ignore_case(names, k).unwrap_or(k).to_string();
                    (key, v.clone())
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Validate raw inputs for a sealed operation.
pub fn validate_operation_inputs(
    params: &Value,
    query: &Value,
    body: &Value,
    headers: &Value,
    operation: &Operation,
) -> Result<Map<String, Value>, ParamError> {
    operation.validate_inputs(&OperationInputs {
        params: params.clone(),
        query: query.clone(),
        body: body.clone(),
        headers: headers.clone(),
    })
}
