//! Schema compilation: descriptor records and native schemas into
//! [`CompiledSchema`]s.
//!
//! This module is the only place that decides which representation a JSON
//! schema document uses. Everything downstream matches on the tagged
//! [`CompiledSchema`] instead.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::builtin::NumberRange;
use crate::error::ParamError;
use crate::native::{JsonSchema, Parseable};
use crate::registry::{TypeEntry, TypeRegistry};
use crate::types::{Descriptor, DescriptorRecord, ARRAY_SUFFIX};
use crate::validator;

/// Default limit on array/object nesting in a single field.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Options for schema compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Maximum nesting of array elements and custom schemas per field.
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Which representation a field group uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Descriptor,
    Native,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Descriptor => f.write_str("descriptor"),
            SchemaKind::Native => f.write_str("native"),
        }
    }
}

/// Uncompiled input for one field group.
#[derive(Debug, Clone)]
pub enum SchemaInput {
    Descriptors(DescriptorRecord),
    Native(Arc<dyn Parseable>),
}

impl SchemaInput {
    pub fn native<P: Parseable + 'static>(schema: P) -> Self {
        Self::Native(Arc::new(schema))
    }

    pub fn kind(&self) -> SchemaKind {
        match self {
            SchemaInput::Descriptors(_) => SchemaKind::Descriptor,
            SchemaInput::Native(_) => SchemaKind::Native,
        }
    }

    /// Classify a JSON document as a descriptor record or a JSON Schema.
    ///
    /// A document with a `$schema` key or a string `type` key is a JSON
    /// Schema. Otherwise every value must be a descriptor object.
    ///
    /// # Errors
    ///
    /// Returns `ParamError::Internal` for non-objects, for documents mixing
    /// descriptors with other values, and for invalid JSON Schemas.
    pub fn from_json(value: &Value) -> Result<Self, ParamError> {
        let Value::Object(map) = value else {
            return Err(ParamError::internal(format!(
                "schema must be an object, got {}",
                crate::types::json_type_name(value)
            )));
        };

        let is_json_schema =
            map.contains_key("$schema") || matches!(map.get("type"), Some(Value::String(_)));
        if is_json_schema {
            return Ok(Self::native(JsonSchema::new(value.clone())?));
        }

        if let Some((name, _)) = map.iter().find(|(_, v)| !Descriptor::looks_like(v)) {
            return Err(ParamError::internal(format!(
                "parameter '{name}' is not a descriptor: cannot mix descriptor and native schema representations"
            )));
        }
        DescriptorRecord::from_json(map).map(Self::Descriptors)
    }
}

impl From<DescriptorRecord> for SchemaInput {
    fn from(record: DescriptorRecord) -> Self {
        Self::Descriptors(record)
    }
}

impl From<JsonSchema> for SchemaInput {
    fn from(schema: JsonSchema) -> Self {
        Self::native(schema)
    }
}

impl From<Arc<dyn Parseable>> for SchemaInput {
    fn from(schema: Arc<dyn Parseable>) -> Self {
        Self::Native(schema)
    }
}

/// A field group ready for validation.
#[derive(Debug, Clone)]
pub enum CompiledSchema {
    Descriptor(Arc<DescriptorSchema>),
    Native(Arc<dyn Parseable>),
}

impl CompiledSchema {
    pub fn kind(&self) -> SchemaKind {
        match self {
            CompiledSchema::Descriptor(_) => SchemaKind::Descriptor,
            CompiledSchema::Native(_) => SchemaKind::Native,
        }
    }

    pub fn as_descriptor(&self) -> Option<&DescriptorSchema> {
        match self {
            CompiledSchema::Descriptor(s) => Some(s),
            CompiledSchema::Native(_) => None,
        }
    }

    /// Documentation view of the schema.
    pub fn describe(&self) -> Value {
        match self {
            CompiledSchema::Descriptor(s) => s.describe(),
            CompiledSchema::Native(p) => json!({ "native": p.describe() }),
        }
    }
}

/// Compiled form of a descriptor record.
///
/// Fields keep declaration order for output and documentation; validation
/// visits them in name order so the outcome never depends on declaration
/// order.
#[derive(Debug)]
pub struct DescriptorSchema {
    fields: Vec<CompiledField>,
    by_name: BTreeMap<String, usize>,
}

impl DescriptorSchema {
    /// Fields in declaration order.
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// Fields in name order.
    pub fn fields_by_name(&self) -> impl Iterator<Item = &CompiledField> {
        self.by_name.values().map(|&i| &self.fields[i])
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn describe(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.describe()))
            .collect();
        Value::Object(map)
    }
}

/// Resolved validation rule for one field.
#[derive(Debug, Clone)]
pub(crate) enum FieldKind {
    Json,
    JsonString,
    Boolean,
    Number {
        numeric: Numeric,
        range: NumberRange,
        params: Option<Value>,
    },
    Enum {
        values: Vec<Value>,
    },
    Array {
        element: Box<CompiledField>,
    },
    Object {
        schema: Arc<DescriptorSchema>,
    },
    Registered {
        entry: Arc<TypeEntry>,
        params: Option<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Numeric {
    Number,
    Integer,
    Float,
}

/// One compiled field of a [`DescriptorSchema`].
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
    pub(crate) default: Option<Value>,
    pub(crate) format: bool,
    pub(crate) comment: Option<String>,
}

impl CompiledField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type as declared, e.g. `Integer[]`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn formats(&self) -> bool {
        self.format
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Element rule for array fields.
    pub fn element(&self) -> Option<&CompiledField> {
        match &self.kind {
            FieldKind::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Nested schema for custom object fields.
    pub fn nested(&self) -> Option<&DescriptorSchema> {
        match &self.kind {
            FieldKind::Object { schema } => Some(schema),
            _ => None,
        }
    }

    pub fn describe(&self) -> Value {
        let mut doc = json!({ "type": self.type_name, "required": self.required });
        if let Some(default) = &self.default {
            doc["default"] = default.clone();
        }
        if !self.format {
            doc["format"] = json!(false);
        }
        if let Some(comment) = &self.comment {
            doc["comment"] = json!(comment);
        }
        match &self.kind {
            FieldKind::Enum { values } => doc["params"] = Value::Array(values.clone()),
            FieldKind::Number {
                params: Some(p), ..
            }
            | FieldKind::Registered {
                params: Some(p), ..
            } => doc["params"] = p.clone(),
            FieldKind::Array { element } => doc["items"] = element.describe(),
            FieldKind::Object { schema } => doc["fields"] = schema.describe(),
            _ => {}
        }
        doc
    }
}

/// Compile one field group with default options.
///
/// # Errors
///
/// Returns `ParamError::Internal` for unknown types, ENUM without params,
/// invalid params or defaults, duplicate fields, and excessive nesting.
pub fn compile(
    registry: &TypeRegistry,
    input: &SchemaInput,
) -> Result<CompiledSchema, ParamError> {
    compile_with(registry, input, &CompileOptions::default())
}

pub fn compile_with(
    registry: &TypeRegistry,
    input: &SchemaInput,
    options: &CompileOptions,
) -> Result<CompiledSchema, ParamError> {
    match input {
        SchemaInput::Descriptors(record) => Ok(CompiledSchema::Descriptor(Arc::new(
            compile_record(registry, record, options)?,
        ))),
        SchemaInput::Native(schema) => Ok(CompiledSchema::Native(Arc::clone(schema))),
    }
}

/// Compile a descriptor record.
pub fn compile_record(
    registry: &TypeRegistry,
    record: &DescriptorRecord,
    options: &CompileOptions,
) -> Result<DescriptorSchema, ParamError> {
    let mut fields = Vec::with_capacity(record.len());
    let mut by_name = BTreeMap::new();

    for (name, descriptor) in record.iter() {
        if by_name.contains_key(name) {
            return Err(ParamError::internal(format!("duplicate parameter '{name}'")));
        }
        let field = compile_field(registry, name, descriptor, options, 0)?;
        by_name.insert(name.to_string(), fields.len());
        fields.push(field);
    }

    Ok(DescriptorSchema { fields, by_name })
}

/// Compile a single descriptor.
pub fn compile_descriptor(
    registry: &TypeRegistry,
    name: &str,
    descriptor: &Descriptor,
) -> Result<CompiledField, ParamError> {
    compile_field(registry, name, descriptor, &CompileOptions::default(), 0)
}

fn compile_field(
    registry: &TypeRegistry,
    name: &str,
    descriptor: &Descriptor,
    options: &CompileOptions,
    depth: usize,
) -> Result<CompiledField, ParamError> {
    let kind = resolve_kind(
        registry,
        name,
        &descriptor.type_name,
        descriptor.params.as_ref(),
        descriptor.format,
        options,
        depth,
    )?;

    let field = CompiledField {
        name: name.to_string(),
        type_name: descriptor.type_name.clone(),
        kind,
        required: descriptor.required,
        default: descriptor.default.clone(),
        format: descriptor.format,
        comment: descriptor.comment.clone(),
    };

    if let Some(default) = &field.default {
        validator::coerce(&field, name, default).map_err(|e| {
            ParamError::internal(format!("default value for parameter '{name}' is invalid: {e}"))
        })?;
    }

    Ok(field)
}

fn resolve_kind(
    registry: &TypeRegistry,
    name: &str,
    type_name: &str,
    params: Option<&Value>,
    format: bool,
    options: &CompileOptions,
    depth: usize,
) -> Result<FieldKind, ParamError> {
    if depth > options.max_depth {
        return Err(ParamError::internal(format!(
            "parameter '{name}' exceeds the maximum nesting depth of {}",
            options.max_depth
        )));
    }

    if let Some(base) = type_name.strip_suffix(ARRAY_SUFFIX) {
        let kind = resolve_kind(registry, name, base, params, format, options, depth + 1)?;
        let element = CompiledField {
            name: name.to_string(),
            type_name: base.to_string(),
            kind,
            required: true,
            default: None,
            format,
            comment: None,
        };
        return Ok(FieldKind::Array {
            element: Box::new(element),
        });
    }

    if let Some(schema) = registry.schema(type_name) {
        if params.is_some() {
            return Err(ParamError::internal(format!(
                "type {type_name} on parameter '{name}' does not take params"
            )));
        }
        return Ok(FieldKind::Object {
            schema: Arc::clone(schema),
        });
    }

    let entry = registry.get(type_name).ok_or_else(|| {
        ParamError::internal(format!("unknown type '{type_name}' for parameter '{name}'"))
    })?;

    let params = match params {
        Some(p) if !entry.check_params(p) => {
            return Err(ParamError::internal(format!(
                "invalid params {p} for type {type_name} on parameter '{name}'"
            )));
        }
        Some(p) => Some(p),
        None if entry.is_params_required() => {
            return Err(ParamError::internal(format!(
                "type {type_name} on parameter '{name}' requires params"
            )));
        }
        None => None,
    };

    if !entry.is_builtin() {
        return Ok(FieldKind::Registered {
            entry: Arc::clone(entry),
            params: params.cloned(),
        });
    }

    let kind = match type_name {
        "JSON" => FieldKind::Json,
        "JSONString" => FieldKind::JsonString,
        "Boolean" => FieldKind::Boolean,
        "Number" | "Integer" | "Float" => {
            let numeric = match type_name {
                "Integer" => Numeric::Integer,
                "Float" => Numeric::Float,
                _ => Numeric::Number,
            };
            let range = params.and_then(NumberRange::parse).unwrap_or_default();
            FieldKind::Number {
                numeric,
                range,
                params: params.cloned(),
            }
        }
        "ENUM" => FieldKind::Enum {
            values: params
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        },
        "Array" => match params {
            Some(p) => {
                let sub = Descriptor::from_json(name, p)?;
                let sub = Descriptor {
                    format: sub.format && format,
                    ..sub
                };
                let element = compile_field(registry, name, &sub, options, depth + 1)?;
                FieldKind::Array {
                    element: Box::new(element),
                }
            }
            None => FieldKind::Registered {
                entry: Arc::clone(entry),
                params: None,
            },
        },
        _ => FieldKind::Registered {
            entry: Arc::clone(entry),
            params: params.cloned(),
        },
    };
    Ok(kind)
}
