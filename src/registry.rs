//! Catalog of named parameter types.
//!
//! A [`TypeRegistry`] maps type names to [`TypeEntry`] rules and to custom
//! object schemas registered from descriptor records. It is populated during
//! startup and then only read by the compiler.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};

use crate::builtin;
use crate::compiler::{compile_record, CompileOptions, DescriptorSchema};
use crate::error::ParamError;
use crate::types::{DescriptorRecord, ARRAY_SUFFIX};

pub type Checker = Arc<dyn Fn(&Value, Option<&Value>) -> bool + Send + Sync>;
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type ParamsChecker = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named type rule.
///
/// ```
/// use param_schema::{TypeEntry, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// let even = TypeEntry::new(|v, _| v.as_i64().map(|n| n % 2 == 0).unwrap_or(false))
///     .description("an even integer");
/// registry.register("Even", even).unwrap();
/// assert!(registry.has("Even"));
/// ```
#[derive(Clone)]
pub struct TypeEntry {
    name: String,
    checker: Checker,
    formatter: Option<Transform>,
    parser: Option<Transform>,
    params_checker: Option<ParamsChecker>,
    params_required: bool,
    default: Option<Value>,
    description: Option<String>,
    builtin: bool,
}

impl TypeEntry {
    pub fn new<F>(checker: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: String::new(),
            checker: Arc::new(checker),
            formatter: None,
            parser: None,
            params_checker: None,
            params_required: false,
            default: None,
            description: None,
            builtin: false,
        }
    }

    /// Applied to a checked value when formatting is enabled. Must be
    /// idempotent.
    pub fn formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Converts raw transport input (usually a string) into the value the
    /// checker sees. Returns the input unchanged when it cannot convert.
    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn params_checker<F>(mut self, params_checker: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.params_checker = Some(Arc::new(params_checker));
        self
    }

    pub fn params_required(mut self, required: bool) -> Self {
        self.params_required = required;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn is_params_required(&self) -> bool {
        self.params_required
    }

    pub fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    pub fn has_parser(&self) -> bool {
        self.parser.is_some()
    }

    pub fn get_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn check(&self, value: &Value, params: Option<&Value>) -> bool {
        (self.checker)(value, params)
    }

    pub fn format(&self, value: &Value) -> Value {
        match &self.formatter {
            Some(f) => f(value),
            None => value.clone(),
        }
    }

    pub fn parse(&self, value: &Value) -> Value {
        match &self.parser {
            Some(p) => p(value),
            None => value.clone(),
        }
    }

    /// Validates declaration params. Types without a params checker accept
    /// anything.
    pub fn check_params(&self, params: &Value) -> bool {
        match &self.params_checker {
            Some(c) => c(params),
            None => true,
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("builtin", &self.builtin)
            .field("params_required", &self.params_required)
            .field("formatter", &self.formatter.is_some())
            .field("parser", &self.parser.is_some())
            .finish_non_exhaustive()
    }
}

/// Registry of named types and custom object schemas.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<TypeEntry>>,
    schemas: BTreeMap<String, Arc<DescriptorSchema>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry populated with the builtin types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        builtin::install(&mut registry);
        registry
    }

    /// Create a registry with no types at all.
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
            schemas: BTreeMap::new(),
        }
    }

    /// Register a caller-defined type.
    ///
    /// # Errors
    ///
    /// Returns `ParamError::Internal` if the name is empty, carries the
    /// array suffix, or is already taken by a type or schema.
    pub fn register(&mut self, name: &str, entry: TypeEntry) -> Result<(), ParamError> {
        self.insert(name, entry, false)
    }

    pub(crate) fn register_builtin(&mut self, name: &str, entry: TypeEntry) {
        let inserted = self.insert(name, entry, true);
        debug_assert!(inserted.is_ok(), "builtin type {name} registered twice");
    }

    fn insert(
        &mut self,
        name: &str,
        mut entry: TypeEntry,
        builtin: bool,
    ) -> Result<(), ParamError> {
        self.check_name(name)?;
        entry.name = name.to_string();
        entry.builtin = builtin;
        if !builtin {
            tracing::debug!(type_name = name, "registered parameter type");
        }
        self.types.insert(name.to_string(), Arc::new(entry));
        Ok(())
    }

    /// Compile a descriptor record and register it as a named object type.
    ///
    /// Fields of type `name` (or `name[]`) then validate nested objects
    /// against this record.
    pub fn register_schema(
        &mut self,
        name: &str,
        record: &DescriptorRecord,
    ) -> Result<(), ParamError> {
        self.check_name(name)?;
        let schema = compile_record(self, record, &CompileOptions::default())
            .map_err(|e| match e {
                ParamError::Internal { message } => {
                    ParamError::internal(format!("{message} in schema '{name}'"))
                }
                other => other,
            })?;
        tracing::debug!(schema = name, fields = schema.len(), "registered custom schema");
        self.schemas.insert(name.to_string(), Arc::new(schema));
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), ParamError> {
        if name.is_empty() {
            return Err(ParamError::internal("type name must not be empty"));
        }
        if name.ends_with(ARRAY_SUFFIX) {
            return Err(ParamError::internal(format!(
                "type name '{name}' must not end with '{ARRAY_SUFFIX}'"
            )));
        }
        if self.has(name) {
            return Err(ParamError::internal(format!(
                "type '{name}' is already registered"
            )));
        }
        Ok(())
    }

    /// True if `name` is a registered type or custom schema.
    pub fn has(&self, name: &str) -> bool {
        self.types.contains_key(name) || self.schemas.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeEntry>> {
        self.types.get(name)
    }

    pub fn schema(&self, name: &str) -> Option<&Arc<DescriptorSchema>> {
        self.schemas.get(name)
    }

    /// Iterate over all types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeEntry> {
        self.types.values().map(|e| e.as_ref())
    }

    /// Iterate over all custom schemas in name order.
    pub fn schemas(&self) -> impl Iterator<Item = (&str, &DescriptorSchema)> {
        self.schemas.iter().map(|(n, s)| (n.as_str(), s.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.types.len() + self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documentation view of every type and schema.
    pub fn describe(&self) -> Value {
        let types: Vec<Value> = self
            .iter()
            .map(|entry| {
                let mut item = json!({
                    "name": entry.name(),
                    "builtin": entry.is_builtin(),
                    "paramsRequired": entry.is_params_required(),
                });
                if let Some(desc) = entry.get_description() {
                    item["description"] = json!(desc);
                }
                if let Some(default) = entry.get_default() {
                    item["default"] = default.clone();
                }
                item
            })
            .collect();
        let schemas: serde_json::Map<String, Value> = self
            .schemas()
            .map(|(name, schema)| (name.to_string(), schema.describe()))
            .collect();
        json!({ "types": types, "schemas": schemas })
    }
}

/// Process-wide registry holding only the builtin types.
///
/// Callers that need custom types construct their own [`TypeRegistry`].
pub fn default_registry() -> &'static TypeRegistry {
    static DEFAULT: OnceLock<TypeRegistry> = OnceLock::new();
    DEFAULT.get_or_init(TypeRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Descriptor;

    #[test]
    fn builtins_are_installed() {
        let registry = TypeRegistry::new();
        for name in [
            "String", "TrimString", "Number", "Integer", "Float", "Boolean", "Date", "Object",
            "Array", "JSON", "JSONString", "Any", "Email", "URL", "Domain", "Alpha",
            "AlphaNumeric", "Ascii", "Base64", "MongoIdString", "ENUM", "IntArray",
            "StringArray", "NullableString", "NullableInteger",
        ] {
            let entry = registry.get(name).unwrap_or_else(|| panic!("missing {name}"));
            assert!(entry.is_builtin());
            assert_eq!(entry.name(), name);
        }
        assert!(registry.get("ENUM").unwrap().is_params_required());
    }

    #[test]
    fn empty_registry_has_nothing() {
        let registry = TypeRegistry::empty();
        assert!(registry.is_empty());
        assert!(!registry.has("String"));
    }

    #[test]
    fn register_custom_type() {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                "Positive",
                TypeEntry::new(|v, _| v.as_f64().map(|n| n > 0.0).unwrap_or(false)),
            )
            .unwrap();
        let entry = registry.get("Positive").unwrap();
        assert!(!entry.is_builtin());
        assert!(entry.check(&json!(3), None));
        assert!(!entry.check(&json!(-3), None));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register("String", TypeEntry::new(|_, _| true))
            .unwrap_err();
        assert_eq!(err.to_string(), "internal error type 'String' is already registered");
    }

    #[test]
    fn array_suffix_name_rejected() {
        let mut registry = TypeRegistry::new();
        let err = registry.register("Foo[]", TypeEntry::new(|_, _| true)).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn schema_names_share_the_namespace() {
        let mut registry = TypeRegistry::new();
        let record = DescriptorRecord::new().field("id", Descriptor::new("Integer"));
        registry.register_schema("User", &record).unwrap();
        assert!(registry.has("User"));
        assert!(registry.schema("User").is_some());
        assert!(registry.register("User", TypeEntry::new(|_, _| true)).is_err());
        assert!(registry.register_schema("Integer", &record).is_err());
    }

    #[test]
    fn schema_compile_errors_name_the_schema() {
        let mut registry = TypeRegistry::new();
        let record = DescriptorRecord::new().field("id", Descriptor::new("Nope"));
        let err = registry.register_schema("User", &record).unwrap_err();
        assert!(err.to_string().ends_with("in schema 'User'"), "{err}");
        assert!(!registry.has("User"));
    }

    #[test]
    fn default_registry_is_shared() {
        let a = default_registry() as *const TypeRegistry;
        let b = default_registry() as *const TypeRegistry;
        assert_eq!(a, b);
        assert!(default_registry().has("Integer"));
    }

    #[test]
    fn describe_lists_types() {
        let registry = TypeRegistry::new();
        let doc = registry.describe();
        let names: Vec<&str> = doc["types"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"ENUM"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }
}
