//! Validation and coercion of raw input against compiled schemas.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::builtin::{coerce_boolean, coerce_float, coerce_integer, coerce_number, enum_member};
use crate::compiler::{
    compile_descriptor, CompiledField, CompiledSchema, DescriptorSchema, FieldKind, Numeric,
};
use crate::error::ParamError;
use crate::registry::TypeRegistry;
use crate::translate::translate_issues;
use crate::types::{display_value, json_type_name, Descriptor};

/// Name used for the whole input in errors that have no field path.
const ROOT: &str = "input";

/// Validate a single raw value against a descriptor.
///
/// Returns `Ok(None)` when the value is absent, optional and has no
/// default.
///
/// ```
/// use param_schema::{default_registry, validate_field, Descriptor};
/// use serde_json::json;
///
/// let age = Descriptor::new("Integer");
/// let value = validate_field(default_registry(), "age", Some(&json!("42")), &age).unwrap();
/// assert_eq!(value, Some(json!(42)));
/// ```
///
/// # Errors
///
/// `Internal` if the descriptor does not compile, otherwise `Missing` or
/// `Invalid`.
pub fn validate_field(
    registry: &TypeRegistry,
    name: &str,
    raw: Option<&Value>,
    descriptor: &Descriptor,
) -> Result<Option<Value>, ParamError> {
    let field = compile_descriptor(registry, name, descriptor)?;
    field.validate(raw)
}

/// Validate one field group and return the normalized object.
///
/// Descriptor schemas drop keys they do not declare. Native schemas return
/// whatever their parse produced. `null` input is treated as `{}`.
///
/// # Errors
///
/// `Missing`/`Invalid` for bad input; `Internal` when the input is not an
/// object or a one-of group is empty.
pub fn validate_group(
    raw: &Value,
    schema: &CompiledSchema,
    one_of: &[Vec<String>],
) -> Result<Map<String, Value>, ParamError> {
    let output = run_group(raw, schema, one_of, ROOT)?;
    check_one_of(&output, one_of)?;
    Ok(output)
}

/// Validate a group without the final one-of check. `one_of` is still used
/// to classify native failures.
pub(crate) fn run_group(
    raw: &Value,
    schema: &CompiledSchema,
    one_of: &[Vec<String>],
    root: &str,
) -> Result<Map<String, Value>, ParamError> {
    let empty = Value::Object(Map::new());
    let raw = if raw.is_null() { &empty } else { raw };

    match schema {
        CompiledSchema::Descriptor(schema) => {
            let map = raw.as_object().ok_or_else(|| {
                ParamError::internal(format!(
                    "expected an object for '{root}', got {}",
                    json_type_name(raw)
                ))
            })?;
            validate_record(schema, map, None)
        }
        CompiledSchema::Native(schema) => match schema.parse(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ParamError::internal(format!(
                "native schema for '{root}' produced {}, expected an object",
                json_type_name(&other)
            ))),
            Err(issues) => Err(translate_issues(&issues, one_of, root)),
        },
    }
}

/// Every group must have at least one member present in `output`.
pub(crate) fn check_one_of(
    output: &Map<String, Value>,
    groups: &[Vec<String>],
) -> Result<(), ParamError> {
    for group in groups {
        if group.is_empty() {
            return Err(ParamError::internal("required-one-of group must not be empty"));
        }
        if !group.iter().any(|f| output.contains_key(f)) {
            return Err(ParamError::missing_one_of(group.iter().cloned()));
        }
    }
    Ok(())
}

fn validate_record(
    schema: &DescriptorSchema,
    input: &Map<String, Value>,
    prefix: Option<&str>,
) -> Result<Map<String, Value>, ParamError> {
    let mut values: BTreeMap<&str, Value> = BTreeMap::new();
    for field in schema.fields_by_name() {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", field.name),
            None => field.name.clone(),
        };
        if let Some(value) = check_field(field, &path, input.get(&field.name))? {
            values.insert(&field.name, value);
        }
    }

    Ok(schema
        .fields()
        .iter()
        .filter_map(|f| values.remove(f.name.as_str()).map(|v| (f.name.clone(), v)))
        .collect())
}

impl CompiledField {
    /// Validate a raw value (or its absence) against this field.
    pub fn validate(&self, raw: Option<&Value>) -> Result<Option<Value>, ParamError> {
        check_field(self, &self.name, raw)
    }
}

fn check_field(
    field: &CompiledField,
    path: &str,
    raw: Option<&Value>,
) -> Result<Option<Value>, ParamError> {
    match (raw, &field.default) {
        (Some(value), _) => coerce(field, path, value).map(Some),
        (None, Some(default)) => coerce(field, path, default).map(Some),
        (None, None) if field.required => Err(ParamError::missing(path)),
        (None, None) => Ok(None),
    }
}

fn stringify(value: &Value) -> Value {
    Value::String(display_value(value))
}

/// Check and normalize a present value.
pub(crate) fn coerce(
    field: &CompiledField,
    path: &str,
    value: &Value,
) -> Result<Value, ParamError> {
    let invalid = || ParamError::invalid(path, &field.type_name);

    match &field.kind {
        FieldKind::Array { element } => {
            let items = value.as_array().ok_or_else(invalid)?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(element, &format!("{path}[{i}]"), item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }

        FieldKind::Object { schema } => {
            let map = value.as_object().ok_or_else(invalid)?;
            validate_record(schema, map, Some(path)).map(Value::Object)
        }

        FieldKind::Json => match value {
            Value::String(s) => {
                let parsed: Value = serde_json::from_str(s).map_err(|_| invalid())?;
                Ok(if field.format { parsed } else { value.clone() })
            }
            other => Ok(other.clone()),
        },

        FieldKind::JsonString => {
            let text = match value {
                Value::String(s) => s.clone(),
                other if !field.format => other.to_string(),
                _ => return Err(invalid()),
            };
            if serde_json::from_str::<Value>(text.trim()).is_err() {
                return Err(invalid());
            }
            Ok(Value::String(if field.format {
                text.trim().to_string()
            } else {
                text
            }))
        }

        FieldKind::Enum { values } => match enum_member(values, value) {
            Some(member) if field.format => Ok(member.clone()),
            Some(_) => Ok(value.clone()),
            None => {
                let allowed: Vec<String> = values.iter().map(display_value).collect();
                Err(ParamError::invalid(
                    path,
                    format!(
                        "{} with additional restrictions: {}",
                        field.type_name,
                        allowed.join(",")
                    ),
                ))
            }
        },

        FieldKind::Boolean => {
            let b = coerce_boolean(value).ok_or_else(invalid)?;
            Ok(if field.format {
                Value::Bool(b)
            } else {
                stringify(value)
            })
        }

        FieldKind::Number {
            numeric,
            range,
            params,
        } => {
            let (coerced, n) = match numeric {
                Numeric::Integer => coerce_integer(value).map(|i| (Value::from(i), i as f64)),
                Numeric::Float => coerce_float(value)
                    .and_then(|f| Number::from_f64(f).map(|n| (Value::Number(n), f))),
                Numeric::Number => coerce_number(value).and_then(|v| v.as_f64().map(|f| (v, f))),
            }
            .ok_or_else(invalid)?;

            if !range.contains(n) {
                let restrictions = params.as_ref().map(Value::to_string).unwrap_or_default();
                return Err(ParamError::invalid(
                    path,
                    format!(
                        "{} with additional restrictions: {restrictions}",
                        field.type_name
                    ),
                ));
            }
            Ok(if field.format { coerced } else { stringify(value) })
        }

        FieldKind::Registered { entry, params } => {
            let parsed = entry.parse(value);
            if !entry.check(&parsed, params.as_ref()) {
                return Err(invalid());
            }
            Ok(if field.format {
                entry.format(&parsed)
            } else {
                value.clone()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;
    use serde_json::json;

    fn check(descriptor: Descriptor, raw: Value) -> Result<Option<Value>, ParamError> {
        validate_field(&TypeRegistry::new(), "f", Some(&raw), &descriptor)
    }

    fn absent(descriptor: Descriptor) -> Result<Option<Value>, ParamError> {
        validate_field(&TypeRegistry::new(), "f", None, &descriptor)
    }

    #[test]
    fn absent_optional_is_skipped() {
        assert_eq!(absent(Descriptor::new("String")).unwrap(), None);
    }

    #[test]
    fn absent_required_is_missing() {
        let err = absent(Descriptor::new("String").required()).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter 'f'");
    }

    #[test]
    fn default_is_substituted_and_coerced() {
        let value = absent(Descriptor::new("Integer").with_default(json!("7"))).unwrap();
        assert_eq!(value, Some(json!(7)));
        let value = absent(Descriptor::new("Integer").required().with_default(json!(1))).unwrap();
        assert_eq!(value, Some(json!(1)));
    }

    #[test]
    fn optional_but_invalid_is_reported() {
        let err = check(Descriptor::new("Integer"), json!("x")).unwrap_err();
        assert_eq!(err.to_string(), "incorrect parameter 'f' should be valid Integer");
    }

    #[test]
    fn null_is_present() {
        assert_eq!(
            check(Descriptor::new("NullableString"), Value::Null).unwrap(),
            Some(Value::Null)
        );
        assert!(check(Descriptor::new("String"), Value::Null).is_err());
    }

    #[test]
    fn json_parses_when_formatting() {
        assert_eq!(
            check(Descriptor::new("JSON"), json!("{\"a\":[1,2]}")).unwrap(),
            Some(json!({ "a": [1, 2] }))
        );
        assert_eq!(
            check(Descriptor::new("JSON").format(false), json!("{\"a\":1}")).unwrap(),
            Some(json!("{\"a\":1}"))
        );
        assert_eq!(
            check(Descriptor::new("JSON"), json!({ "already": true })).unwrap(),
            Some(json!({ "already": true }))
        );
        let err = check(Descriptor::new("JSON"), json!("{oops")).unwrap_err();
        assert_eq!(err.to_string(), "incorrect parameter 'f' should be valid JSON");
    }

    #[test]
    fn json_string_trims_or_stringifies() {
        assert_eq!(
            check(Descriptor::new("JSONString"), json!("  [1]  ")).unwrap(),
            Some(json!("[1]"))
        );
        assert_eq!(
            check(Descriptor::new("JSONString").format(false), json!({ "a": 1 })).unwrap(),
            Some(json!("{\"a\":1}"))
        );
        assert!(check(Descriptor::new("JSONString"), json!({ "a": 1 })).is_err());
    }

    #[test]
    fn unformatted_scalars_are_stringified() {
        assert_eq!(
            check(Descriptor::new("Integer").format(false), json!(5)).unwrap(),
            Some(json!("5"))
        );
        assert_eq!(
            check(Descriptor::new("Boolean").format(false), json!(true)).unwrap(),
            Some(json!("true"))
        );
        assert!(check(Descriptor::new("Integer").format(false), json!("a")).is_err());
    }

    #[test]
    fn boolean_coerces() {
        assert_eq!(
            check(Descriptor::new("Boolean"), json!("false")).unwrap(),
            Some(json!(false))
        );
        assert!(check(Descriptor::new("Boolean"), json!("maybe")).is_err());
    }

    #[test]
    fn enum_returns_canonical_member() {
        let d = Descriptor::new("ENUM").params(json!(["A", 1]));
        assert_eq!(check(d.clone(), json!("1")).unwrap(), Some(json!(1)));
        assert_eq!(check(d.format(false), json!("1")).unwrap(), Some(json!("1")));
    }

    #[test]
    fn range_message_lists_restrictions() {
        let d = Descriptor::new("Integer").params(json!({ "min": 1, "max": 3 }));
        let err = check(d, json!(9)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "incorrect parameter 'f' should be valid Integer with additional restrictions: {\"min\":1,\"max\":3}"
        );
    }

    #[test]
    fn registered_type_uses_parser_and_formatter() {
        assert_eq!(
            check(Descriptor::new("IntArray"), json!("3,1,2")).unwrap(),
            Some(json!([1, 2, 3]))
        );
        assert_eq!(
            check(Descriptor::new("IntArray").format(false), json!("3,1,2")).unwrap(),
            Some(json!("3,1,2"))
        );
        assert_eq!(
            check(Descriptor::new("TrimString"), json!("  hi ")).unwrap(),
            Some(json!("hi"))
        );
    }

    #[test]
    fn array_of_enum_reports_element_path() {
        let d = Descriptor::new("ENUM[]").params(json!(["x", "y"]));
        assert_eq!(
            check(d.clone(), json!(["x", "y"])).unwrap(),
            Some(json!(["x", "y"]))
        );
        let err = check(d, json!(["x", "z"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "incorrect parameter 'f[1]' should be valid ENUM with additional restrictions: x,y"
        );
    }

    #[test]
    fn nested_arrays_report_full_path() {
        let err = check(Descriptor::new("Integer[][]"), json!([[1], [2, "b"]])).unwrap_err();
        assert_eq!(err.to_string(), "incorrect parameter 'f[1][1]' should be valid Integer");
        let err = check(Descriptor::new("Integer[]"), json!("1,2")).unwrap_err();
        assert_eq!(err.to_string(), "incorrect parameter 'f' should be valid Integer[]");
    }

    #[test]
    fn custom_schema_paths() {
        let mut registry = TypeRegistry::new();
        registry
            .register_schema(
                "Point",
                &crate::types::DescriptorRecord::new()
                    .field("x", Descriptor::new("Integer").required())
                    .field("y", Descriptor::new("Integer").with_default(json!(0))),
            )
            .unwrap();
        let d = Descriptor::new("Point[]");
        let raw = json!([{ "x": "1", "z": 9 }]);
        let ok = validate_field(&registry, "pts", Some(&raw), &d).unwrap();
        assert_eq!(ok, Some(json!([{ "x": 1, "y": 0 }])));

        let err = validate_field(&registry, "pts", Some(&json!([{ "x": 1 }, {}])), &d).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter 'pts[1].x'");
    }

    #[test]
    fn group_rejects_non_object_input() {
        let schema = crate::compiler::compile(
            &TypeRegistry::new(),
            &crate::types::DescriptorRecord::new()
                .field("a", Descriptor::new("String"))
                .into(),
        )
        .unwrap();
        assert!(validate_group(&json!([1]), &schema, &[]).unwrap_err().is_internal());
        assert!(validate_group(&Value::Null, &schema, &[]).unwrap().is_empty());
        assert!(validate_group(&json!({}), &schema, &[vec![]])
            .unwrap_err()
            .is_internal());
    }
}
