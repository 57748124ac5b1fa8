//! Integration tests for compiling and validating field groups.

use param_schema::{
    compile, compile_with, validate_field, validate_group, CompileOptions, CompiledSchema,
    Descriptor, DescriptorRecord, ErrorKind, FnSchema, Issue, JsonSchema, ParamError,
    SchemaInput, TypeEntry, TypeRegistry,
};
use serde_json::{json, Value};

fn group(record: DescriptorRecord) -> CompiledSchema {
    compile(&TypeRegistry::new(), &record.into()).unwrap()
}

fn field(descriptor: Descriptor, raw: Value) -> Result<Option<Value>, ParamError> {
    validate_field(&TypeRegistry::new(), "name", Some(&raw), &descriptor)
}

// === Numeric Coercion ===

mod numbers {
    use super::*;

    #[test]
    fn integer_accepts_number_and_string() {
        assert_eq!(field(Descriptor::new("Integer"), json!(5)).unwrap(), Some(json!(5)));
        assert_eq!(field(Descriptor::new("Integer"), json!("5")).unwrap(), Some(json!(5)));
    }

    #[test]
    fn fractional_string_is_float_not_integer() {
        let err = field(Descriptor::new("Integer"), json!("5.5")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(field(Descriptor::new("Float"), json!("5.5")).unwrap(), Some(json!(5.5)));
    }

    #[test]
    fn range_is_inclusive_for_numbers_and_strings() {
        let d = Descriptor::new("Number").params(json!({ "min": 0, "max": 10 }));
        for ok in [json!(0), json!(10), json!("0"), json!("10")] {
            assert!(field(d.clone(), ok.clone()).is_ok(), "{ok} should pass");
        }
        for bad in [json!(-1), json!(11), json!("-1"), json!("11")] {
            let err = field(d.clone(), bad.clone()).unwrap_err();
            assert_eq!(
                err.to_string(),
                r#"incorrect parameter 'name' should be valid Number with additional restrictions: {"min":0,"max":10}"#,
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn number_keeps_fractions() {
        let schema = group(DescriptorRecord::new().field("numP", Descriptor::new("Number")));
        let out = validate_group(&json!({ "numP": 1.02, "extra": "x" }), &schema, &[]).unwrap();
        assert_eq!(Value::Object(out), json!({ "numP": 1.02 }));
    }
}

// === Enumerations ===

mod enums {
    use super::*;

    fn abc() -> Descriptor {
        Descriptor::new("ENUM").params(json!(["A", "B", 1]))
    }

    #[test]
    fn members_accepted() {
        assert_eq!(field(abc(), json!("A")).unwrap(), Some(json!("A")));
        assert_eq!(field(abc(), json!("B")).unwrap(), Some(json!("B")));
        assert_eq!(field(abc(), json!(1)).unwrap(), Some(json!(1)));
    }

    #[test]
    fn outsider_lists_members() {
        let err = field(abc(), json!("C")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "incorrect parameter 'name' should be valid ENUM with additional restrictions: A,B,1"
        );
    }

    #[test]
    fn enum_without_params_does_not_compile() {
        let err = compile(
            &TypeRegistry::new(),
            &DescriptorRecord::new().field("e", Descriptor::new("ENUM")).into(),
        )
        .unwrap_err();
        assert!(err.is_internal());
    }
}

// === Arrays ===

mod arrays {
    use super::*;

    #[test]
    fn elements_are_coerced() {
        let out = field(Descriptor::array_of("Integer"), json!(["1", 2, "99"])).unwrap();
        assert_eq!(out, Some(json!([1, 2, 99])));
    }

    #[test]
    fn bad_element_is_indexed() {
        let err = field(Descriptor::array_of("Integer"), json!(["1", 2, "a"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.field_path(), "name[2]");
    }

    #[test]
    fn nested_arrays() {
        let out = field(Descriptor::new("Integer[][]"), json!([["1"], [2, "3"]])).unwrap();
        assert_eq!(out, Some(json!([[1], [2, 3]])));
        let err = field(Descriptor::new("Integer[][]"), json!([[1], [2, "x"]])).unwrap_err();
        assert_eq!(err.field_path(), "name[1][1]");
    }

    #[test]
    fn int_array_sorts() {
        let ints = Some(json!([1, 2, 3]));
        assert_eq!(field(Descriptor::new("IntArray"), json!("3,1,2")).unwrap(), ints);
        assert_eq!(field(Descriptor::new("IntArray"), json!([1, 2, 3])).unwrap(), ints);
    }

    #[test]
    fn array_with_element_descriptor() {
        let d = Descriptor::new("Array").params(json!({ "type": "Boolean" }));
        assert_eq!(field(d, json!(["true", false])).unwrap(), Some(json!([true, false])));
    }
}

// === Presence ===

mod presence {
    use super::*;

    fn schema() -> CompiledSchema {
        group(
            DescriptorRecord::new()
                .field("id", Descriptor::new("Integer").required())
                .field("page", Descriptor::new("Integer").with_default(json!(1)))
                .field("q", Descriptor::new("TrimString")),
        )
    }

    #[test]
    fn absent_required_is_missing() {
        let err = validate_group(&json!({}), &schema(), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
        assert_eq!(err.to_string(), "missing required parameter 'id'");
    }

    #[test]
    fn malformed_required_is_invalid() {
        let err = validate_group(&json!({ "id": "abc" }), &schema(), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn defaults_fill_and_optionals_skip() {
        let out = validate_group(&json!({ "id": "7" }), &schema(), &[]).unwrap();
        assert_eq!(Value::Object(out), json!({ "id": 7, "page": 1 }));
    }

    #[test]
    fn null_group_is_empty_object() {
        let err = validate_group(&Value::Null, &schema(), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
    }

    #[test]
    fn non_object_group_is_internal() {
        let err = validate_group(&json!([1]), &schema(), &[]).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn result_does_not_depend_on_key_order() {
        let schema = group(
            DescriptorRecord::new()
                .field("b", Descriptor::new("Integer").required())
                .field("a", Descriptor::new("Integer").required()),
        );
        let one = validate_group(&json!({ "a": "x", "b": "y" }), &schema, &[]).unwrap_err();
        let two = validate_group(&json!({ "b": "y", "a": "x" }), &schema, &[]).unwrap_err();
        assert_eq!(one, two);
        assert_eq!(one.field_path(), "a");
    }
}

// === Required One-Of ===

mod one_of {
    use super::*;

    fn schema() -> CompiledSchema {
        group(
            DescriptorRecord::new()
                .field("a", Descriptor::new("Integer"))
                .field("b", Descriptor::new("Integer")),
        )
    }

    #[test]
    fn one_present_passes() {
        let groups = vec![vec!["a".to_string(), "b".to_string()]];
        assert!(validate_group(&json!({ "a": 1 }), &schema(), &groups).is_ok());
    }

    #[test]
    fn none_present_names_all() {
        let groups = vec![vec!["a".to_string(), "b".to_string()]];
        let err = validate_group(&json!({}), &schema(), &groups).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
        assert_eq!(err.to_string(), "missing required parameter one of a, b is required");
    }

    #[test]
    fn empty_group_is_internal() {
        let err = validate_group(&json!({ "a": 1 }), &schema(), &[vec![]]).unwrap_err();
        assert!(err.is_internal());
    }
}

// === Custom Types And Schemas ===

mod custom {
    use super::*;

    #[test]
    fn registered_type_is_used() {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                "Even",
                TypeEntry::new(|v, _| v.as_i64().map(|n| n % 2 == 0).unwrap_or(false))
                    .parser(|v| match v.as_str().and_then(|s| s.parse::<i64>().ok()) {
                        Some(n) => json!(n),
                        None => v.clone(),
                    }),
            )
            .unwrap();
        let d = Descriptor::new("Even");
        assert_eq!(validate_field(&registry, "n", Some(&json!("4")), &d).unwrap(), Some(json!(4)));
        assert!(validate_field(&registry, "n", Some(&json!(3)), &d).is_err());
    }

    #[test]
    fn nested_schema_paths() {
        let mut registry = TypeRegistry::new();
        registry
            .register_schema(
                "Point",
                &DescriptorRecord::new()
                    .field("x", Descriptor::new("Integer").required())
                    .field("y", Descriptor::new("Integer").required()),
            )
            .unwrap();
        let record = DescriptorRecord::new().field("points", Descriptor::array_of("Point"));
        let schema = compile(&registry, &record.into()).unwrap();

        let raw = json!({ "points": [{ "x": "1", "y": 2, "z": 0 }] });
        let out = validate_group(&raw, &schema, &[]).unwrap();
        assert_eq!(Value::Object(out), json!({ "points": [{ "x": 1, "y": 2 }] }));

        let err = validate_group(&json!({ "points": [{ "x": 1 }] }), &schema, &[]).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter 'points[0].y'");
    }

    #[test]
    fn schema_types_reject_params() {
        let mut registry = TypeRegistry::new();
        registry
            .register_schema(
                "Point",
                &DescriptorRecord::new().field("x", Descriptor::new("Integer")),
            )
            .unwrap();

        let at = Descriptor::new("Point").params(json!({ "min": 0 }));
        let record = DescriptorRecord::new().field("at", at);
        let err = compile(&registry, &record.into()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "internal error type Point on parameter 'at' does not take params"
        );

        let record =
            DescriptorRecord::new().field("path", Descriptor::new("Point[]").params(json!([1])));
        assert!(compile(&registry, &record.into()).unwrap_err().is_internal());
    }

    #[test]
    fn depth_limit() {
        let record = DescriptorRecord::new().field("deep", Descriptor::new("Integer[][][]"));
        let options = CompileOptions::new().max_depth(2);
        let err = compile_with(&TypeRegistry::new(), &record.into(), &options).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn unknown_type_is_internal() {
        let record = DescriptorRecord::new().field("x", Descriptor::new("Nope"));
        let err = compile(&TypeRegistry::new(), &record.into()).unwrap_err();
        assert_eq!(err.to_string(), "internal error unknown type 'Nope' for parameter 'x'");
    }

    #[test]
    fn invalid_default_is_rejected_at_compile_time() {
        let record =
            DescriptorRecord::new().field("n", Descriptor::new("Integer").with_default(json!("x")));
        let err = compile(&TypeRegistry::new(), &record.into()).unwrap_err();
        assert!(err.is_internal());
    }
}

// === Native Schemas ===

mod native {
    use super::*;

    fn json_schema() -> SchemaInput {
        JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "email": { "type": "string" },
                "phone": { "type": "string" },
                "limit": { "type": "integer", "default": 20 }
            }
        }))
        .unwrap()
        .into()
    }

    #[test]
    fn passes_through_parse_output() {
        let schema = compile(&TypeRegistry::new(), &json_schema()).unwrap();
        let out = validate_group(&json!({ "email": "a@b.c" }), &schema, &[]).unwrap();
        assert_eq!(Value::Object(out), json!({ "email": "a@b.c", "limit": 20 }));
    }

    #[test]
    fn type_failure_is_invalid() {
        let schema = compile(&TypeRegistry::new(), &json_schema()).unwrap();
        let err = validate_group(&json!({ "limit": "many" }), &schema, &[]).unwrap_err();
        assert_eq!(err.to_string(), "incorrect parameter 'limit' should be valid integer");
    }

    #[test]
    fn one_of_checked_against_output() {
        let schema = compile(&TypeRegistry::new(), &json_schema()).unwrap();
        let groups = vec![vec!["email".to_string(), "phone".to_string()]];
        let err = validate_group(&json!({}), &schema, &groups).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter one of email, phone is required");
    }

    #[test]
    fn all_members_missing_becomes_one_of() {
        let schema = FnSchema::new(|v| {
            if v.get("email").is_some() || v.get("phone").is_some() {
                Ok(v.clone())
            } else {
                Err(vec![Issue::missing("email"), Issue::missing("phone")])
            }
        });
        let compiled = compile(&TypeRegistry::new(), &SchemaInput::native(schema)).unwrap();
        let groups = vec![vec!["email".to_string(), "phone".to_string()]];
        let err = validate_group(&json!({}), &compiled, &groups).unwrap_err();
        assert_eq!(err, ParamError::missing_one_of(["email", "phone"]));
    }

    #[test]
    fn non_object_output_is_internal() {
        let schema = FnSchema::new(|_| Ok(json!(1)));
        let compiled = compile(&TypeRegistry::new(), &SchemaInput::native(schema)).unwrap();
        assert!(validate_group(&json!({}), &compiled, &[]).unwrap_err().is_internal());
    }

    #[test]
    fn sniffing_rejects_mixed_documents() {
        let err = SchemaInput::from_json(&json!({
            "a": { "type": "String" },
            "b": 12
        }))
        .unwrap_err();
        assert!(err.is_internal());
        assert!(matches!(
            SchemaInput::from_json(&json!({ "type": "object" })),
            Ok(SchemaInput::Native(_))
        ));
        assert!(matches!(
            SchemaInput::from_json(&json!({ "a": { "type": "String" } })),
            Ok(SchemaInput::Descriptors(_))
        ));
    }
}
