//! Parameter schema and validation engine.
//!
//! Declares the expected shape of request parameters (path params, query
//! string, body, headers) per HTTP operation, compiles those declarations
//! once, and validates, coerces and normalizes raw input against them.
//!
//! # Example
//!
//! ```
//! use param_schema::{Descriptor, DescriptorRecord, Method, Operation, OperationInputs, TypeRegistry};
//! use serde_json::json;
//!
//! let registry = TypeRegistry::new();
//! let mut op = Operation::new(Method::Post, "/users");
//! op.body(
//!     DescriptorRecord::new()
//!         .field("name", Descriptor::new("TrimString").required())
//!         .field("age", Descriptor::new("Integer").params(json!({ "min": 0 })))
//!         .field("tags", Descriptor::array_of("String").with_default(json!([]))),
//! )
//! .unwrap();
//! op.seal(&registry).unwrap();
//!
//! let out = op
//!     .validate_inputs(&OperationInputs {
//!         body: json!({ "name": "  ann ", "age": "42", "extra": true }),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! assert_eq!(serde_json::Value::Object(out), json!({ "name": "ann", "age": 42, "tags": [] }));
//! ```
//!
//! # Representations
//!
//! | Representation | Input | Validated by |
//! |----------------|-------|--------------|
//! | Descriptors | [`DescriptorRecord`] | the type registry |
//! | Native | [`JsonSchema`], [`FnSchema`], any [`Parseable`] | the schema itself |
//!
//! A location holds exactly one representation. Native failures are
//! translated into the same [`ParamError`] kinds descriptors produce.
//!
//! # Descriptor format
//!
//! ```json
//! { "type": "Integer", "required": true, "default": 1, "params": { "min": 0 }, "format": true }
//! ```
//!
//! A `[]` suffix on the type declares an array of that type.

mod builtin;
mod compiler;
mod definition;
mod error;
mod loader;
mod native;
mod operation;
mod registry;
mod translate;
mod types;
mod validator;

pub use builtin::NumberRange;
pub use compiler::{
    compile, compile_descriptor, compile_record, compile_with, CompileOptions, CompiledField,
    CompiledSchema, DescriptorSchema, SchemaInput, SchemaKind, DEFAULT_MAX_DEPTH,
};
pub use definition::OperationDefinition;
pub use error::{ErrorKind, ErrorReport, LoadError, ParamError};
pub use loader::{is_url, load_json, load_json_auto, load_json_str};
pub use native::{FnSchema, Issue, IssueCode, JsonSchema, Parseable, PathSegment};
pub use operation::{validate_operation_inputs, Operation, OperationInputs};
pub use registry::{default_registry, Checker, ParamsChecker, Transform, TypeEntry, TypeRegistry};
pub use translate::{translate_issue, translate_issues};
pub use types::{json_type_name, Descriptor, DescriptorRecord, Location, Method, ARRAY_SUFFIX};
pub use validator::{validate_field, validate_group};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
