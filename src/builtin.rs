//! Builtin parameter types and the coercion rules they share with the
//! compiled validator.
//!
//! Numeric and boolean coercion lives here once: registry checkers and
//! compiled fields both call `coerce_*`, so a query-string `"5"` and a JSON
//! `5` always normalize the same way.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Number, Value};

use crate::registry::{TypeEntry, TypeRegistry};
use crate::types::{display_value, Descriptor};

/// Coerce a JSON number or integer string into an `i64`.
///
/// Integral floats (`5.0`) are accepted; fractional values and strings
/// such as `"5.5"` are not.
pub(crate) fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Coerce a JSON number or numeric string into a finite `f64`.
pub(crate) fn coerce_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.filter(|f| f.is_finite())
}

/// Coerce into a JSON number, keeping integer representation when the
/// input is integral.
pub(crate) fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|_| value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

/// Coerce `true`/`false`, `"true"`/`"false"` (any case) and `"1"`/`"0"`.
pub(crate) fn coerce_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Inclusive numeric bounds declared through `params: { min, max }`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRange {
    /// Parse range params. Returns `None` when the params are malformed:
    /// not an object, unknown keys, non-numeric bounds, or `min > max`.
    pub fn parse(params: &Value) -> Option<Self> {
        let map = params.as_object()?;
        if map.keys().any(|k| k != "min" && k != "max") {
            return None;
        }
        let bound = |key: &str| -> Option<Option<f64>> {
            match map.get(key) {
                None | Some(Value::Null) => Some(None),
                Some(Value::Number(n)) => n.as_f64().map(Some),
                Some(_) => None,
            }
        };
        let range = Self {
            min: bound("min")?,
            max: bound("max")?,
        };
        match (range.min, range.max) {
            (Some(min), Some(max)) if min > max => None,
            _ => Some(range),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, n: f64) -> bool {
        self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
    }
}

fn within_params(n: f64, params: Option<&Value>) -> bool {
    match params.and_then(NumberRange::parse) {
        Some(range) => range.contains(n),
        None => true,
    }
}

fn range_params(params: &Value) -> bool {
    NumberRange::parse(params).is_some()
}

/// Find the ENUM member matching `value`. Exact matches win; a string also
/// matches a non-string member with the same rendering (`"1"` matches `1`).
pub(crate) fn enum_member<'a>(values: &'a [Value], value: &Value) -> Option<&'a Value> {
    values.iter().find(|v| *v == value).or_else(|| match value {
        Value::String(s) => values
            .iter()
            .find(|v| !v.is_string() && display_value(v) == s.trim()),
        _ => None,
    })
}

fn enum_params(params: &Value) -> bool {
    params
        .as_array()
        .map(|values| {
            !values.is_empty()
                && values
                    .iter()
                    .all(|v| v.is_string() || v.is_number() || v.is_boolean())
        })
        .unwrap_or(false)
}

fn parse_int_array(value: &Value) -> Value {
    let ints: Option<Vec<i64>> = match value {
        Value::String(s) => s.split(',').map(|p| p.trim().parse::<i64>().ok()).collect(),
        Value::Array(items) => items.iter().map(coerce_integer).collect(),
        _ => None,
    };
    ints.map(Value::from).unwrap_or_else(|| value.clone())
}

fn sort_int_array(value: &Value) -> Value {
    let ints: Option<Vec<i64>> = value
        .as_array()
        .and_then(|items| items.iter().map(Value::as_i64).collect());
    match ints {
        Some(mut ints) => {
            ints.sort_unstable();
            Value::from(ints)
        }
        None => value.clone(),
    }
}

fn parse_string_array(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Value::String(p.to_string()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|d| d.and_utc())
                })
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn format_date(value: &Value) -> Value {
    match parse_date(value) {
        Some(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => value.clone(),
    }
}

fn parse_json_string(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn trim(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

fn string_matches(value: &Value, pred: impl Fn(&str) -> bool) -> bool {
    value.as_str().map(pred).unwrap_or(false)
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("builtin pattern compiles"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &RE,
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
}

fn domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &RE,
        r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$",
    )
}

fn uuid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &RE,
        r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$",
    )
}

fn is_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Install every builtin type into `registry`.
pub(crate) fn install(registry: &mut TypeRegistry) {
    let mut add = |name: &str, entry: TypeEntry| registry.register_builtin(name, entry);

    add("Any", TypeEntry::new(|_, _| true).description("any value"));

    add(
        "String",
        TypeEntry::new(|v, _| v.is_string()).description("a string"),
    );
    add(
        "TrimString",
        TypeEntry::new(|v, _| v.is_string())
            .formatter(trim)
            .description("a string with surrounding whitespace removed"),
    );
    add(
        "NullableString",
        TypeEntry::new(|v, _| v.is_null() || v.is_string()).description("a string or null"),
    );

    add(
        "Number",
        TypeEntry::new(|v, params| {
            coerce_number(v)
                .and_then(|n| n.as_f64())
                .map(|n| within_params(n, params))
                .unwrap_or(false)
        })
        .parser(|v| coerce_number(v).unwrap_or_else(|| v.clone()))
        .params_checker(range_params)
        .description("a number, optionally bounded by params.min/params.max"),
    );
    add(
        "Integer",
        TypeEntry::new(|v, params| {
            coerce_integer(v)
                .map(|n| within_params(n as f64, params))
                .unwrap_or(false)
        })
        .parser(|v| coerce_integer(v).map(Value::from).unwrap_or_else(|| v.clone()))
        .params_checker(range_params)
        .description("an integer, optionally bounded by params.min/params.max"),
    );
    add(
        "Float",
        TypeEntry::new(|v, params| {
            coerce_float(v)
                .map(|n| within_params(n, params))
                .unwrap_or(false)
        })
        .parser(|v| {
            coerce_float(v)
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| v.clone())
        })
        .params_checker(range_params)
        .description("a floating point number, optionally bounded by params.min/params.max"),
    );
    add(
        "NullableInteger",
        TypeEntry::new(|v, _| v.is_null() || coerce_integer(v).is_some())
            .parser(|v| coerce_integer(v).map(Value::from).unwrap_or_else(|| v.clone()))
            .description("an integer or null"),
    );
    add(
        "Boolean",
        TypeEntry::new(|v, _| coerce_boolean(v).is_some())
            .parser(|v| coerce_boolean(v).map(Value::Bool).unwrap_or_else(|| v.clone()))
            .description("true or false"),
    );

    add(
        "Date",
        TypeEntry::new(|v, _| parse_date(v).is_some())
            .formatter(format_date)
            .description("an RFC 3339 timestamp, a YYYY-MM-DD date or epoch milliseconds"),
    );

    add(
        "Object",
        TypeEntry::new(|v, _| v.is_object()).description("an object"),
    );
    add(
        "Array",
        TypeEntry::new(|v, _| v.is_array())
            .params_checker(Descriptor::looks_like)
            .description("an array, optionally of the element descriptor given in params"),
    );
    add(
        "JSON",
        TypeEntry::new(|v, _| match v {
            Value::String(s) => serde_json::from_str::<Value>(s).is_ok(),
            _ => true,
        })
        .parser(parse_json_string)
        .description("a JSON document, parsed from its string form"),
    );
    add(
        "JSONString",
        TypeEntry::new(|v, _| {
            string_matches(v, |s| serde_json::from_str::<Value>(s.trim()).is_ok())
        })
        .formatter(trim)
        .description("a string containing JSON, kept as a string"),
    );

    add(
        "Email",
        TypeEntry::new(|v, _| string_matches(v, |s| email_regex().is_match(s)))
            .description("an email address"),
    );
    add(
        "URL",
        TypeEntry::new(|v, _| string_matches(v, is_url)).description("an http(s) URL"),
    );
    add(
        "Domain",
        TypeEntry::new(|v, _| string_matches(v, |s| domain_regex().is_match(s)))
            .description("a domain name"),
    );
    add(
        "Alpha",
        TypeEntry::new(|v, _| {
            string_matches(v, |s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()))
        })
        .description("ASCII letters only"),
    );
    add(
        "AlphaNumeric",
        TypeEntry::new(|v, _| {
            string_matches(v, |s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .description("ASCII letters and digits only"),
    );
    add(
        "Ascii",
        TypeEntry::new(|v, _| string_matches(v, |s| s.is_ascii())).description("ASCII text"),
    );
    add(
        "Base64",
        TypeEntry::new(|v, _| string_matches(v, |s| !s.is_empty() && STANDARD.decode(s).is_ok()))
            .description("standard base64 data"),
    );
    add(
        "Hex",
        TypeEntry::new(|v, _| string_matches(v, is_hex)).description("hexadecimal digits"),
    );
    add(
        "MongoIdString",
        TypeEntry::new(|v, _| string_matches(v, |s| s.len() == 24 && is_hex(s)))
            .description("a 24 character hexadecimal object id"),
    );
    add(
        "UUID",
        TypeEntry::new(|v, _| string_matches(v, |s| uuid_regex().is_match(s)))
            .formatter(|v| match v {
                Value::String(s) => Value::String(s.to_ascii_lowercase()),
                other => other.clone(),
            })
            .description("a UUID, normalized to lower case"),
    );

    add(
        "ENUM",
        TypeEntry::new(|v, params| {
            params
                .and_then(Value::as_array)
                .map(|values| enum_member(values, v).is_some())
                .unwrap_or(false)
        })
        .params_checker(enum_params)
        .params_required(true)
        .description("one of the values listed in params"),
    );

    add(
        "IntArray",
        TypeEntry::new(|v, _| {
            parse_int_array(v)
                .as_array()
                .map(|items| items.iter().all(Value::is_i64))
                .unwrap_or(false)
        })
        .parser(parse_int_array)
        .formatter(sort_int_array)
        .description("integers, from an array or a comma separated string, sorted ascending"),
    );
    add(
        "StringArray",
        TypeEntry::new(|v, _| {
            parse_string_array(v)
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false)
        })
        .parser(parse_string_array)
        .description("strings, from an array or a comma separated string"),
    );
}
