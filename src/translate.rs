//! Translation of low-level validation failures into [`ParamError`]s.
//!
//! This is the only module that looks inside `jsonschema` errors or native
//! [`Issue`] lists. Everything else works with the three domain kinds.

use std::collections::BTreeSet;

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use serde_json::Value;

use crate::error::ParamError;
use crate::native::{Issue, IssueCode, PathSegment};
use crate::types::display_value;

/// Convert one `jsonschema` error into an [`Issue`].
///
/// `root` is the validated instance; it disambiguates numeric path
/// segments between array indices and object keys.
pub(crate) fn issue_from_json_schema(
    schema: &Value,
    root: &Value,
    error: &ValidationError<'_>,
) -> Issue {
    let mut path = instance_path(root, &error.instance_path.to_string());
    let schema_path = error.schema_path.to_string();
    let message = error.to_string();

    if let ValidationErrorKind::Required { property } = &error.kind {
        path.push(PathSegment::Key(display_value(property)));
        return Issue::new(IssueCode::Missing, path, message);
    }

    let (parent, keyword) = match schema_path.rsplit_once('/') {
        Some((parent, keyword)) => (parent, keyword),
        None => ("", schema_path.as_str()),
    };

    if keyword == "type" {
        let issue = Issue::new(IssueCode::InvalidType, path, message);
        return match schema.pointer(&schema_path).and_then(type_name) {
            Some(expected) => issue.expected(expected),
            None => issue,
        };
    }

    let expected = schema
        .pointer(parent)
        .and_then(|s| s.get("type"))
        .and_then(type_name)
        .unwrap_or_else(|| keyword.to_string());
    Issue::new(IssueCode::Constraint, path, message).expected(expected)
}

fn type_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let names: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!names.is_empty()).then(|| names.join(" or "))
        }
        _ => None,
    }
}

fn instance_path(root: &Value, pointer: &str) -> Vec<PathSegment> {
    let mut path = Vec::new();
    let mut current = Some(root);
    for part in pointer.split('/').skip(1) {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        match (current, key.parse::<usize>()) {
            (Some(Value::Array(items)), Ok(index)) => {
                current = items.get(index);
                path.push(PathSegment::Index(index));
            }
            _ => {
                current = current.and_then(|v| v.get(&key));
                path.push(PathSegment::Key(key));
            }
        }
    }
    path
}

/// Translate a single issue. `root` names the whole input when the issue
/// has an empty path.
pub fn translate_issue(issue: &Issue, root: &str) -> ParamError {
    let name = match issue.path_string() {
        p if p.is_empty() => root.to_string(),
        p => p,
    };
    match issue.code {
        IssueCode::Missing => ParamError::missing(name),
        IssueCode::InvalidType | IssueCode::Constraint => {
            let expected = issue.expected.clone().unwrap_or_else(|| issue.message.clone());
            ParamError::invalid(name, expected)
        }
    }
}

/// Translate a failed native parse.
///
/// If every member of a required-one-of group is reported missing, the
/// group error wins. Otherwise a group member that was supplied but
/// rejected is reported ahead of the missing ones, and failing that the
/// first issue is reported.
pub fn translate_issues(issues: &[Issue], one_of: &[Vec<String>], root: &str) -> ParamError {
    let missing: BTreeSet<&str> = issues
        .iter()
        .filter(|i| i.code == IssueCode::Missing && i.path.len() == 1)
        .filter_map(Issue::field)
        .collect();

    if let Some(group) = one_of
        .iter()
        .find(|g| !g.is_empty() && g.iter().all(|f| missing.contains(f.as_str())))
    {
        return ParamError::missing_one_of(group.iter().cloned());
    }

    let in_group = |issue: &&Issue| {
        issue.code != IssueCode::Missing
            && issue
                .field()
                .map_or(false, |f| one_of.iter().flatten().any(|m| m == f))
    };
    match issues.iter().find(in_group).or_else(|| issues.first()) {
        Some(issue) => translate_issue(issue, root),
        None => ParamError::internal(format!(
            "native schema rejected '{root}' without reporting an issue"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn instance_path_distinguishes_indices() {
        let root = json!({ "items": [{ "0": "x" }] });
        assert_eq!(
            instance_path(&root, "/items/0/0"),
            vec![key("items"), PathSegment::Index(0), key("0")]
        );
        assert_eq!(instance_path(&root, ""), Vec::<PathSegment>::new());
        assert_eq!(instance_path(&json!({}), "/a~1b"), vec![key("a/b")]);
    }

    #[test]
    fn missing_issue_becomes_missing_parameter() {
        let err = translate_issue(&Issue::missing("id"), "query");
        assert_eq!(err.to_string(), "missing required parameter 'id'");
    }

    #[test]
    fn invalid_issue_names_expected_type() {
        let issue = Issue::new(
            IssueCode::InvalidType,
            vec![key("age")],
            "\"x\" is not of type \"integer\"",
        )
        .expected("integer");
        assert_eq!(
            translate_issue(&issue, "body").to_string(),
            "incorrect parameter 'age' should be valid integer"
        );
    }

    #[test]
    fn issue_without_expected_uses_message() {
        let issue = Issue::new(IssueCode::Constraint, vec![], "must be even");
        assert_eq!(
            translate_issue(&issue, "body").to_string(),
            "incorrect parameter 'body' should be valid must be even"
        );
    }

    #[test]
    fn all_group_members_missing_reports_group() {
        let issues = vec![Issue::missing("a"), Issue::missing("b")];
        let groups = vec![vec!["a".to_string(), "b".to_string()]];
        assert_eq!(
            translate_issues(&issues, &groups, "body").to_string(),
            "missing required parameter one of a, b is required"
        );
    }

    #[test]
    fn partial_group_reports_first_issue() {
        let issues = vec![
            Issue::new(IssueCode::InvalidType, vec![key("a")], "bad").expected("string"),
            Issue::missing("b"),
        ];
        let groups = vec![vec!["a".to_string(), "b".to_string()]];
        assert_eq!(
            translate_issues(&issues, &groups, "body").to_string(),
            "incorrect parameter 'a' should be valid string"
        );
    }

    #[test]
    fn partial_group_prefers_rejected_member_over_missing_one() {
        let issues = vec![
            Issue::missing("b"),
            Issue::new(IssueCode::InvalidType, vec![key("a")], "bad").expected("integer"),
        ];
        let groups = vec![vec!["a".to_string(), "b".to_string()]];
        assert_eq!(
            translate_issues(&issues, &groups, "body").to_string(),
            "incorrect parameter 'a' should be valid integer"
        );
    }

    #[test]
    fn issue_outside_groups_keeps_first() {
        let issues = vec![
            Issue::missing("id"),
            Issue::new(IssueCode::InvalidType, vec![key("age")], "bad").expected("integer"),
        ];
        assert_eq!(
            translate_issues(&issues, &[], "body").to_string(),
            "missing required parameter 'id'"
        );
    }

    #[test]
    fn empty_issue_list_is_internal() {
        assert!(translate_issues(&[], &[], "body").is_internal());
    }
}
