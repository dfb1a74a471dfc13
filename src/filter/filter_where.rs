use serde_json::Value;
use std::collections::BTreeMap;

use crate::schema::ModelSchema;

use super::error::FilterError;
use super::types::{FilterWhereInfo, MatchMode, Row};

/// Compiled set of column predicates; a row must satisfy every one
#[derive(Debug, Clone, Default)]
pub struct FilterWhere {
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `filters` against `schema` and compile them into predicates.
    /// Blank values are ignored.
    pub fn build(filters: &BTreeMap<String, String>, schema: &ModelSchema) -> Result<Self, FilterError> {
        let mut filter_where = Self::new();
        for (column, raw) in filters {
            let field = schema
                .field(column)
                .ok_or_else(|| FilterError::InvalidColumn(column.clone()))?;
            if !(field.listable && field.filterable) {
                return Err(FilterError::NotFilterable(column.clone()));
            }

            let alternatives: Vec<String> = raw
                .split("||")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if alternatives.is_empty() {
                continue;
            }

            let mode = if field.field_type.is_textual() {
                MatchMode::Contains
            } else {
                MatchMode::Equals
            };
            filter_where.conditions.push(FilterWhereInfo {
                column: column.clone(),
                alternatives,
                mode,
            });
        }
        Ok(filter_where)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| Self::matches_condition(c, row.get(&c.column)))
    }

    fn matches_condition(condition: &FilterWhereInfo, value: Option<&Value>) -> bool {
        let value = match value {
            Some(v) => v,
            None => return false,
        };
        condition.alternatives.iter().any(|needle| match condition.mode {
            MatchMode::Contains => render(value)
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            MatchMode::Equals => equals(value, needle),
        })
    }
}

/// Render a JSON scalar the way it would appear in a list cell
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn equals(value: &Value, needle: &str) -> bool {
    match value {
        Value::Bool(b) => match needle.to_ascii_lowercase().as_str() {
            "true" | "1" => *b,
            "false" | "0" => !*b,
            _ => false,
        },
        Value::Number(n) => match (n.as_f64(), needle.parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => n.to_string() == needle,
        },
        other => render(other).eq_ignore_ascii_case(needle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ModelSchema {
        serde_json::from_value(json!({
            "model": "permissions",
            "table": "permissions",
            "primary_key": "id",
            "fields": {
                "id": { "type": "integer", "listable": true, "sortable": true, "filterable": true },
                "slug": { "type": "string", "listable": true, "filterable": true },
                "active": { "type": "boolean", "listable": true, "filterable": true },
                "secret": { "type": "string" }
            }
        }))
        .unwrap()
    }

    fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn textual_columns_match_case_insensitive_substrings() {
        let w = FilterWhere::build(&filters(&[("slug", "FILTER_test")]), &schema()).unwrap();
        assert!(w.matches(&row(json!({ "slug": "filter_test_1" }))));
        assert!(!w.matches(&row(json!({ "slug": "other_permission" }))));
    }

    #[test]
    fn alternatives_are_or_ed() {
        let w = FilterWhere::build(&filters(&[("slug", "alpha || beta")]), &schema()).unwrap();
        assert!(w.matches(&row(json!({ "slug": "beta_perm" }))));
        assert!(!w.matches(&row(json!({ "slug": "gamma" }))));
    }

    #[test]
    fn non_textual_columns_use_equality() {
        let w = FilterWhere::build(&filters(&[("id", "1")]), &schema()).unwrap();
        assert!(w.matches(&row(json!({ "id": 1 }))));
        assert!(!w.matches(&row(json!({ "id": 11 }))));

        let w = FilterWhere::build(&filters(&[("active", "1")]), &schema()).unwrap();
        assert!(w.matches(&row(json!({ "active": true }))));
        assert!(!w.matches(&row(json!({ "active": false }))));
    }

    #[test]
    fn blank_values_are_ignored() {
        let w = FilterWhere::build(&filters(&[("slug", "  ")]), &schema()).unwrap();
        assert!(w.is_empty());
    }

    #[test]
    fn rejects_unknown_and_unfilterable_columns() {
        assert_eq!(
            FilterWhere::build(&filters(&[("roles_via", "x")]), &schema()).unwrap_err(),
            FilterError::InvalidColumn("roles_via".into())
        );
        assert_eq!(
            FilterWhere::build(&filters(&[("secret", "x")]), &schema()).unwrap_err(),
            FilterError::NotFilterable("secret".into())
        );
    }
}
