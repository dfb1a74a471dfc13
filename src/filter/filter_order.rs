use serde_json::Value;
use std::cmp::Ordering;

use crate::schema::ModelSchema;

use super::error::FilterError;
use super::types::{FilterOrderInfo, Row, SortDirection};

/// Validated ordering with a primary-key tie-break
#[derive(Debug, Clone)]
pub struct FilterOrder {
    infos: Vec<FilterOrderInfo>,
    primary_key: String,
}

impl FilterOrder {
    /// Validate requested sorts against `schema`; with none requested the
    /// schema's `default_sort` applies.
    pub fn build(requested: &[FilterOrderInfo], schema: &ModelSchema) -> Result<Self, FilterError> {
        let infos = if requested.is_empty() {
            schema
                .default_sort
                .iter()
                .map(|(column, sort)| FilterOrderInfo { column: column.clone(), sort: *sort })
                .collect()
        } else {
            for info in requested {
                let field = schema
                    .field(&info.column)
                    .ok_or_else(|| FilterError::InvalidColumn(info.column.clone()))?;
                if !(field.listable && field.sortable) {
                    return Err(FilterError::NotSortable(info.column.clone()));
                }
            }
            requested.to_vec()
        };

        Ok(Self {
            infos,
            primary_key: schema.primary_key.clone(),
        })
    }

    /// Parse `"name desc, slug"` style order strings
    pub fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let sort = SortDirection::parse(it.next().unwrap_or("asc"));
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for info in &self.infos {
            let ord = compare_values(a.get(&info.column), b.get(&info.column));
            let ord = match info.sort {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        // Equal rows always fall back to ascending primary key
        compare_values(a.get(&self.primary_key), b.get(&self.primary_key))
    }

    pub fn sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

/// Total order over JSON scalars: null < bool < number < string < other
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i.cmp(&j),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&y.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (Some(x), Some(y)) if type_rank(a) == type_rank(b) && type_rank(a) == 4 => {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
