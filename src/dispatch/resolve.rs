use serde_json::Value;

use crate::database::{FieldWrite, Record};
use crate::schema::{ActionSchema, FieldSchema, FieldType, ModelSchema};

/// Generic payload key that forces a toggle field to flip
pub const TOGGLE_MARKER: &str = "toggle";

/// What a field-or-action name refers to on a schema
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Field { name: &'a str, field: &'a FieldSchema },
    Action(&'a ActionSchema),
    /// Neither; left for the base store to reject
    Unknown,
}

impl<'a> Resolved<'a> {
    /// Fields shadow actions of the same name
    pub fn resolve(schema: &'a ModelSchema, name: &'a str) -> Self {
        if let Some(field) = schema.field(name) {
            return Resolved::Field { name, field };
        }
        match schema.action(name) {
            Some(action) => Resolved::Action(action),
            None => Resolved::Unknown,
        }
    }
}

/// The branch a field update takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Flip the stored value; the write carries the value it read
    FieldToggle,
    /// Explicit value on a toggle field, normalised to a boolean
    FieldCoerce,
    /// Any other field; the value goes to the store as supplied
    FieldPassthrough,
}

/// A planned field write plus the branch that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    pub branch: Branch,
    pub write: FieldWrite,
}

/// Present and non-null, like a form field that was actually submitted
fn supplied<'p>(payload: &'p Value, key: &str) -> Option<&'p Value> {
    payload.get(key).filter(|v| !v.is_null())
}

fn toggle_requested(payload: &Value) -> bool {
    payload.get(TOGGLE_MARKER) == Some(&Value::Bool(true))
}

/// Decide how a payload updates `field` on `record`. A toggle marker wins
/// over an explicit value.
pub fn plan_field(name: &str, field: &FieldSchema, record: &Record, payload: &Value) -> FieldPlan {
    if !field.is_toggle() {
        let value = supplied(payload, name).cloned().unwrap_or(Value::Null);
        return FieldPlan {
            branch: Branch::FieldPassthrough,
            write: FieldWrite::new(name, value),
        };
    }

    match supplied(payload, name) {
        Some(value) if !toggle_requested(payload) => FieldPlan {
            branch: Branch::FieldCoerce,
            write: FieldWrite::new(name, coerce_bool(value.clone())),
        },
        _ => FieldPlan {
            branch: Branch::FieldToggle,
            write: toggled(name, record),
        },
    }
}

/// Negate the current value, expecting it to be unchanged at write time
pub fn toggled(name: &str, record: &Record) -> FieldWrite {
    let current = record.get(name).cloned().unwrap_or(Value::Null);
    FieldWrite::new(name, !record.get_bool(name)).expecting(current)
}

/// Plan the write a `field_update` action performs
pub fn plan_action_field(
    name: &str,
    field: &FieldSchema,
    record: &Record,
    toggle: bool,
    value: Option<&Value>,
) -> FieldPlan {
    if toggle {
        return FieldPlan {
            branch: Branch::FieldToggle,
            write: toggled(name, record),
        };
    }
    let value = value.cloned().unwrap_or(Value::Null);
    match field.field_type {
        FieldType::Boolean => FieldPlan {
            branch: Branch::FieldCoerce,
            write: FieldWrite::new(name, coerce_bool(value)),
        },
        _ => FieldPlan {
            branch: Branch::FieldPassthrough,
            write: FieldWrite::new(name, value),
        },
    }
}

/// `"true"`, `"1"`, `1` become true; `"false"`, `"0"`, `0` become false.
/// Anything else comes back untouched for the store to judge.
pub fn coerce_bool(value: Value) -> Value {
    match &value {
        Value::String(s) if s == "true" || s == "1" => Value::Bool(true),
        Value::String(s) if s == "false" || s == "0" => Value::Bool(false),
        Value::Number(n) if n.as_i64() == Some(1) => Value::Bool(true),
        Value::Number(n) if n.as_i64() == Some(0) => Value::Bool(false),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKey;
    use serde_json::json;

    fn toggle_field() -> FieldSchema {
        serde_json::from_value(json!({ "type": "boolean", "toggle": true })).unwrap()
    }

    fn record(enabled: Value) -> Record {
        let fields = json!({ "id": 1, "flag_enabled": enabled }).as_object().cloned().unwrap();
        Record::new("users", RecordKey::Int(1), fields)
    }

    #[test]
    fn coerces_known_boolean_spellings() {
        assert_eq!(coerce_bool(json!("true")), json!(true));
        assert_eq!(coerce_bool(json!("1")), json!(true));
        assert_eq!(coerce_bool(json!(1)), json!(true));
        assert_eq!(coerce_bool(json!("false")), json!(false));
        assert_eq!(coerce_bool(json!("0")), json!(false));
        assert_eq!(coerce_bool(json!(0)), json!(false));
        assert_eq!(coerce_bool(json!(false)), json!(false));
    }

    #[test]
    fn leaves_other_representations_alone() {
        assert_eq!(coerce_bool(json!("yes")), json!("yes"));
        assert_eq!(coerce_bool(json!("TRUE")), json!("TRUE"));
        assert_eq!(coerce_bool(json!(2)), json!(2));
        assert_eq!(coerce_bool(json!(1.0)), json!(1.0));
    }

    #[test]
    fn empty_payload_toggles_from_current_value() {
        let plan = plan_field("flag_enabled", &toggle_field(), &record(json!(true)), &json!({}));
        assert_eq!(plan.branch, Branch::FieldToggle);
        assert_eq!(plan.write.value, json!(false));
        assert_eq!(plan.write.expected, Some(json!(true)));
    }

    #[test]
    fn null_value_counts_as_absent() {
        let plan = plan_field("flag_enabled", &toggle_field(), &record(json!(false)), &json!({ "flag_enabled": null }));
        assert_eq!(plan.branch, Branch::FieldToggle);
        assert_eq!(plan.write.value, json!(true));
    }

    #[test]
    fn explicit_value_is_coerced() {
        let plan = plan_field("flag_enabled", &toggle_field(), &record(json!(true)), &json!({ "flag_enabled": "0" }));
        assert_eq!(plan.branch, Branch::FieldCoerce);
        assert_eq!(plan.write.value, json!(false));
        assert_eq!(plan.write.expected, None);
    }

    #[test]
    fn toggle_marker_beats_explicit_value() {
        let payload = json!({ "flag_enabled": true, "toggle": true });
        let plan = plan_field("flag_enabled", &toggle_field(), &record(json!(true)), &payload);
        assert_eq!(plan.branch, Branch::FieldToggle);
        assert_eq!(plan.write.value, json!(false));
    }

    #[test]
    fn only_literal_true_marker_toggles() {
        let payload = json!({ "flag_enabled": "1", "toggle": "true" });
        let plan = plan_field("flag_enabled", &toggle_field(), &record(json!(false)), &payload);
        assert_eq!(plan.branch, Branch::FieldCoerce);
        assert_eq!(plan.write.value, json!(true));
    }

    #[test]
    fn non_toggle_fields_pass_values_through() {
        let field: FieldSchema = serde_json::from_value(json!({ "type": "string" })).unwrap();
        let plan = plan_field("first_name", &field, &record(json!(true)), &json!({ "first_name": "1" }));
        assert_eq!(plan.branch, Branch::FieldPassthrough);
        assert_eq!(plan.write.value, json!("1"));
    }
}
