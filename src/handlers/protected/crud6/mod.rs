// handlers/protected/crud6 - Generic schema-driven endpoints
//
// PUT    /api/crud6/:model/:id/:name        field update or action by name
// POST   /api/crud6/:model/:id/a/:action    action by key
// POST   /api/crud6/:model/:id/:relation    attach related ids
// DELETE /api/crud6/:model/:id/:relation    detach related ids
// GET    /api/crud6/:model/:id/:relation/via  provenance query

pub mod action;
pub mod field;
pub mod relation;
pub mod via;

pub use action::post as action_post;
pub use field::put as field_put;
pub use relation::{delete as relation_delete, post as relation_post};
pub use via::get as via_get;

use serde_json::{json, Value};

use crate::dispatch::DispatchOutcome;

/// Response body shared by field and action updates
pub(crate) fn outcome_body(outcome: DispatchOutcome) -> Value {
    json!({
        "message": outcome.message,
        "record": outcome.record.to_api_value(),
    })
}
