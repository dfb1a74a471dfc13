//! Schema-driven update dispatch.
//!
//! A request names either a field or an action. Fields go through the
//! toggle/coerce/passthrough planner and then the base store; actions are
//! permission-checked and then applied as a field write or handed to a
//! registered handler.

pub mod dispatcher;
pub mod error;
pub mod resolve;

pub use dispatcher::{DispatchOutcome, Dispatcher, RelateOp};
pub use error::DispatchError;
pub use resolve::{coerce_bool, plan_field, Branch, FieldPlan, Resolved};
