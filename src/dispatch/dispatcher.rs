use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::actions::{ActionContext, ActionRegistry};
use crate::auth::{authorize, Authorizer, Principal};
use crate::config;
use crate::database::{FieldWrite, Record, RecordStore};
use crate::schema::{ActionKind, ActionSchema, ModelSchema};
use crate::types::RecordKey;

use super::error::DispatchError;
use super::resolve::{plan_action_field, plan_field, FieldPlan, Resolved};

/// Result of a dispatched update
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub record: Record,
    pub message: Option<String>,
}

impl DispatchOutcome {
    pub fn new(record: Record) -> Self {
        Self { record, message: None }
    }

    pub fn with_message(record: Record, message: impl Into<String>) -> Self {
        Self {
            record,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelateOp {
    Attach,
    Detach,
}

/// Routes field and action updates to the base store or a custom handler.
/// Holds no per-request state.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    authorizer: Arc<dyn Authorizer>,
    actions: ActionRegistry,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn RecordStore>, authorizer: Arc<dyn Authorizer>, actions: ActionRegistry) -> Self {
        Self {
            store,
            authorizer,
            actions,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Apply `payload` to `record` under the field or action called `name`
    pub async fn dispatch(
        &self,
        principal: &Principal,
        schema: &ModelSchema,
        record: &Record,
        name: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome, DispatchError> {
        let outcome = match Resolved::resolve(schema, name) {
            Resolved::Field { name, field } => {
                self.require(principal, schema.update_permission_for(field), &schema.model, name)
                    .await?;
                let plan = plan_field(name, field, record, payload);
                self.write(schema, record, plan).await?
            }
            Resolved::Action(action) => self.run_action(principal, schema, record, action, payload).await?,
            Resolved::Unknown => {
                debug!("{}.{} is neither field nor action, delegating", schema.model, name);
                let write = FieldWrite::new(name, payload.get(name).cloned().unwrap_or(Value::Null));
                DispatchOutcome::new(self.store.update_field(schema, record, write).await?)
            }
        };
        audit(principal, &schema.model, record.key(), name);
        Ok(outcome)
    }

    async fn run_action(
        &self,
        principal: &Principal,
        schema: &ModelSchema,
        record: &Record,
        action: &ActionSchema,
        payload: &Value,
    ) -> Result<DispatchOutcome, DispatchError> {
        let slug = action.permission.as_deref().or(schema.permissions.update.as_deref());
        self.require(principal, slug, &schema.model, &action.key).await?;

        match &action.kind {
            ActionKind::FieldUpdate { field, toggle, value } => {
                let field_schema = schema.field(field).ok_or_else(|| {
                    DispatchError::NotFound(format!("Action '{}' targets unknown field '{}'", action.key, field))
                })?;
                let plan = plan_action_field(field, field_schema, record, *toggle, value.as_ref());
                self.write(schema, record, plan).await
            }
            ActionKind::ApiCall { .. } => {
                let handler = self.actions.get(&action.key).ok_or_else(|| {
                    DispatchError::NotFound(format!("No handler registered for action '{}'", action.key))
                })?;
                debug!("{} {} routed to action '{}'", schema.model, record.key(), action.key);
                handler
                    .handle(ActionContext {
                        store: self.store.as_ref(),
                        schema,
                        action,
                        record,
                        payload,
                    })
                    .await
            }
        }
    }

    async fn write(&self, schema: &ModelSchema, record: &Record, plan: FieldPlan) -> Result<DispatchOutcome, DispatchError> {
        debug!(
            "{}.{} on {} takes {:?} with {}",
            schema.model,
            plan.write.field,
            record.key(),
            plan.branch,
            plan.write.value
        );
        let field = plan.write.field.clone();
        let updated = self.store.update_field(schema, record, plan.write).await?;
        info!("Updated {}.{} on {}", schema.model, field, record.key());
        Ok(DispatchOutcome::new(updated))
    }

    /// Attach or detach `ids` on a direct relationship of `record`
    pub async fn relate(
        &self,
        principal: &Principal,
        schema: &ModelSchema,
        record: &Record,
        relation: &str,
        ids: &[RecordKey],
        op: RelateOp,
    ) -> Result<usize, DispatchError> {
        let relationship = schema.relationship(relation).ok_or_else(|| {
            DispatchError::NotFound(format!("Relationship '{}' not found on '{}'", relation, schema.model))
        })?;
        let slug = relationship
            .permission
            .as_deref()
            .or(schema.permissions.update.as_deref());
        self.require(principal, slug, &schema.model, relation).await?;

        let changed = match op {
            RelateOp::Attach => self.store.attach_related(schema, record, relationship, ids).await?,
            RelateOp::Detach => self.store.detach_related(schema, record, relationship, ids).await?,
        };
        info!(
            "{:?} {} {} on {} {} ({} changed)",
            op,
            ids.len(),
            relation,
            schema.model,
            record.key(),
            changed
        );
        audit(principal, &schema.model, record.key(), relation);
        Ok(changed)
    }

    /// Nothing declared means nothing to check
    async fn require(
        &self,
        principal: &Principal,
        permission: Option<&str>,
        model: &str,
        target: &str,
    ) -> Result<(), DispatchError> {
        let Some(slug) = permission else {
            return Ok(());
        };
        if authorize(self.authorizer.as_ref(), principal, slug).await? {
            return Ok(());
        }
        warn!("{} denied '{}' on {}.{}", principal.user_name, slug, model, target);
        Err(DispatchError::Forbidden(format!(
            "Access denied: '{}' is required for {}.{}",
            slug, model, target
        )))
    }
}

/// Who changed what, when `security.enable_audit_logging` is on
fn audit(principal: &Principal, model: &str, key: &RecordKey, name: &str) {
    if config::config().security.enable_audit_logging {
        info!(target: "audit", user = %principal.user_name, "{} {} {}", model, key, name);
    }
}
