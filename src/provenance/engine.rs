use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::filter::{Filter, ListQuery, Page, Row};
use crate::schema::ModelSchema;
use crate::types::RecordKey;

use super::error::ProvenanceError;
use super::relation::RelationSpec;
use super::store::{Intermediate, Link, RelationStore};

/// A target entity plus the intermediates that justify it
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceRow {
    pub key: RecordKey,
    pub target: Row,
    pub via: Vec<String>,
}

impl ProvenanceRow {
    pub fn into_row(self, via_column: &str) -> Row {
        let mut row = self.target;
        row.insert(
            via_column.to_string(),
            Value::Array(self.via.into_iter().map(Value::String).collect()),
        );
        row
    }
}

pub struct ProvenanceEngine {
    store: Arc<dyn RelationStore>,
}

impl ProvenanceEngine {
    pub fn new(store: Arc<dyn RelationStore>) -> Self {
        Self { store }
    }

    /// Distinct targets reachable from `owner`, each annotated with its via
    /// list, then filtered, sorted and paginated by `query`.
    pub async fn query(
        &self,
        owner: &RecordKey,
        spec: &RelationSpec,
        query: &ListQuery,
    ) -> Result<Page, ProvenanceError> {
        // Reject bad column names before touching the store
        let mut filter = Filter::new(&spec.target)?;
        filter.assign(query, &spec.target)?;

        let via_column = spec.via_column();
        let rows = self
            .collect(owner, spec)
            .await?
            .into_iter()
            .map(|r| r.into_row(&via_column))
            .collect();

        Ok(filter.apply(rows))
    }

    /// Unfiltered provenance rows ordered by target key
    pub async fn collect(&self, owner: &RecordKey, spec: &RelationSpec) -> Result<Vec<ProvenanceRow>, ProvenanceError> {
        if !self.store.owner_exists(spec, owner).await? {
            return Err(ProvenanceError::NotFound(format!(
                "{} {} not found",
                spec.owner_model, owner
            )));
        }

        let intermediates = self.store.intermediates(spec, owner).await?;
        if intermediates.is_empty() {
            debug!("{} {} has no {}", spec.owner_model, owner, spec.intermediate_model);
            return Ok(Vec::new());
        }

        let intermediate_keys: Vec<RecordKey> = intermediates.iter().map(|i| i.key.clone()).collect();
        let links = self.store.target_links(spec, &intermediate_keys).await?;
        let groups = group_links(&intermediates, links);
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let target_keys: Vec<RecordKey> = groups.keys().cloned().collect();
        let mut targets: HashMap<RecordKey, Row> = HashMap::new();
        for row in self.store.targets(spec, &target_keys).await? {
            if let Some(key) = row.get(&spec.target.primary_key).and_then(RecordKey::from_value) {
                targets.insert(key, project(row, &spec.target));
            }
        }

        let rows: Vec<ProvenanceRow> = groups
            .into_iter()
            .filter_map(|(key, via)| {
                let target = targets.remove(&key)?;
                Some(ProvenanceRow { key, target, via })
            })
            .collect();

        debug!(
            "{} {} reaches {} {} via {} {}",
            spec.owner_model,
            owner,
            rows.len(),
            spec.target.model,
            intermediate_keys.len(),
            spec.intermediate_model
        );
        Ok(rows)
    }
}

/// Group (target, intermediate) pairs by target. Each via list names every
/// distinct intermediate once, in ascending intermediate key order; links to
/// intermediates outside `intermediates` are ignored.
pub fn group_links(intermediates: &[Intermediate], links: Vec<Link>) -> BTreeMap<RecordKey, Vec<String>> {
    let mut ordered: Vec<&Intermediate> = intermediates.iter().collect();
    ordered.sort_by(|a, b| a.key.cmp(&b.key));
    ordered.dedup_by(|a, b| a.key == b.key);
    let position: HashMap<&RecordKey, usize> = ordered.iter().enumerate().map(|(i, m)| (&m.key, i)).collect();

    let mut grouped: BTreeMap<RecordKey, Vec<usize>> = BTreeMap::new();
    for link in links {
        if let Some(&pos) = position.get(&link.intermediate) {
            grouped.entry(link.target).or_default().push(pos);
        }
    }

    grouped
        .into_iter()
        .map(|(target, mut positions)| {
            positions.sort_unstable();
            positions.dedup();
            let via = positions.into_iter().map(|p| ordered[p].label.clone()).collect();
            (target, via)
        })
        .collect()
}

/// Keep only the columns a list view may show: listable fields and the key
fn project(mut row: Row, schema: &ModelSchema) -> Row {
    row.retain(|column, _| {
        column == &schema.primary_key || schema.field(column).map(|f| f.listable).unwrap_or(false)
    });
    row
}
