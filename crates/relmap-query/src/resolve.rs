//! Relation Resolver.
//!
//! Relations load with follow-up queries, never joins. Every relation kind
//! is driven by the same pair from its [`Relation`]: the owner field that
//! holds the key and the target column it is matched against.
//!
//! - [`resolve_one`] issues one `= ?` query per relation for a single parent.
//! - [`resolve_many`] issues one `IN (...)` query per relation for a whole
//!   result set, then buckets the rows back onto the parents by key.
//!
//! Relations are resolved one after another in declaration order. Any
//! query or scan failure aborts the load.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use relmap_core::{
    Cx, Descriptor, Error, Executor, Model, Outcome, Relation, RelationKey, RelationKind, Row,
    try_outcome, try_result,
};

fn owner_key<M: Model>(record: &M, rel: &Relation) -> Option<RelationKey> {
    record
        .field_value(&rel.owner_key)
        .as_ref()
        .and_then(RelationKey::from_value)
}

/// Load every relation of a single, already scanned parent.
#[tracing::instrument(level = "debug", skip_all, fields(model = M::TYPE_NAME))]
pub async fn resolve_one<M: Model, E: Executor>(
    cx: &Cx,
    executor: &E,
    desc: &Descriptor,
    parent: &mut M,
) -> Outcome<(), Error> {
    for rel in &desc.relations {
        let Some(key) = owner_key(parent, rel) else {
            tracing::trace!(relation = rel.field, "relation key is NULL; no query issued");
            continue;
        };

        let mut sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            rel.table, rel.target_column
        );
        if rel.kind != RelationKind::HasMany {
            sql.push_str(" LIMIT 1");
        }
        tracing::trace!(sql = %sql, relation = rel.field, "Relation query");

        let rows = try_outcome!(executor.query(cx, &sql, &[key.to_value()]).await);
        let refs: Vec<&Row> = rows.iter().collect();
        try_result!(parent.assign_related(rel.field, &refs));
    }
    Outcome::Ok(())
}

/// Load every relation for a set of parents from the same result set.
///
/// One query per relation regardless of the number of parents; a relation
/// whose key set is empty issues no query at all.
#[tracing::instrument(level = "debug", skip_all, fields(model = M::TYPE_NAME, parents = parents.len()))]
pub async fn resolve_many<M: Model, E: Executor>(
    cx: &Cx,
    executor: &E,
    desc: &Descriptor,
    parents: &mut [M],
) -> Outcome<(), Error> {
    if parents.is_empty() {
        return Outcome::Ok(());
    }

    for rel in &desc.relations {
        let mut groups: HashMap<RelationKey, Vec<usize>> = HashMap::new();
        let mut keys = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            let Some(key) = owner_key(parent, rel) else {
                continue;
            };
            match groups.entry(key) {
                Entry::Occupied(mut e) => e.get_mut().push(i),
                Entry::Vacant(e) => {
                    keys.push(e.key().to_value());
                    e.insert(vec![i]);
                }
            }
        }

        if keys.is_empty() {
            tracing::debug!(relation = rel.field, "no keys to load; query skipped");
            continue;
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT * FROM {} WHERE {} IN ({})",
            rel.table, rel.target_column, placeholders
        );
        tracing::trace!(sql = %sql, relation = rel.field, "Batched relation query");

        let rows = try_outcome!(executor.query(cx, &sql, &keys).await);
        tracing::debug!(
            relation = rel.field,
            keys = keys.len(),
            rows = rows.len(),
            "Batched relation loaded"
        );

        let mut matched: Vec<Vec<&Row>> = vec![Vec::new(); parents.len()];
        for row in &rows {
            let Some(key) = row
                .get_by_name(rel.target_column)
                .and_then(RelationKey::from_value)
            else {
                continue;
            };
            if let Some(indices) = groups.get(&key) {
                for &i in indices {
                    matched[i].push(row);
                }
            }
        }

        for (parent, rows) in parents.iter_mut().zip(&matched) {
            try_result!(parent.assign_related(rel.field, rows));
        }
    }
    Outcome::Ok(())
}
