use std::collections::HashMap;

use crate::models::reaction::{ReactionRow, ReactionSummary, ReactionType};

/// Aggregates a flat collection of reaction rows into per-entity summaries.
///
/// Single pass: rows are grouped by entity id, counts tallied per type, and
/// the viewer's own reaction recorded when `viewer` matches the reactor. By
/// the store's uniqueness constraint there is at most one row per
/// (entity, reactor) pair, so the viewer lookup cannot be ambiguous.
///
/// An entity with zero rows is simply absent from the result; use
/// [`summary_for`] to get an empty default instead of an error.
pub fn aggregate_reactions(
    rows: &[ReactionRow],
    viewer: Option<&str>,
) -> HashMap<String, ReactionSummary> {
    let mut by_entity: HashMap<String, ReactionSummary> = HashMap::new();

    for row in rows {
        let summary = by_entity.entry(row.entity_id.clone()).or_default();
        let rtype = ReactionType::from_raw(&row.reaction_type);
        *summary.counts.entry(rtype).or_insert(0) += 1;

        if viewer.is_some_and(|v| v == row.user_id) {
            summary.viewer_reaction = Some(rtype);
        }
    }

    by_entity
}

/// Looks up one entity's summary, defaulting to empty counts and no viewer
/// reaction for entities nobody has reacted to.
pub fn summary_for(
    summaries: &HashMap<String, ReactionSummary>,
    entity_id: &str,
) -> ReactionSummary {
    summaries.get(entity_id).cloned().unwrap_or_default()
}
