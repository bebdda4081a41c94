//! Marker metadata join onto the final edge list

use crate::identity::{Id, IdColumn, IdKind};
use crate::records::{Edge, EnrichedEdge, MarkerRecord};
use crate::regroup::CategoryMap;
use crate::table::Table;
use crate::{Error, Result};
use ahash::{AHashMap, AHashSet};
use tracing::{info, warn};

/// Marker metadata keyed by identity.
///
/// Markers listed more than once keep their first occurrence, so the join
/// never multiplies edges.
#[derive(Debug, Clone)]
pub struct MarkerIndex {
    table: String,
    by_id: AHashMap<Id, MarkerRecord>,
    kind: Option<IdKind>,
    duplicates: usize,
}

impl MarkerIndex {
    pub fn new(markers: Table<MarkerRecord>) -> Result<Self> {
        let kind = markers.id_kind(IdColumn::MarkerId)?;
        let table = markers.name().to_string();

        let mut by_id = AHashMap::with_capacity(markers.len());
        let mut duplicates = 0;
        for marker in markers {
            if by_id.contains_key(&marker.marker_id) {
                duplicates += 1;
                continue;
            }
            by_id.insert(marker.marker_id.clone(), marker);
        }

        if duplicates > 0 {
            warn!(
                "'{}' lists {} duplicate marker ids; keeping first occurrences",
                table, duplicates
            );
        }

        Ok(Self {
            table,
            by_id,
            kind,
            duplicates,
        })
    }

    pub fn get(&self, id: &Id) -> Option<&MarkerRecord> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of rows dropped as repeated identities.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Fail when `edges` store marker ids of a different kind.
    pub fn check_compatible(&self, edges: &Table<Edge>) -> Result<()> {
        if let (Some(marker_kind), Some(edge_kind)) = (self.kind, edges.id_kind(IdColumn::MarkerId)?) {
            if marker_kind != edge_kind {
                return Err(Error::IncompatibleIdentity {
                    column: IdColumn::MarkerId,
                    source_table: self.table.clone(),
                    source_kind: marker_kind,
                    dependent_table: edges.name().to_string(),
                    dependent_kind: edge_kind,
                });
            }
        }
        Ok(())
    }
}

/// Distinct followers per marker in `edges`.
pub fn retained_follower_counts(edges: &Table<Edge>) -> AHashMap<Id, usize> {
    let mut followers: AHashMap<&Id, AHashSet<&Id>> = AHashMap::new();
    for edge in edges {
        followers
            .entry(&edge.marker_id)
            .or_default()
            .insert(&edge.follower_id);
    }
    followers
        .into_iter()
        .map(|(marker, set)| (marker.clone(), set.len()))
        .collect()
}

/// Left-join marker metadata and retained-follower counts onto `edges`.
///
/// Edges whose marker has no metadata keep empty enrichment fields.
pub fn enrich_edges(
    edges: &Table<Edge>,
    markers: &MarkerIndex,
    categories: &CategoryMap,
) -> Result<Table<EnrichedEdge>> {
    markers.check_compatible(edges)?;

    let counts = retained_follower_counts(edges);
    let mut unmatched = 0usize;
    let rows: Vec<EnrichedEdge> = edges
        .iter()
        .map(|edge| {
            let marker = markers.get(&edge.marker_id);
            if marker.is_none() {
                unmatched += 1;
            }
            let category = marker.and_then(|m| m.category.clone());
            EnrichedEdge {
                marker_id: edge.marker_id.clone(),
                follower_id: edge.follower_id.clone(),
                twitter_name: marker.and_then(|m| m.twitter_name.clone()),
                coarse_category: category
                    .as_deref()
                    .map(|label| categories.regroup(label).to_string()),
                category,
                marker_followers: marker.and_then(|m| m.followers),
                retained_followers: counts.get(&edge.marker_id).copied().unwrap_or(0),
            }
        })
        .collect();

    if unmatched > 0 {
        warn!("{} edges reference markers without metadata", unmatched);
    }
    info!("Enriched {} edges", rows.len());

    Ok(edges.with_rows(rows))
}
