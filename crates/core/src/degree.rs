//! Degree filtering of the follower/marker edge list
//!
//! Duplicate edges are dropped first (first occurrence kept), then edges are
//! grouped by one endpoint and kept only when that endpoint's degree reaches
//! the threshold.

use crate::identity::{Id, IdColumn};
use crate::records::Edge;
use crate::table::Table;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// Edge endpoint a degree is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Follower,
    Marker,
}

impl Role {
    pub fn column(self) -> IdColumn {
        match self {
            Role::Follower => IdColumn::FollowerId,
            Role::Marker => IdColumn::MarkerId,
        }
    }

    pub fn endpoint(self, edge: &Edge) -> &Id {
        match self {
            Role::Follower => &edge.follower_id,
            Role::Marker => &edge.marker_id,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => f.write_str("follower"),
            Role::Marker => f.write_str("marker"),
        }
    }
}

/// Drop repeated (marker, follower) pairs, keeping the first occurrence.
///
/// Returns the deduplicated table and the number of duplicates removed.
pub fn dedup_edges(edges: Table<Edge>) -> (Table<Edge>, usize) {
    let before = edges.len();
    let name = edges.name().to_string();

    let mut seen: AHashSet<Edge> = AHashSet::with_capacity(before);
    let mut rows = Vec::with_capacity(before);
    for edge in edges {
        if !seen.contains(&edge) {
            seen.insert(edge.clone());
            rows.push(edge);
        }
    }

    let duplicates = before - rows.len();
    if duplicates > 0 {
        debug!("Dropped {} duplicate edges from '{}'", duplicates, name);
    }
    (Table::new(name, rows), duplicates)
}

/// Number of edges per endpoint of `role`. Counts duplicates as given.
pub fn degrees<'a, I>(edges: I, role: Role) -> AHashMap<&'a Id, usize>
where
    I: IntoIterator<Item = &'a Edge>,
{
    let mut counts: AHashMap<&Id, usize> = AHashMap::new();
    for edge in edges {
        *counts.entry(role.endpoint(edge)).or_insert(0) += 1;
    }
    counts
}

/// Result of one degree-filter application.
#[derive(Debug, Clone)]
pub struct DegreeFilterOutcome {
    pub edges: Table<Edge>,
    /// Endpoints of the filtered role whose degree fell below the threshold
    pub removed: BTreeSet<Id>,
    pub duplicates_removed: usize,
}

/// Keep edges whose `role` endpoint has at least `min_degree` distinct edges.
///
/// The threshold is inclusive. A threshold of 0 or 1 keeps every
/// deduplicated edge.
pub fn filter_by_degree(edges: Table<Edge>, role: Role, min_degree: usize) -> DegreeFilterOutcome {
    let (edges, duplicates_removed) = dedup_edges(edges);
    let before = edges.len();

    let (kept_ids, removed): (Vec<(&Id, usize)>, Vec<(&Id, usize)>) = degrees(&edges, role)
        .into_iter()
        .partition(|(_, degree)| *degree >= min_degree);
    let kept_ids: AHashSet<Id> = kept_ids.into_iter().map(|(id, _)| id.clone()).collect();
    let removed: BTreeSet<Id> = removed.into_iter().map(|(id, _)| id.clone()).collect();

    let rows: Vec<Edge> = edges
        .iter()
        .filter(|edge| kept_ids.contains(role.endpoint(edge)))
        .cloned()
        .collect();
    let edges = edges.with_rows(rows);

    info!(
        "{} degree filter (>= {}): removed {} {}s and {} edges, {} edges left",
        role,
        min_degree,
        removed.len(),
        role,
        before - edges.len(),
        edges.len()
    );

    DegreeFilterOutcome {
        edges,
        removed,
        duplicates_removed,
    }
}
