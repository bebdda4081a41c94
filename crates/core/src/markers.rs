//! Marker-degree filtering and marker/follower convergence
//!
//! Once followers are restricted to the target population, markers are
//! re-counted on what is left. Markers followed by too few retained
//! followers are dropped, and dropping them can push followers below the
//! brand threshold, so the follower-degree filter runs again after each
//! marker pass.

use crate::degree::{filter_by_degree, Role};
use crate::enrich::{retained_follower_counts, MarkerIndex};
use crate::identity::Id;
use crate::records::Edge;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Audit row for a marker dropped by the marker-degree filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedMarker {
    pub marker_id: Id,
    pub twitter_name: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    /// The marker's own global follower count
    pub marker_followers: Option<u64>,
    /// Distinct retained followers at the time of removal
    pub retained_followers: usize,
    /// Convergence pass that removed it, starting at 1
    pub pass: usize,
}

/// Drop markers with fewer than `min_followers` distinct followers in
/// `edges`.
pub fn filter_markers(
    edges: Table<Edge>,
    markers: &MarkerIndex,
    min_followers: usize,
    pass: usize,
) -> (Table<Edge>, Vec<RemovedMarker>) {
    let counts = retained_follower_counts(&edges);
    let outcome = filter_by_degree(edges, Role::Marker, min_followers);

    let removed = outcome
        .removed
        .into_iter()
        .map(|id| {
            let metadata = markers.get(&id);
            RemovedMarker {
                retained_followers: counts.get(&id).copied().unwrap_or(0),
                twitter_name: metadata.and_then(|m| m.twitter_name.clone()),
                category: metadata.and_then(|m| m.category.clone()),
                marker_followers: metadata.and_then(|m| m.followers),
                marker_id: id,
                pass,
            }
        })
        .collect();

    (outcome.edges, removed)
}

/// Edges and audit trail after the convergence loop.
#[derive(Debug, Clone)]
pub struct ConvergenceOutcome {
    pub edges: Table<Edge>,
    pub removed_markers: Vec<RemovedMarker>,
    pub removed_followers: BTreeSet<Id>,
    /// Passes actually executed; lower than requested when a pass removed
    /// nothing
    pub passes_run: usize,
}

/// Alternate marker and follower degree filters for up to `passes` passes.
///
/// A pass that removes no edge ends the loop early. Zero passes leave the
/// edges untouched.
pub fn converge(
    edges: Table<Edge>,
    markers: &MarkerIndex,
    min_marker_followers: usize,
    min_brands: usize,
    passes: usize,
) -> ConvergenceOutcome {
    let mut edges = edges;
    let mut removed_markers = Vec::new();
    let mut removed_followers = BTreeSet::new();
    let mut passes_run = 0;

    for pass in 1..=passes {
        let before = edges.len();
        passes_run = pass;

        let (after_markers, dropped) = filter_markers(edges, markers, min_marker_followers, pass);
        let outcome = filter_by_degree(after_markers, Role::Follower, min_brands);

        debug!(
            "Convergence pass {}: {} markers and {} followers removed",
            pass,
            dropped.len(),
            outcome.removed.len()
        );

        removed_markers.extend(dropped);
        removed_followers.extend(outcome.removed);
        edges = outcome.edges;

        if edges.len() == before {
            break;
        }
    }

    info!(
        "Marker/follower convergence: {} passes, {} markers and {} followers removed, {} edges left",
        passes_run,
        removed_markers.len(),
        removed_followers.len(),
        edges.len()
    );

    ConvergenceOutcome {
        edges,
        removed_markers,
        removed_followers,
        passes_run,
    }
}
