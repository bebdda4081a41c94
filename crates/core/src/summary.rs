//! Sanity summary of a bipartite edge list

use crate::identity::Id;
use crate::records::Edge;
use ahash::AHashMap;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

/// Counts describing an edge list as a bipartite follower/marker graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub edges: usize,
    pub followers: usize,
    pub markers: usize,
    /// Weakly connected components
    pub components: usize,
    /// Nodes in the largest component
    pub largest_component: usize,
}

impl EdgeSummary {
    pub fn compute<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = &'a Edge>,
    {
        let mut followers: AHashMap<&Id, usize> = AHashMap::new();
        let mut markers: AHashMap<&Id, usize> = AHashMap::new();
        let mut pairs = Vec::new();
        for edge in edges {
            let next = followers.len() + markers.len();
            let follower = *followers.entry(&edge.follower_id).or_insert(next);
            let next = followers.len() + markers.len();
            let marker = *markers.entry(&edge.marker_id).or_insert(next);
            pairs.push((follower, marker));
        }

        let nodes = followers.len() + markers.len();
        let mut components = UnionFind::<usize>::new(nodes);
        for &(follower, marker) in &pairs {
            components.union(follower, marker);
        }

        let mut sizes: AHashMap<usize, usize> = AHashMap::new();
        for root in components.into_labeling() {
            *sizes.entry(root).or_insert(0) += 1;
        }

        Self {
            edges: pairs.len(),
            followers: followers.len(),
            markers: markers.len(),
            components: sizes.len(),
            largest_component: sizes.values().copied().max().unwrap_or(0),
        }
    }
}
