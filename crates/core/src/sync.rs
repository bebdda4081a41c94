//! Identity synchronisation between related tables
//!
//! A dependent table is restricted to the identities present in a source
//! table. Running it in both directions (edges to followers, then followers to
//! edges) leaves both sides with the same follower identity set.

use crate::identity::{Id, IdColumn, Identified};
use crate::records::{Edge, FollowerRecord};
use crate::table::Table;
use crate::{Error, Result};
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Restrict `dependent` to rows whose `column` value occurs in `source`.
///
/// Row order is preserved and no rows are added, so the operation is
/// idempotent.
pub fn synchronize<S, D>(source: &Table<S>, dependent: Table<D>, column: IdColumn) -> Result<Table<D>>
where
    S: Identified,
    D: Identified,
{
    source.require_column(column)?;
    dependent.require_column(column)?;

    let source_kind = source.id_kind(column)?;
    let dependent_kind = dependent.id_kind(column)?;
    if let (Some(source_kind), Some(dependent_kind)) = (source_kind, dependent_kind) {
        if source_kind != dependent_kind {
            return Err(Error::IncompatibleIdentity {
                column,
                source_table: source.name().to_string(),
                source_kind,
                dependent_table: dependent.name().to_string(),
                dependent_kind,
            });
        }
    }

    let keep: AHashSet<Id> = source.ids(column)?.cloned().collect();
    let before = dependent.len();
    let name = dependent.name().to_string();
    let rows: Vec<D> = dependent
        .into_iter()
        .filter(|row| row.identity(column).map_or(false, |id| keep.contains(id)))
        .collect();

    info!(
        "Synchronized '{}' to '{}' on {}: removed {}, {} left",
        name,
        source.name(),
        column,
        before - rows.len(),
        rows.len()
    );

    Ok(Table::new(name, rows))
}

/// Identities present on only one side of a pair of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityDiff {
    pub only_in_source: BTreeSet<Id>,
    pub only_in_dependent: BTreeSet<Id>,
}

impl IdentityDiff {
    pub fn compute<S, D>(source: &Table<S>, dependent: &Table<D>, column: IdColumn) -> Result<Self>
    where
        S: Identified,
        D: Identified,
    {
        let source_ids = source.id_set(column)?;
        let dependent_ids = dependent.id_set(column)?;

        Ok(Self {
            only_in_source: source_ids
                .difference(&dependent_ids)
                .map(|id| (*id).clone())
                .collect(),
            only_in_dependent: dependent_ids
                .difference(&source_ids)
                .map(|id| (*id).clone())
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.only_in_source.is_empty() && self.only_in_dependent.is_empty()
    }
}

/// Check that edges and followers carry the same follower identities.
pub fn verify_consistent(
    edges: &Table<Edge>,
    followers: &Table<FollowerRecord>,
    stage: &str,
) -> Result<()> {
    let diff = IdentityDiff::compute(edges, followers, IdColumn::FollowerId)?;
    if diff.is_empty() {
        return Ok(());
    }

    debug!(
        "Follower ids only in edges: {:?}; only in followers: {:?}",
        diff.only_in_source, diff.only_in_dependent
    );
    Err(Error::Inconsistent {
        stage: stage.to_string(),
        only_in_edges: diff.only_in_source.len(),
        only_in_followers: diff.only_in_dependent.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(i64, i64)]) -> Table<Edge> {
        Table::new(
            "edges",
            pairs.iter().map(|&(m, f)| Edge::new(m, f)).collect(),
        )
    }

    fn followers(ids: &[i64]) -> Table<FollowerRecord> {
        Table::new(
            "followers",
            ids.iter().map(|&id| FollowerRecord::new(id)).collect(),
        )
    }

    #[test]
    fn test_synchronize_preserves_order() {
        let source = edges(&[(1, 30), (1, 10)]);
        let dependent = followers(&[10, 20, 30, 40]);

        let synced = synchronize(&source, dependent, IdColumn::FollowerId).unwrap();
        let ids: Vec<_> = synced.iter().map(|f| f.follower_id.clone()).collect();
        assert_eq!(ids, vec![Id::Int(10), Id::Int(30)]);
        assert_eq!(synced.name(), "followers");
    }

    #[test]
    fn test_synchronize_idempotent() {
        let source = edges(&[(1, 1), (2, 3), (2, 5)]);
        let dependent = followers(&[1, 2, 3, 4, 5, 6]);

        let once = synchronize(&source, dependent, IdColumn::FollowerId).unwrap();
        let twice = synchronize(&source, once.clone(), IdColumn::FollowerId).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_incompatible_identity() {
        let source = Table::new("edges", vec![Edge::new(1, "10")]);
        let dependent = followers(&[10]);

        let err = synchronize(&source, dependent, IdColumn::FollowerId).unwrap_err();
        match err {
            Error::IncompatibleIdentity {
                column,
                source_table,
                dependent_table,
                ..
            } => {
                assert_eq!(column, IdColumn::FollowerId);
                assert_eq!(source_table, "edges");
                assert_eq!(dependent_table, "followers");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let source = followers(&[1]);
        let dependent = edges(&[(1, 1)]);
        assert!(matches!(
            synchronize(&source, dependent, IdColumn::MarkerId),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_empty_source_empties_dependent() {
        let synced = synchronize(&edges(&[]), followers(&[1, 2]), IdColumn::FollowerId).unwrap();
        assert!(synced.is_empty());
    }

    #[test]
    fn test_two_way_sync_is_consistent() {
        let e = edges(&[(1, 1), (1, 2), (2, 3), (2, 9)]);
        let f = followers(&[1, 2, 3, 4]);

        let f = synchronize(&e, f, IdColumn::FollowerId).unwrap();
        assert!(verify_consistent(&e, &f, "partial").is_err());

        let e = synchronize(&f, e, IdColumn::FollowerId).unwrap();
        verify_consistent(&e, &f, "two-way").unwrap();
        assert_eq!(e.len(), 3);
    }

    #[test]
    fn test_identity_diff() {
        let diff = IdentityDiff::compute(
            &edges(&[(1, 1), (1, 2)]),
            &followers(&[2, 3]),
            IdColumn::FollowerId,
        )
        .unwrap();
        assert_eq!(diff.only_in_source.into_iter().collect::<Vec<_>>(), vec![Id::Int(1)]);
        assert_eq!(diff.only_in_dependent.into_iter().collect::<Vec<_>>(), vec![Id::Int(3)]);
    }
}
