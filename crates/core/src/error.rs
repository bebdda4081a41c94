//! Error types for the follower pipeline

use crate::identity::{IdColumn, IdKind};
use thiserror::Error;

/// Pipeline errors
///
/// Every variant is a configuration or consistency failure that aborts the
/// run. Data-quality gaps (missing bios, missing counts) are handled by
/// per-field policy and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: IdColumn },

    #[error(
        "Incompatible identity types in column '{column}': '{source_table}' holds {source_kind} ids, '{dependent_table}' holds {dependent_kind} ids"
    )]
    IncompatibleIdentity {
        column: IdColumn,
        source_table: String,
        source_kind: IdKind,
        dependent_table: String,
        dependent_kind: IdKind,
    },

    #[error("Column '{column}' of table '{table}' mixes integer and text ids")]
    MixedIdentity { table: String, column: IdColumn },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error(
        "Edges and followers diverged after '{stage}': {only_in_edges} follower ids only in edges, {only_in_followers} only in followers"
    )]
    Inconsistent {
        stage: String,
        only_in_edges: usize,
        only_in_followers: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Filter(#[from] markerprep_filters::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
