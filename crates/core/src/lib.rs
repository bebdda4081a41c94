//! Joint filtering of follower/marker edge lists and follower bios
//!
//! Stages are plain functions over [`Table`]s: degree filters on the edge
//! list, numeric thresholds on followers, identity synchronisation between
//! the two, bio annotation, marker filtering and the final metadata join.
//! [`Pipeline`] runs them in order.

pub mod annotate;
pub mod attributes;
pub mod degree;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod markers;
pub mod pipeline;
pub mod records;
pub mod regroup;
pub mod summary;
pub mod sync;
pub mod table;

pub use error::{Error, Result};
pub use identity::{Id, IdColumn, IdKind, Identified};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig, PipelineInput, PipelineOutput, PipelineStats, StageStats};
pub use records::{Edge, EnrichedEdge, FollowerRecord, MarkerRecord};
pub use regroup::CategoryMap;
pub use table::Table;
