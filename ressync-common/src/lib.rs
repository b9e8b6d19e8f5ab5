//! Shared types between the recorder and the tag recorder
//!
//! This crate defines the data every layer of ressync agrees on:
//! - `ResourceKind` tags naming each tracked resource type
//! - `Metadata`, the scope (team/domain/sub-domain) of one reconciliation
//! - Source rows: the relational snapshot keyed by integer IDs
//! - CH rows: the denormalized, read-optimized projections of source rows

pub mod ch;
pub mod kind;
pub mod metadata;
pub mod model;

pub use ch::{ChKey, ChRow, DeviceKey, IdKey};
pub use kind::ResourceKind;
pub use metadata::Metadata;
pub use model::{DeletionState, SourceRow};

/// Suffix appended to display names of soft-deleted resources in CH tables
pub const DELETED_SUFFIX: &str = " (deleted)";
