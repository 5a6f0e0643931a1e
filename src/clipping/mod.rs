//! Clipping pipeline: per-combination query execution and cross-combination
//! aggregation with URL deduplication.

pub mod aggregate;
pub mod query;
