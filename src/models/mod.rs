//! Core data models for the file gateway.
//!
//! There is no metadata database: the bucket is authoritative, so these are
//! transient values passed between the HTTP layer, the file service and the
//! object store adapters.

pub mod file;
pub mod object;
