//! Store collaborator traits and the in-memory implementations.
//!
//! Real drivers (graph database, vector index, analytics warehouse) live
//! outside this crate; the core only depends on the traits here.

pub mod memory;
pub mod traits;
