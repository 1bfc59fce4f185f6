//! Adapters for external systems: generation backends, source extraction
//! and the filesystem.

pub mod capabilities;
pub mod extractor;
pub mod writer;
