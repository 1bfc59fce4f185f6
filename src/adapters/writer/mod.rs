//! Artifact writers.

pub mod filesystem;

pub use filesystem::FileSystemWriter;
