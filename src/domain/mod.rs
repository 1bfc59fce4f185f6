//! Domain layer for autotest
//!
//! This module contains the pipeline's data model, its error taxonomy and
//! the ports its collaborators implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
