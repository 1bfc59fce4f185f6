//! Infrastructure layer module
//!
//! Cross-cutting concerns shared by the adapters and the CLI:
//! - Configuration management
//! - Logging infrastructure and secret scrubbing

pub mod config;
pub mod logging;
