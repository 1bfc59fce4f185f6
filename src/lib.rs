//! autotest - iterative unit test generation
//!
//! Given a source file and a function name, autotest extracts a
//! descriptor of the function, plans test scenarios, and drives each
//! scenario through a bounded draft/review loop before assembling the
//! accepted tests into a single test file.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and ports
//! - **Service Layer** (`services`): planner, synthesizer, critic,
//!   refinement orchestrator, assembler and the run pipeline
//! - **Adapters** (`adapters`): generation capabilities, the Python
//!   extractor and the filesystem writer
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CapabilityKind, Config, ExhaustedPolicy, FunctionDescriptor, OutputArtifact,
    RefinementConfig, RunReport, TestPlan, TestScenario,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{RefinementOrchestrator, RunRequest, TestGenerationPipeline};
