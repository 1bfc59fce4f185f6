//! Generation capability implementations.

pub mod anthropic_api;
pub mod claude_code;
pub mod mock;
pub mod registry;

pub use anthropic_api::{AnthropicApiCapability, AnthropicApiConfig};
pub use claude_code::{ClaudeCodeCapability, ClaudeCodeConfig};
pub use mock::{MockCapability, MockResponse};
pub use registry::{capability_from_config, execution_parameters};
