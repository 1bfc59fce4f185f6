//! Pipeline services: the capability-backed stages, the refinement
//! orchestrator, the assembler and the run driver.

pub mod artifact_assembler;
pub mod candidate_synthesizer;
pub mod critic;
pub mod pipeline;
pub mod prompts;
pub mod refinement_orchestrator;
pub mod response;
pub mod scenario_planner;

pub use artifact_assembler::ArtifactAssembler;
pub use candidate_synthesizer::LlmCandidateSynthesizer;
pub use critic::{parse_verdict, Improvement, LlmCritic, ReviewFeedback};
pub use pipeline::{RunRequest, TestGenerationPipeline};
pub use prompts::PromptTemplates;
pub use refinement_orchestrator::{RefinementEvent, RefinementOrchestrator, RefinementReport};
pub use response::{extract_json_from_response, strip_code_fences};
pub use scenario_planner::LlmScenarioPlanner;
