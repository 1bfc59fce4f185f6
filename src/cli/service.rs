//! Builds a pipeline from configuration.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::capabilities::{capability_from_config, execution_parameters};
use crate::adapters::extractor::PythonFunctionExtractor;
use crate::adapters::writer::FileSystemWriter;
use crate::domain::models::Config;
use crate::domain::ports::GenerationCapability;
use crate::services::{
    ArtifactAssembler, LlmCandidateSynthesizer, LlmCritic, LlmScenarioPlanner, PromptTemplates,
    RefinementOrchestrator, TestGenerationPipeline,
};

/// Pipeline backed by the configured capability.
pub fn build_pipeline(config: &Config) -> Result<TestGenerationPipeline> {
    let capability = capability_from_config(config)
        .context("failed to initialize the generation capability")?;
    Ok(build_pipeline_with(config, capability, None))
}

/// Pipeline backed by `capability`, with the Python extractor and the
/// filesystem writer. Relative paths resolve against `project_root`, or
/// the working directory when it is `None`.
pub fn build_pipeline_with(
    config: &Config,
    capability: Arc<dyn GenerationCapability>,
    project_root: Option<&Path>,
) -> TestGenerationPipeline {
    let templates = PromptTemplates::new(config.output.test_framework.clone());
    let parameters = execution_parameters(config);

    let planner = LlmScenarioPlanner::new(
        Arc::clone(&capability),
        templates.clone(),
        parameters.clone(),
        config.refinement.call_timeout(),
    );
    let synthesizer =
        LlmCandidateSynthesizer::new(Arc::clone(&capability), templates.clone(), parameters.clone());
    let critic = LlmCritic::new(capability, templates, parameters);

    let orchestrator = RefinementOrchestrator::new(
        Arc::new(synthesizer),
        Arc::new(critic),
        config.refinement.clone(),
    );

    let (extractor, writer) = match project_root {
        Some(root) => (
            PythonFunctionExtractor::with_root(root),
            FileSystemWriter::with_base_dir(root),
        ),
        None => (PythonFunctionExtractor::new(), FileSystemWriter::new()),
    };

    TestGenerationPipeline::new(
        Arc::new(extractor),
        Arc::new(planner),
        orchestrator,
        ArtifactAssembler::new(config.output.clone()),
        Arc::new(writer),
    )
}
