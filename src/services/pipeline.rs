//! Run driver: Analyze -> Plan -> Refine -> Assemble -> Write.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FunctionDescriptor, RunReport, TestPlan};
use crate::domain::ports::{ArtifactWriter, FunctionExtractor, ScenarioPlanner};
use crate::services::artifact_assembler::ArtifactAssembler;
use crate::services::refinement_orchestrator::{RefinementEvent, RefinementOrchestrator};

/// Inputs for one generation run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source file, relative to the project root.
    pub source_path: PathBuf,
    /// Function to test.
    pub function: String,
    /// Assemble but do not write.
    pub dry_run: bool,
}

impl RunRequest {
    /// Request that writes its output.
    pub fn new(source_path: impl Into<PathBuf>, function: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            function: function.into(),
            dry_run: false,
        }
    }

    /// Assemble without writing.
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Wires the stages of a run together.
pub struct TestGenerationPipeline {
    extractor: Arc<dyn FunctionExtractor>,
    planner: Arc<dyn ScenarioPlanner>,
    orchestrator: RefinementOrchestrator,
    assembler: ArtifactAssembler,
    writer: Arc<dyn ArtifactWriter>,
}

impl TestGenerationPipeline {
    /// Pipeline over the given stages.
    pub fn new(
        extractor: Arc<dyn FunctionExtractor>,
        planner: Arc<dyn ScenarioPlanner>,
        orchestrator: RefinementOrchestrator,
        assembler: ArtifactAssembler,
        writer: Arc<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            extractor,
            planner,
            orchestrator,
            assembler,
            writer,
        }
    }

    /// Extract the descriptor only.
    pub async fn inspect(&self, source_path: &Path, function: &str) -> DomainResult<FunctionDescriptor> {
        self.extractor
            .extract(source_path, function)
            .await
            .map_err(|e| match e {
                DomainError::AnalysisFailure(_) => e,
                other => DomainError::AnalysisFailure(other.to_string()),
            })
    }

    /// Extract and plan, without refinement.
    pub async fn plan(
        &self,
        source_path: &Path,
        function: &str,
    ) -> DomainResult<(FunctionDescriptor, TestPlan)> {
        let descriptor = self.inspect(source_path, function).await?;
        let plan = self.plan_descriptor(&descriptor).await?;
        Ok((descriptor, plan))
    }

    async fn plan_descriptor(&self, descriptor: &FunctionDescriptor) -> DomainResult<TestPlan> {
        self.planner.plan(descriptor).await.map_err(|e| match e {
            DomainError::PlanningFailure(_) | DomainError::Cancelled => e,
            other => DomainError::PlanningFailure(other.to_string()),
        })
    }

    /// Execute a full run.
    ///
    /// Nothing is written when the run is cancelled, when it fails, or in
    /// dry-run mode.
    #[instrument(skip(self, cancel, events), fields(file = %request.source_path.display(), function = %request.function))]
    pub async fn run(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
        events: Option<mpsc::Sender<RefinementEvent>>,
    ) -> DomainResult<RunReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(%run_id, "starting run");

        let descriptor = self.inspect(&request.source_path, &request.function).await?;

        let plan = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DomainError::Cancelled),
            plan = self.plan_descriptor(&descriptor) => plan?,
        };

        let descriptor = Arc::new(descriptor);
        let refinement = self
            .orchestrator
            .refine_plan(Arc::clone(&descriptor), &plan, cancel, events)
            .await?;

        let artifact = self.assembler.assemble(&descriptor, &refinement.artifacts)?;

        let mut warnings = refinement.warnings();
        if artifact.is_empty() {
            let warning = format!(
                "no accepted tests for {}; the output contains only the preamble",
                descriptor.qualified_name
            );
            warn!("{warning}");
            warnings.push(warning);
        }

        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        let written_to = if request.dry_run {
            info!(path = %artifact.path.display(), "dry run; not writing");
            None
        } else {
            Some(self.writer.write(&artifact).await?)
        };

        let report = RunReport {
            run_id,
            function: descriptor.qualified_name.clone(),
            source_path: descriptor.source_path.clone(),
            planned: plan.len(),
            accepted: refinement.accepted.len(),
            exhausted: refinement.exhausted.len(),
            synthesis_calls: refinement.synthesis_calls,
            artifact,
            written_to,
            warnings,
            started_at,
            completed_at: Utc::now(),
        };
        info!(
            %run_id,
            accepted = report.accepted,
            exhausted = report.exhausted,
            duration_ms = report.duration_ms(),
            "run complete"
        );
        Ok(report)
    }
}
