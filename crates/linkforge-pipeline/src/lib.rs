//! Stage orchestration for the investigation pipeline.
//!
//! A [`Pipeline`] runs the six stages in order, committing each stage's
//! output downstream and publishing a [`StageEvent`] on its own [`EventBus`]
//! after each commit. Stages are synchronous; cooperative cancellation is
//! checked between stages via [`CancelToken`]. A cancelled run returns an
//! error and discards all partial results.

mod bus;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use linkforge_analytics::{analyze, AnalysisReportV1, AnalyzeOptions};
use linkforge_graph::{map_roles, resolve, Graph, MergeRecord, ResolveOptions, RoleAssignment};
use linkforge_ingest::{ingest, Format, IngestError, IngestOptions, Warning};
use linkforge_schema::{detect_types, normalize, DetectOptions, RecognizerRegistry};

pub use bus::{EventBus, Stage, StageEvent};

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag, checked between stages. Cloneable and
/// thread-safe so a caller can cancel from another thread while `run` is on
/// this one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("cancelled before stage `{stage}`")]
    Cancelled { stage: &'static str },

    #[error("stage payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Explicit input format; sniffed when absent.
    pub format: Option<Format>,
    pub ingest: IngestOptions,
    pub detect: DetectOptions,
    /// Explicit column-to-role assignment; suggested from the profiles when
    /// absent.
    pub roles: Option<RoleAssignment>,
    pub resolve: ResolveOptions,
    pub analyze: AnalyzeOptions,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub graph: Graph,
    pub report: AnalysisReportV1,
    pub merge_log: Vec<MergeRecord>,
    /// Warnings from every stage, in stage order.
    pub warnings: Vec<Warning>,
    /// Wall-clock time per stage, in execution order.
    pub stage_durations: Vec<(Stage, u64)>,
}

pub struct Pipeline {
    bus: EventBus,
    registry: RecognizerRegistry,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_registry(options, RecognizerRegistry::with_defaults())
    }

    /// Use a caller-supplied registry, e.g. with custom recognizers
    /// registered on top of the defaults.
    pub fn with_registry(options: PipelineOptions, registry: RecognizerRegistry) -> Self {
        Self {
            bus: EventBus::new(),
            registry,
            options,
        }
    }

    /// The bus events are published on. Subscribe before calling [`run`].
    ///
    /// [`run`]: Pipeline::run
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run all six stages over a text blob. Each stage commits its output to
    /// the next and publishes an event; the outcome carries the resolved
    /// graph and the analysis report.
    pub fn run(&self, blob: &str, token: &CancelToken) -> Result<PipelineOutcome, PipelineError> {
        let mut warnings = Vec::new();
        let mut durations = Vec::new();

        self.checkpoint(token, Stage::Ingested)?;
        let (ingested, ms) = timed(|| ingest(blob, self.options.format, &self.options.ingest));
        let ingested = ingested?;
        self.commit(Stage::Ingested, &ingested, &ingested.warnings, ms, &mut warnings, &mut durations)?;

        self.checkpoint(token, Stage::Typed)?;
        let (profiles, ms) = timed(|| {
            detect_types(
                &ingested.rows,
                &ingested.headers,
                &self.registry,
                &self.options.detect,
            )
        });
        self.commit(Stage::Typed, &profiles, &[], ms, &mut warnings, &mut durations)?;

        self.checkpoint(token, Stage::Normalized)?;
        let (normalized, ms) = timed(|| normalize(&ingested.rows, &profiles, &self.registry));
        self.commit(Stage::Normalized, &normalized, &normalized.warnings, ms, &mut warnings, &mut durations)?;

        self.checkpoint(token, Stage::Mapped)?;
        let (mapped, ms) = timed(|| map_roles(&normalized.rows, &profiles, self.options.roles.as_ref()));
        self.commit(Stage::Mapped, &mapped, &mapped.warnings, ms, &mut warnings, &mut durations)?;

        self.checkpoint(token, Stage::Resolved)?;
        let (resolved, ms) = timed(|| resolve(mapped.nodes, mapped.edges, &self.options.resolve));
        self.commit(Stage::Resolved, &resolved, &resolved.warnings, ms, &mut warnings, &mut durations)?;

        self.checkpoint(token, Stage::Analyzed)?;
        let graph = Graph::new(resolved.nodes, resolved.edges);
        let (report, ms) = timed(|| analyze(&graph.nodes, &graph.edges, &self.options.analyze));
        self.commit(Stage::Analyzed, &report, &report.warnings, ms, &mut warnings, &mut durations)?;

        // A cancellation raised during the final stage still discards the
        // run.
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: Stage::Analyzed.name(),
            });
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            warnings = warnings.len(),
            "pipeline complete"
        );

        Ok(PipelineOutcome {
            graph,
            report,
            merge_log: resolved.merge_log,
            warnings,
            stage_durations: durations,
        })
    }

    fn checkpoint(&self, token: &CancelToken, stage: Stage) -> Result<(), PipelineError> {
        if token.is_cancelled() {
            tracing::info!(stage = stage.name(), "pipeline cancelled");
            return Err(PipelineError::Cancelled { stage: stage.name() });
        }
        Ok(())
    }

    fn commit<T: Serialize>(
        &self,
        stage: Stage,
        data: &T,
        stage_warnings: &[Warning],
        duration_ms: u64,
        warnings: &mut Vec<Warning>,
        durations: &mut Vec<(Stage, u64)>,
    ) -> Result<(), PipelineError> {
        warnings.extend_from_slice(stage_warnings);
        durations.push((stage, duration_ms));
        tracing::debug!(stage = stage.name(), duration_ms, "stage committed");
        self.bus.emit(StageEvent {
            stage,
            data: serde_json::to_value(data)?,
            warnings: stage_warnings.to_vec(),
            duration_ms,
        });
        Ok(())
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, u64) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed().as_millis() as u64)
}

// ============================================================================
// Fixtures
// ============================================================================

/// A small mixed entity/relationship dataset in the shape fixture data and
/// demos use: entity records carry `{id, name, type, date}`, relationship
/// records carry `{from, to, label}`.
pub fn sample_dataset() -> &'static str {
    r#"[
  {"id": "1", "name": "Alice", "type": "Person", "date": "2024-01-01"},
  {"id": "2", "name": "Bob", "type": "Person", "date": "2024-01-02"},
  {"id": "3", "name": "Acme Corp", "type": "Company", "date": "2024-01-03"},
  {"from": "1", "to": "2", "label": "knows"},
  {"from": "2", "to": "3", "label": "works_at"}
]"#
}
