//! Request-level operations
//!
//! Each call normalises its audio to mono at the canonical rate, fills in
//! configured defaults for anything the request leaves unset, and returns
//! either an outcome or an [`MlError`]. Batch calls isolate failures per
//! request as [`RequestFailure`]s.

use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use vx_core::{Anchor, Description, Waveform};

use crate::context::EngineContext;
use crate::disentangle::{DisentangleResult, Orchestrator};
use crate::error::{MlError, MlResult, RequestFailure};
use crate::introspection::{Introspection, Introspector, ScoreMap, ScoredDescription};

// ═══════════════════════════════════════════════════════════════════════════════
// REQUESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Separate every sound in a recording
#[derive(Debug, Clone)]
pub struct DisentangleRequest {
    pub audio: Waveform,
    /// Sounds to separate; introspected from the taxonomy when absent or empty
    pub descriptions: Option<Vec<Description>>,
    pub threshold: Option<f32>,
    pub top_k_fallback: Option<usize>,
    pub predict_spans: Option<bool>,
    pub reranking_candidates: Option<u32>,
}

impl DisentangleRequest {
    pub fn new(audio: Waveform) -> Self {
        Self {
            audio,
            descriptions: None,
            threshold: None,
            top_k_fallback: None,
            predict_spans: None,
            reranking_candidates: None,
        }
    }

    pub fn with_descriptions<I, D>(mut self, descriptions: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Description>,
    {
        self.descriptions = Some(descriptions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_fallback(mut self, top_k: usize) -> Self {
        self.top_k_fallback = Some(top_k);
        self
    }
}

/// Score a recording against the taxonomy without separating
#[derive(Debug, Clone)]
pub struct IntrospectRequest {
    pub audio: Waveform,
    pub threshold: Option<f32>,
    pub top_k: Option<usize>,
}

impl IntrospectRequest {
    pub fn new(audio: Waveform) -> Self {
        Self {
            audio,
            threshold: None,
            top_k: None,
        }
    }
}

/// Extract one described sound, optionally anchored in time
#[derive(Debug, Clone)]
pub struct SeparateRequest {
    pub audio: Waveform,
    pub description: Description,
    pub anchors: Option<Vec<Anchor>>,
    pub predict_spans: Option<bool>,
    pub reranking_candidates: Option<u32>,
}

impl SeparateRequest {
    pub fn new(audio: Waveform, description: impl Into<Description>) -> Self {
        Self {
            audio,
            description: description.into(),
            anchors: None,
            predict_spans: None,
            reranking_candidates: None,
        }
    }

    pub fn with_anchors(mut self, anchors: Option<Vec<Anchor>>) -> Self {
        self.anchors = anchors;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a disentangle request
#[derive(Debug, Clone, PartialEq)]
pub enum DisentangleOutcome {
    /// At least one description was separated
    Separated(DisentangleResult),
    /// Introspection found nothing to separate
    NothingDetected { scores: ScoreMap },
}

impl DisentangleOutcome {
    pub fn is_separated(&self) -> bool {
        matches!(self, DisentangleOutcome::Separated(_))
    }

    pub fn result(&self) -> Option<&DisentangleResult> {
        match self {
            DisentangleOutcome::Separated(result) => Some(result),
            DisentangleOutcome::NothingDetected { .. } => None,
        }
    }

    pub fn into_result(self) -> Option<DisentangleResult> {
        match self {
            DisentangleOutcome::Separated(result) => Some(result),
            DisentangleOutcome::NothingDetected { .. } => None,
        }
    }

    /// Introspection scores, if introspection ran
    pub fn scores(&self) -> Option<&ScoreMap> {
        match self {
            DisentangleOutcome::Separated(result) => result.scores.as_ref(),
            DisentangleOutcome::NothingDetected { scores } => Some(scores),
        }
    }
}

/// Introspection report, scores ranked best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionReport {
    pub selected: Vec<Description>,
    pub scores: Vec<ScoredDescription>,
    pub threshold: f32,
    pub taxonomy_version: String,
}

/// Single-description separation report
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationReport {
    pub description: Description,
    pub target: Waveform,
    pub residual: Waveform,
    pub sample_rate: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Mono at the canonical rate; zero-length audio is rejected
fn normalise(context: &EngineContext, audio: Waveform) -> MlResult<Waveform> {
    if audio.is_empty() {
        return Err(MlError::EmptyInput("audio has no samples".into()));
    }
    Ok(audio.into_canonical(context.sample_rate())?)
}

fn scan(
    context: &EngineContext,
    audio: &Waveform,
    threshold: f32,
    fallback_k: usize,
) -> MlResult<Introspection> {
    let taxonomy = context.taxonomy();
    if taxonomy.is_empty() {
        return Err(MlError::EmptyInput(
            "no descriptions given and the taxonomy is empty".into(),
        ));
    }

    Introspector::new(context.scorer()?).introspect(
        audio,
        taxonomy.descriptions(),
        threshold,
        fallback_k,
    )
}

/// Separate every sound: given descriptions, or what introspection finds
pub fn disentangle(context: &EngineContext, request: DisentangleRequest) -> MlResult<DisentangleOutcome> {
    let defaults = context.config().disentangle;
    let audio = normalise(context, request.audio)?;

    let options = defaults.iteration_options(request.predict_spans, request.reranking_candidates);

    let (descriptions, scores) = match request.descriptions {
        Some(descriptions) if !descriptions.is_empty() => (descriptions, None),
        _ => {
            let threshold = request.threshold.unwrap_or(defaults.threshold);
            let fallback_k = request.top_k_fallback.unwrap_or(defaults.top_k_fallback);
            let found = scan(context, &audio, threshold, fallback_k)?;

            if found.selected.is_empty() {
                log::warn!(
                    "Nothing detected above {} across {} candidates",
                    threshold,
                    found.scores.len()
                );
                return Ok(DisentangleOutcome::NothingDetected {
                    scores: found.scores,
                });
            }
            (found.selected, Some(found.scores))
        }
    };

    let result = Orchestrator::new(context.separator()).run(&audio, &descriptions, &options)?;

    log::info!(
        "Disentangled {} tracks from {:.2}s",
        result.track_count(),
        audio.duration_secs()
    );

    Ok(DisentangleOutcome::Separated(match scores {
        Some(scores) => result.with_scores(scores),
        None => result,
    }))
}

/// Score against the taxonomy only
pub fn introspect(context: &EngineContext, request: IntrospectRequest) -> MlResult<IntrospectionReport> {
    let defaults = context.config().introspect;
    let audio = normalise(context, request.audio)?;

    let threshold = request.threshold.unwrap_or(defaults.threshold);
    let top_k = request.top_k.unwrap_or(defaults.top_k);
    let found = scan(context, &audio, threshold, top_k)?;

    Ok(IntrospectionReport {
        selected: found.selected,
        scores: found.scores.ranked().into_iter().cloned().collect(),
        threshold,
        taxonomy_version: context.taxonomy().version.clone(),
    })
}

/// Extract one description
pub fn separate(context: &EngineContext, request: SeparateRequest) -> MlResult<SeparationReport> {
    let defaults = context.config().separate;
    let audio = normalise(context, request.audio)?;

    let options = defaults.iteration_options(request.predict_spans, request.reranking_candidates);

    let output = Orchestrator::new(context.separator()).separate_one(
        &audio,
        &request.description,
        request.anchors,
        &options,
    )?;

    Ok(SeparationReport {
        description: request.description,
        target: output.target,
        residual: output.residual,
        sample_rate: audio.sample_rate(),
    })
}

/// Run many disentangle requests in parallel; each succeeds or fails alone
pub fn disentangle_batch(
    context: &EngineContext,
    requests: Vec<DisentangleRequest>,
) -> Vec<Result<DisentangleOutcome, RequestFailure>> {
    run_batch(context, requests, disentangle)
}

/// Run many single-description requests in parallel, each with its own anchors and settings
pub fn separate_batch(
    context: &EngineContext,
    requests: Vec<SeparateRequest>,
) -> Vec<Result<SeparationReport, RequestFailure>> {
    run_batch(context, requests, separate)
}

/// Fan requests out over the batch pool; results keep request order
fn run_batch<R, T, F>(context: &EngineContext, requests: Vec<R>, op: F) -> Vec<Result<T, RequestFailure>>
where
    R: Send,
    T: Send,
    F: Fn(&EngineContext, R) -> MlResult<T> + Sync,
{
    let run = |requests: Vec<R>| -> Vec<Result<T, RequestFailure>> {
        requests
            .into_par_iter()
            .enumerate()
            .map(|(index, request)| {
                op(context, request).map_err(|e| {
                    log::warn!("Batch request {} failed: {}", index, e);
                    RequestFailure::from(e)
                })
            })
            .collect()
    };

    log::debug!("Running batch of {} on {} workers", requests.len(), context.config().workers());

    match rayon::ThreadPoolBuilder::new()
        .num_threads(context.config().workers())
        .build()
    {
        Ok(pool) => pool.install(|| run(requests)),
        Err(e) => {
            log::warn!("Batch pool unavailable ({}); using the global pool", e);
            run(requests)
        }
    }
}

/// Run `job` on the blocking pool, giving up after `timeout`
///
/// On timeout the job keeps running to completion in the background and its
/// result is dropped.
pub async fn run_with_timeout<T, F>(context: &EngineContext, timeout: Duration, job: F) -> MlResult<T>
where
    T: Send + 'static,
    F: FnOnce(&EngineContext) -> MlResult<T> + Send + 'static,
{
    let context = context.clone();
    let handle = tokio::task::spawn_blocking(move || job(&context));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(MlError::Internal(format!("request task failed: {join}"))),
        Err(_) => Err(MlError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
