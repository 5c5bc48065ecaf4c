//! Iterative disentanglement
//!
//! Sounds are peeled off one description at a time. Every step separates the
//! current residual, keeps the target as a track and hands the new residual
//! to the next step:
//!
//! ```text
//! initial ──sep(d0)──> r1 ──sep(d1)──> r2 ── ... ──sep(dn-1)──> residual
//!             │                │                      │
//!           track 0          track 1               track n-1
//! ```
//!
//! A run is all-or-nothing: the first failing step aborts it and no partial
//! tracks are returned.

use serde::{Deserialize, Serialize};
use vx_core::{Anchor, Description, Waveform};

use crate::error::{MlError, MlResult};
use crate::introspection::ScoreMap;
use crate::separation::{SeparationOutput, SeparationParams, Separator};

/// One isolated sound
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Description that was separated
    pub description: Description,
    /// Isolated audio
    pub audio: Waveform,
    /// Zero-based step that produced it
    pub iteration: usize,
}

/// Output of one run
#[derive(Debug, Clone, PartialEq)]
pub struct DisentangleResult {
    /// Tracks in iteration order
    pub tracks: Vec<Track>,
    /// What remains after the last step
    pub residual: Waveform,
    pub sample_rate: u32,
    /// Introspection scores, when the descriptions came from introspection
    pub scores: Option<ScoreMap>,
}

impl DisentangleResult {
    pub fn with_scores(mut self, scores: ScoreMap) -> Self {
        self.scores = Some(scores);
        self
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &Description> {
        self.tracks.iter().map(|t| &t.description)
    }
}

/// Knobs applied to every iteration of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationOptions {
    pub predict_spans: bool,
    pub reranking_candidates: u32,
}

impl Default for IterationOptions {
    fn default() -> Self {
        Self {
            predict_spans: true,
            reranking_candidates: 8,
        }
    }
}

impl IterationOptions {
    fn params(&self, anchors: Option<Vec<Anchor>>) -> SeparationParams {
        SeparationParams::single()
            .with_anchors(anchors)
            .with_predict_spans(self.predict_spans)
            .with_reranking(self.reranking_candidates)
    }
}

/// Drives a separator over a description list
pub struct Orchestrator<'a> {
    separator: &'a dyn Separator,
}

impl<'a> Orchestrator<'a> {
    pub fn new(separator: &'a dyn Separator) -> Self {
        Self { separator }
    }

    /// Separate every description in order, chaining residuals
    ///
    /// # Arguments
    /// * `initial` - Mono audio at the separator's rate
    /// * `descriptions` - Sounds to peel off, in order; may be empty
    /// * `options` - Applied to every step; anchors are never used here
    pub fn run(
        &self,
        initial: &Waveform,
        descriptions: &[Description],
        options: &IterationOptions,
    ) -> MlResult<DisentangleResult> {
        crate::ensure_canonical(initial, self.separator.sample_rate())?;

        log::info!(
            "Disentangling {} descriptions from {:.2}s with {}",
            descriptions.len(),
            initial.duration_secs(),
            self.separator.model_name()
        );

        let params = options.params(None);
        let (tracks, residual) = descriptions.iter().enumerate().try_fold(
            (Vec::with_capacity(descriptions.len()), initial.clone()),
            |(mut tracks, current), (iteration, description)| {
                let (track, next) = self
                    .step(&current, description, iteration, &params)
                    .map_err(|source| MlError::IterationFailed {
                        iteration,
                        description: description.to_string(),
                        source: Box::new(source),
                    })?;
                tracks.push(track);
                Ok::<_, MlError>((tracks, next))
            },
        )?;

        Ok(DisentangleResult {
            tracks,
            residual,
            sample_rate: initial.sample_rate(),
            scores: None,
        })
    }

    /// Single-description separation, optionally anchored
    ///
    /// Without anchors this performs exactly the first iteration of [`run`](Self::run).
    pub fn separate_one(
        &self,
        initial: &Waveform,
        description: &Description,
        anchors: Option<Vec<Anchor>>,
        options: &IterationOptions,
    ) -> MlResult<SeparationOutput> {
        crate::ensure_canonical(initial, self.separator.sample_rate())?;

        let (track, residual) = self.step(initial, description, 0, &options.params(anchors))?;
        Ok(SeparationOutput {
            target: track.audio,
            residual,
        })
    }

    /// `(residual, description) -> (track, next residual)`
    fn step(
        &self,
        current: &Waveform,
        description: &Description,
        iteration: usize,
        params: &SeparationParams,
    ) -> MlResult<(Track, Waveform)> {
        log::debug!("Iteration {}: separating '{}'", iteration, description);

        let SeparationOutput { target, residual } =
            self.separator.separate(current, description, params)?;

        for (what, produced) in [("target", &target), ("residual", &residual)] {
            if !produced.same_shape(current) {
                return Err(MlError::AdapterContract(format!(
                    "{} returned a {} of {}ch/{} frames/{} Hz for input of {}ch/{} frames/{} Hz",
                    self.separator.model_name(),
                    what,
                    produced.num_channels(),
                    produced.frames(),
                    produced.sample_rate(),
                    current.num_channels(),
                    current.frames(),
                    current.sample_rate()
                )));
            }
        }

        let track = Track {
            description: description.clone(),
            audio: target,
            iteration,
        };
        Ok((track, residual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RATE: u32 = 16000;

    /// Target = half the input, residual = the other half
    struct HalvingSeparator;

    impl Separator for HalvingSeparator {
        fn separate(
            &self,
            waveform: &Waveform,
            _description: &Description,
            _params: &SeparationParams,
        ) -> MlResult<SeparationOutput> {
            let half: Vec<f32> = waveform.samples().iter().map(|s| s * 0.5).collect();
            let target = Waveform::mono(half, waveform.sample_rate())?;
            let residual = waveform.subtract(&target)?;
            Ok(SeparationOutput { target, residual })
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn model_name(&self) -> &str {
            "halving"
        }
    }

    /// Fails on the n-th call
    struct FailingSeparator {
        fail_at: usize,
        calls: AtomicUsize,
    }

    impl Separator for FailingSeparator {
        fn separate(
            &self,
            waveform: &Waveform,
            description: &Description,
            params: &SeparationParams,
        ) -> MlResult<SeparationOutput> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(MlError::SeparationFailed("model exploded".into()));
            }
            HalvingSeparator.separate(waveform, description, params)
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    /// Returns a truncated residual
    struct ShortSeparator;

    impl Separator for ShortSeparator {
        fn separate(
            &self,
            waveform: &Waveform,
            _description: &Description,
            _params: &SeparationParams,
        ) -> MlResult<SeparationOutput> {
            let frames = waveform.frames();
            Ok(SeparationOutput {
                target: waveform.clone(),
                residual: Waveform::silence(frames / 2, waveform.sample_rate())?,
            })
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    fn ramp(frames: usize) -> Waveform {
        Waveform::mono((0..frames).map(|i| i as f32 / frames as f32).collect(), RATE).unwrap()
    }

    fn labels(names: &[&str]) -> Vec<Description> {
        names.iter().map(|&n| Description::new(n)).collect()
    }

    #[test]
    fn test_track_per_description() {
        let input = ramp(64);
        let descriptions = labels(&["guitar", "drums", "vocals"]);

        let result = Orchestrator::new(&HalvingSeparator)
            .run(&input, &descriptions, &IterationOptions::default())
            .unwrap();

        assert_eq!(result.track_count(), 3);
        for (i, track) in result.tracks.iter().enumerate() {
            assert_eq!(track.iteration, i);
            assert_eq!(track.description, descriptions[i]);
            assert!(track.audio.same_shape(&input));
        }
        assert!(result.residual.same_shape(&input));
        assert_eq!(result.sample_rate, RATE);
        assert!(result.scores.is_none());
    }

    #[test]
    fn test_residual_chaining() {
        let input = ramp(32);
        let result = Orchestrator::new(&HalvingSeparator)
            .run(&input, &labels(&["a", "b", "c"]), &IterationOptions::default())
            .unwrap();

        // Each step sees the previous residual, so energy halves per track
        let last = input.samples()[31];
        approx::assert_relative_eq!(result.tracks[0].audio.samples()[31], last * 0.5);
        approx::assert_relative_eq!(result.tracks[1].audio.samples()[31], last * 0.25);
        approx::assert_relative_eq!(result.tracks[2].audio.samples()[31], last * 0.125);
        approx::assert_relative_eq!(result.residual.samples()[31], last * 0.125);
    }

    #[test]
    fn test_empty_description_list() {
        let input = ramp(16);
        let result = Orchestrator::new(&HalvingSeparator)
            .run(&input, &[], &IterationOptions::default())
            .unwrap();

        assert!(result.tracks.is_empty());
        assert_eq!(result.residual, input);
    }

    #[test]
    fn test_single_matches_first_iteration() {
        let input = ramp(48);
        let options = IterationOptions::default();
        let orchestrator = Orchestrator::new(&HalvingSeparator);

        let single = orchestrator
            .separate_one(&input, &"drums".into(), None, &options)
            .unwrap();
        let full = orchestrator
            .run(&input, &labels(&["drums", "bass"]), &options)
            .unwrap();

        assert_eq!(single.target, full.tracks[0].audio);
    }

    #[test]
    fn test_repeated_description_not_idempotent() {
        let input = ramp(16);
        let result = Orchestrator::new(&HalvingSeparator)
            .run(&input, &labels(&["drums", "drums"]), &IterationOptions::default())
            .unwrap();

        assert_ne!(result.tracks[0].audio, result.tracks[1].audio);
    }

    #[test]
    fn test_failure_discards_everything() {
        let separator = FailingSeparator {
            fail_at: 1,
            calls: AtomicUsize::new(0),
        };

        let err = Orchestrator::new(&separator)
            .run(&ramp(16), &labels(&["guitar", "drums", "vocals"]), &IterationOptions::default())
            .unwrap_err();

        match err {
            MlError::IterationFailed {
                iteration,
                ref description,
                ..
            } => {
                assert_eq!(iteration, 1);
                assert_eq!(description, "drums");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(separator.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shape_breach_is_contract_error() {
        let err = Orchestrator::new(&ShortSeparator)
            .run(&ramp(16), &labels(&["drums"]), &IterationOptions::default())
            .unwrap_err();

        let MlError::IterationFailed { source, .. } = err else {
            panic!("expected iteration failure");
        };
        assert!(matches!(*source, MlError::AdapterContract(_)));
    }

    #[test]
    fn test_rejects_wrong_rate_and_stereo() {
        let orchestrator = Orchestrator::new(&HalvingSeparator);
        let options = IterationOptions::default();

        let wrong_rate = Waveform::silence(16, 22050).unwrap();
        assert!(matches!(
            orchestrator.run(&wrong_rate, &[], &options),
            Err(MlError::InvalidSampleRate { expected: RATE, got: 22050 })
        ));

        let stereo = Waveform::from_channels(vec![vec![0.0; 8], vec![0.0; 8]], RATE).unwrap();
        assert!(matches!(
            orchestrator.run(&stereo, &[], &options),
            Err(MlError::ChannelMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_concurrent_runs_share_separator() {
        let separator = Arc::new(HalvingSeparator);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let separator = Arc::clone(&separator);
                std::thread::spawn(move || {
                    let input = ramp(16 + i);
                    Orchestrator::new(separator.as_ref())
                        .run(&input, &labels(&["a", "b"]), &IterationOptions::default())
                        .map(|r| r.residual.frames())
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap().unwrap(), 16 + i);
        }
    }
}
