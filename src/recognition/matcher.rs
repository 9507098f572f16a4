//! Similarity matcher: picks the enrolled student a probe photo most plausibly depicts.
//!
//! The probe descriptor is extracted once; every candidate's reference
//! descriptor is then extracted (bounded fan-out, input order preserved) and
//! compared by Euclidean distance. Only candidates strictly under the
//! threshold are acceptable, and the lowest distance wins; equal distances go
//! to the earlier candidate. A candidate whose reference cannot be read is
//! skipped, never fatal.

use futures::{StreamExt, stream};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::extractor::{ExtractError, FeatureExtractor, FeatureVector, ImageSource};
use crate::error::CoreError;

/// Threshold calibrated for 128-d face-api style descriptors; recalibrate
/// when swapping the extractor.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub student_id: u64,
    pub reference: ImageSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub student_id: u64,
    pub distance: f32,
    /// Display only: `round((1 - distance) * 100)`.
    pub similarity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(Match),
    NoMatch,
}

/// Result of one identification, with the candidates that had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub outcome: MatchOutcome,
    pub compared: usize,
    pub skipped: Vec<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct MatcherSettings {
    pub threshold: f32,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            timeout: Duration::from_secs(5),
            concurrency: 4,
        }
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

pub fn similarity_percent(distance: f32) -> i32 {
    ((1.0 - distance) * 100.0).round() as i32
}

/// Lowest acceptable distance wins; a later candidate must be strictly closer
/// to displace an earlier one.
fn select_best(
    candidates: &[Candidate],
    distances: &[Option<f32>],
    threshold: f32,
) -> Option<Match> {
    let mut best: Option<Match> = None;

    for (candidate, distance) in candidates.iter().zip(distances) {
        let Some(distance) = *distance else { continue };
        if !(distance < threshold) {
            continue;
        }
        if best.as_ref().is_none_or(|b| distance < b.distance) {
            best = Some(Match {
                student_id: candidate.student_id,
                distance,
                similarity: similarity_percent(distance),
            });
        }
    }

    best
}

pub struct Matcher {
    extractor: Arc<dyn FeatureExtractor>,
    settings: MatcherSettings,
}

impl Matcher {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, settings: MatcherSettings) -> Self {
        Self {
            extractor,
            settings,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.settings.threshold
    }

    async fn extract_bounded(&self, image: &ImageSource) -> Result<FeatureVector, ExtractError> {
        match tokio::time::timeout(self.settings.timeout, self.extractor.extract(image)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout(self.settings.timeout)),
        }
    }

    /// Distance from the probe to one candidate, or `None` when the candidate
    /// reference is unusable.
    async fn distance_to(&self, probe: &[f32], candidate: &Candidate) -> Option<f32> {
        let reference = match self.extract_bounded(&candidate.reference).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    student_id = candidate.student_id,
                    reference = %candidate.reference.describe(),
                    error = %e,
                    "Skipping candidate: reference descriptor unavailable"
                );
                return None;
            }
        };

        match euclidean_distance(probe, &reference) {
            Some(distance) => {
                debug!(
                    student_id = candidate.student_id,
                    distance,
                    similarity = similarity_percent(distance),
                    "Compared candidate"
                );
                Some(distance)
            }
            None => {
                warn!(
                    student_id = candidate.student_id,
                    probe_len = probe.len(),
                    reference_len = reference.len(),
                    "Skipping candidate: descriptor length mismatch"
                );
                None
            }
        }
    }

    /// Read-only identification of `probe` among `candidates`.
    ///
    /// Fails only when the probe itself is unusable; `NoMatch` is a normal outcome.
    pub async fn identify(
        &self,
        probe: &ImageSource,
        candidates: &[Candidate],
    ) -> Result<Identification, CoreError> {
        let probe_vector = match self.extract_bounded(probe).await {
            Ok(v) => v,
            Err(ExtractError::NoFace) | Err(ExtractError::Timeout(_)) => {
                info!("Probe rejected: no face detected");
                return Err(CoreError::NoFaceDetected);
            }
            Err(ExtractError::Unavailable(reason)) => {
                warn!(%reason, "Probe extraction failed");
                return Err(CoreError::ExtractorUnavailable(reason));
            }
        };

        // `buffered` keeps input order, so every distance is collected before selection.
        let distances: Vec<Option<f32>> = stream::iter(candidates)
            .map(|candidate| self.distance_to(&probe_vector, candidate))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let skipped: Vec<u64> = candidates
            .iter()
            .zip(&distances)
            .filter(|(_, d)| d.is_none())
            .map(|(c, _)| c.student_id)
            .collect();

        let outcome = match select_best(candidates, &distances, self.settings.threshold) {
            Some(found) => {
                info!(
                    student_id = found.student_id,
                    distance = found.distance,
                    similarity = found.similarity,
                    "Match found"
                );
                MatchOutcome::Matched(found)
            }
            None => {
                info!(candidates = candidates.len(), "No match found");
                MatchOutcome::NoMatch
            }
        };

        Ok(Identification {
            outcome,
            compared: candidates.len() - skipped.len(),
            skipped,
        })
    }
}
