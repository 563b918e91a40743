//! Memoized homology scoring of gene pairs.
//!
//! The raw global alignment score is divided by the length of the *shorter*
//! sequence. That makes the score an identity estimate over the shorter
//! sequence: it is asymmetric with respect to length differences and runs
//! high when one gene is much shorter than the other, so thresholds are
//! calibrated against this denominator and not the longer or mean length.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error};

use crate::align::GlobalAligner;
use crate::config::validate_threshold;
use crate::domain::{NamedSequence, PairKey, ResourceKind};
use crate::error::HomopairError;
use crate::store::{KvStore, Store};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentResult {
    pub normalized_score: f64,
    pub accepted: bool,
    pub raw_sequences: Option<(String, String)>,
    pub latency_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ScoreOutcome {
    Scored(AlignmentResult),
    AlreadyScored,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAlignment {
    pub latency_seconds: f64,
    pub normalized_score: Option<f64>,
    pub sequences: Option<(String, String)>,
}

impl StoredAlignment {
    pub fn accepted(&self) -> bool {
        self.normalized_score.is_some()
    }
}

pub struct AlignmentScorer<A: GlobalAligner> {
    store: Store,
    aligner: A,
    threshold: f64,
}

impl<A: GlobalAligner> AlignmentScorer<A> {
    pub fn new(store: Store, aligner: A, threshold: f64) -> Result<Self, HomopairError> {
        validate_threshold(threshold)?;
        Ok(Self {
            store,
            aligner,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn namespace(&self) -> &dyn KvStore {
        self.store.namespace(ResourceKind::Alignment)
    }

    pub fn is_scored(&self, pair: &PairKey) -> Result<bool, HomopairError> {
        self.namespace().contains(&pair.time_key())
    }

    pub fn score(
        &self,
        reference: &NamedSequence,
        comparison: &NamedSequence,
    ) -> Result<ScoreOutcome, HomopairError> {
        let started = Instant::now();
        let pair = PairKey::new(reference.id.clone(), comparison.id.clone());
        if self.is_scored(&pair)? {
            debug!(%pair, "pair already scored");
            return Ok(ScoreOutcome::AlreadyScored);
        }
        for side in [reference, comparison] {
            if !side.is_alignable() {
                return Err(HomopairError::UnresolvedSequence(side.id.to_string()));
            }
        }

        let raw_score = match self
            .aligner
            .score(reference.sequence.as_bytes(), comparison.sequence.as_bytes())
        {
            Ok(score) => score,
            Err(HomopairError::ResourceExhaustion(reason)) => {
                // The aligner's buffers are dropped by now.
                error!(
                    reference = %reference.id,
                    comparison = %comparison.id,
                    reference_len = reference.len(),
                    comparison_len = comparison.len(),
                    %reason,
                    "alignment ran out of memory"
                );
                return Ok(ScoreOutcome::Failed { reason });
            }
            Err(err) => return Err(err),
        };

        let shortest = reference.len().min(comparison.len());
        let normalized_score = raw_score / shortest as f64;
        let accepted = normalized_score >= self.threshold;

        let namespace = self.namespace();
        let raw_sequences = if accepted {
            namespace.set_if_absent(&pair.score_key(), &normalized_score.to_string())?;
            namespace.set_if_absent(
                &pair.sequences_key(),
                &format!("{} {}", reference.sequence, comparison.sequence),
            )?;
            Some((reference.sequence.clone(), comparison.sequence.clone()))
        } else {
            None
        };

        let latency_seconds = started.elapsed().as_secs_f64();
        namespace.set_if_absent(&pair.time_key(), &latency_seconds.to_string())?;
        debug!(%pair, normalized_score, accepted, latency_seconds, "pair scored");

        Ok(ScoreOutcome::Scored(AlignmentResult {
            normalized_score,
            accepted,
            raw_sequences,
            latency_seconds,
        }))
    }

    pub fn lookup(&self, pair: &PairKey) -> Result<Option<StoredAlignment>, HomopairError> {
        lookup_alignment(&self.store, pair)
    }
}

pub fn lookup_alignment(
    store: &Store,
    pair: &PairKey,
) -> Result<Option<StoredAlignment>, HomopairError> {
    let namespace = store.namespace(ResourceKind::Alignment);
    let Some(latency) = namespace.get(&pair.time_key())? else {
        return Ok(None);
    };
    let parse = |key: &str, value: &str| {
        value
            .parse::<f64>()
            .map_err(|err| HomopairError::Store(format!("{key}: {err}")))
    };
    let latency_seconds = parse(&pair.time_key(), &latency)?;
    let normalized_score = namespace
        .get(&pair.score_key())?
        .map(|value| parse(&pair.score_key(), &value))
        .transpose()?;
    let sequences = namespace.get(&pair.sequences_key())?.and_then(|value| {
        value
            .split_once(' ')
            .map(|(a, b)| (a.to_string(), b.to_string()))
    });
    Ok(Some(StoredAlignment {
        latency_seconds,
        normalized_score,
        sequences,
    }))
}
