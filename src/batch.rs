use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::align::GlobalAligner;
use crate::dataset::LocalDataset;
use crate::domain::{Identifier, NamedSequence, ResourceKind};
use crate::resolver::Resolver;
use crate::scorer::{AlignmentScorer, ScoreOutcome};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub kind: ResourceKind,
    pub started_at: String,
    pub requested: usize,
    pub tiers: BTreeMap<String, usize>,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlignReport {
    pub started_at: String,
    pub pairs: usize,
    pub scored: usize,
    pub accepted: usize,
    pub already_scored: usize,
    pub exhausted: usize,
    pub accepted_pairs: Vec<AcceptedPair>,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedPair {
    pub reference: String,
    pub comparison: String,
    pub normalized_score: f64,
}

pub fn normalize_identifiers(kind: ResourceKind, ids: &[Identifier]) -> Vec<Identifier> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .map(|id| {
            if kind.is_target() {
                id.without_variant()
            } else {
                id.clone()
            }
        })
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

pub fn resolve_batch(
    resolver: &Resolver,
    kind: ResourceKind,
    ids: &[Identifier],
    datasets: &[&LocalDataset],
    sink: &dyn ProgressSink,
) -> ResolveReport {
    let ids = normalize_identifiers(kind, ids);
    let mut report = ResolveReport {
        kind,
        started_at: chrono::Utc::now().to_rfc3339(),
        requested: ids.len(),
        tiers: BTreeMap::new(),
        failures: Vec::new(),
    };
    let start = Instant::now();

    for (index, id) in ids.iter().enumerate() {
        match resolver.resolve(id, kind, datasets) {
            Ok(resolution) => {
                *report.tiers.entry(resolution.tier().to_string()).or_default() += 1;
                sink.event(ProgressEvent {
                    message: format!(
                        "phase=Resolve; {kind} {id} ({}/{}) {}",
                        index + 1,
                        ids.len(),
                        resolution.tier()
                    ),
                    elapsed: Some(start.elapsed()),
                });
            }
            Err(err) => {
                warn!(identifier = %id, %kind, %err, "resolution failed; will retry on next run");
                report.failures.push(ItemFailure {
                    item: id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
    report
}

pub fn align_batch<A: GlobalAligner>(
    scorer: &AlignmentScorer<A>,
    reference: &[NamedSequence],
    comparison: &[NamedSequence],
    workers: usize,
    sink: &dyn ProgressSink,
) -> AlignReport {
    let pairs: Vec<(&NamedSequence, &NamedSequence)> = reference
        .iter()
        .flat_map(|a| comparison.iter().map(move |b| (a, b)))
        .collect();
    let next = AtomicUsize::new(0);
    let report = Mutex::new(AlignReport {
        started_at: chrono::Utc::now().to_rfc3339(),
        pairs: pairs.len(),
        ..AlignReport::default()
    });
    let start = Instant::now();

    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            scope.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some((a, b)) = pairs.get(index) else {
                        break;
                    };
                    let outcome = scorer.score(a, b);
                    let mut report = report.lock().unwrap_or_else(|err| err.into_inner());
                    record_outcome(&mut report, a, b, outcome);
                    drop(report);
                    sink.event(ProgressEvent {
                        message: format!(
                            "phase=Align; {}_{} ({}/{})",
                            a.id,
                            b.id,
                            index + 1,
                            pairs.len()
                        ),
                        elapsed: Some(start.elapsed()),
                    });
                }
            });
        }
    });

    let mut report = report.into_inner().unwrap_or_else(|err| err.into_inner());
    report.accepted_pairs.sort_by(|x, y| {
        y.normalized_score
            .total_cmp(&x.normalized_score)
            .then_with(|| x.reference.cmp(&y.reference))
            .then_with(|| x.comparison.cmp(&y.comparison))
    });
    report
}

fn record_outcome(
    report: &mut AlignReport,
    a: &NamedSequence,
    b: &NamedSequence,
    outcome: Result<ScoreOutcome, crate::error::HomopairError>,
) {
    match outcome {
        Ok(ScoreOutcome::Scored(result)) => {
            report.scored += 1;
            if result.accepted {
                report.accepted += 1;
                report.accepted_pairs.push(AcceptedPair {
                    reference: a.id.to_string(),
                    comparison: b.id.to_string(),
                    normalized_score: result.normalized_score,
                });
            }
        }
        Ok(ScoreOutcome::AlreadyScored) => report.already_scored += 1,
        Ok(ScoreOutcome::Failed { reason }) => {
            report.exhausted += 1;
            report.failures.push(ItemFailure {
                item: format!("{}_{}", a.id, b.id),
                error: reason,
            });
        }
        Err(err) => {
            warn!(reference = %a.id, comparison = %b.id, %err, "pair skipped");
            report.failures.push(ItemFailure {
                item: format!("{}_{}", a.id, b.id),
                error: err.to_string(),
            });
        }
    }
}
