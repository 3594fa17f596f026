//! Collection orchestrator: runs every collector of the lookup table as an
//! independent task and merges what they return.
//!
//! A run moves through `Idle -> Dispatching -> Collecting -> Merging -> Done`.
//! A failing or panicking collector only contributes an empty result; the
//! batch itself never aborts. A shutdown signal stops waiting, aborts the
//! tasks still pending and reports them as cancelled.

use anyhow::{bail, Result};
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::discovery::{Collector, CollectorError, SourceKind, SubdomainSet};
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Dispatching,
    Collecting,
    Merging,
    Done,
}

/// What one source contributed to a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum SourceOutcome {
    Found(SubdomainSet),
    Failed(String),
    Cancelled,
}

impl SourceOutcome {
    /// Subdomains found; failed and cancelled sources count as empty
    pub fn subdomains(&self) -> Option<&SubdomainSet> {
        match self {
            SourceOutcome::Found(set) => Some(set),
            _ => None,
        }
    }

    pub fn count(&self) -> usize {
        self.subdomains().map_or(0, BTreeSet::len)
    }
}

/// Per-source results plus their deduplicated union
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub target: String,
    pub outcomes: BTreeMap<SourceKind, SourceOutcome>,
    pub combined: SubdomainSet,
}

impl CollectionReport {
    pub fn from_outcomes(target: impl Into<String>, outcomes: impl IntoIterator<Item = (SourceKind, SourceOutcome)>) -> Self {
        let outcomes: BTreeMap<SourceKind, SourceOutcome> = outcomes.into_iter().collect();
        let combined = merge_results(outcomes.values().filter_map(SourceOutcome::subdomains));
        Self {
            target: target.into(),
            outcomes,
            combined,
        }
    }

    /// True when no source found anything
    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }

    /// Sources that found at least one subdomain, in source order
    pub fn per_source(&self) -> impl Iterator<Item = (SourceKind, &SubdomainSet)> {
        self.outcomes
            .iter()
            .filter_map(|(kind, outcome)| outcome.subdomains().map(|set| (*kind, set)))
            .filter(|(_, set)| !set.is_empty())
    }

    pub fn failed(&self) -> impl Iterator<Item = (SourceKind, &str)> {
        self.outcomes.iter().filter_map(|(kind, outcome)| match outcome {
            SourceOutcome::Failed(reason) => Some((*kind, reason.as_str())),
            _ => None,
        })
    }

    pub fn cancelled(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SourceOutcome::Cancelled))
            .map(|(kind, _)| *kind)
    }
}

/// Set union of per-source results. Order of the inputs does not matter.
pub fn merge_results<'a>(sets: impl IntoIterator<Item = &'a SubdomainSet>) -> SubdomainSet {
    sets.into_iter().flat_map(|set| set.iter().cloned()).collect()
}

/// Resolve once `true` is published on the channel. A dropped sender never
/// triggers shutdown.
pub async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

type TaskResult = (SourceKind, Result<Result<SubdomainSet, CollectorError>, String>);

pub struct Orchestrator {
    collectors: Vec<Arc<Collector>>,
    max_tasks: usize,
    show_progress: bool,
}

impl Orchestrator {
    /// An empty collector table is a configuration error.
    pub fn new(collectors: Vec<Collector>, max_tasks: usize) -> Result<Self> {
        if collectors.is_empty() {
            bail!("No sources enabled: enable a source or configure an API key");
        }
        Ok(Self {
            collectors: collectors.into_iter().map(Arc::new).collect(),
            max_tasks: max_tasks.max(1),
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.collectors.iter().map(|c| c.kind()).collect()
    }

    pub async fn run<F>(&self, target: &Target, shutdown: F) -> CollectionReport
    where
        F: Future<Output = ()>,
    {
        let mut phase = RunPhase::Idle;
        let total = self.collectors.len();
        let target = Arc::new(target.clone());

        advance(&mut phase, RunPhase::Dispatching);
        let permits = Arc::new(Semaphore::new(self.max_tasks));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        let mut pending: BTreeSet<SourceKind> = BTreeSet::new();

        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let target = Arc::clone(&target);
            let permits = Arc::clone(&permits);
            let kind = collector.kind();
            pending.insert(kind);

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                debug!("{} started", kind);
                let outcome = AssertUnwindSafe(collector.collect(&target))
                    .catch_unwind()
                    .await
                    .map_err(|panic| panic_message(panic.as_ref()));
                (kind, outcome)
            });
        }
        info!("Dispatched {} collectors for {} (max {} at once)", total, target, self.max_tasks);

        advance(&mut phase, RunPhase::Collecting);
        let progress = self.show_progress.then(|| new_progress_bar(total as u64));
        let mut outcomes: Vec<(SourceKind, SourceOutcome)> = Vec::with_capacity(total);
        let mut completed = 0usize;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let (kind, result) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            warn!("Collector task ended unexpectedly: {}", e);
                            continue;
                        }
                    };
                    completed += 1;
                    pending.remove(&kind);
                    let outcome = record_outcome(kind, result, completed, total);
                    if let Some(pb) = &progress {
                        pb.set_message(format!("{} done", kind));
                        pb.inc(1);
                    }
                    outcomes.push((kind, outcome));
                }
                _ = &mut shutdown => {
                    warn!("Shutdown requested, cancelling {} pending collectors", pending.len());
                    tasks.abort_all();
                    break;
                }
            }
        }

        for kind in std::mem::take(&mut pending) {
            outcomes.push((kind, SourceOutcome::Cancelled));
        }
        if let Some(pb) = progress {
            pb.finish_with_message(format!("{}/{} sources finished", completed, total));
        }

        let report = if outcomes.iter().all(|(_, outcome)| outcome.count() == 0) {
            info!("No subdomains found for {}", target);
            CollectionReport {
                target: target.label(),
                outcomes: outcomes.into_iter().collect(),
                combined: SubdomainSet::new(),
            }
        } else {
            advance(&mut phase, RunPhase::Merging);
            let report = CollectionReport::from_outcomes(target.label(), outcomes);
            info!("Collected {} unique subdomains for {}", report.combined.len(), target);
            report
        };

        advance(&mut phase, RunPhase::Done);
        report
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    debug!("Run phase: {:?} -> {:?}", phase, next);
    *phase = next;
}

fn record_outcome(
    kind: SourceKind,
    result: Result<Result<SubdomainSet, CollectorError>, String>,
    completed: usize,
    total: usize,
) -> SourceOutcome {
    match result {
        Ok(Ok(set)) => {
            if set.is_empty() {
                warn!("[{}/{}] {} found no subdomains", completed, total, kind);
            } else {
                info!("[{}/{}] {} finished with {} subdomains", completed, total, kind, set.len());
            }
            SourceOutcome::Found(set)
        }
        Ok(Err(e)) => {
            warn!("[{}/{}] {} failed: {}", completed, total, kind, e);
            SourceOutcome::Failed(e.to_string())
        }
        Err(panic) => {
            warn!("[{}/{}] {} panicked: {}", completed, total, kind, panic);
            SourceOutcome::Failed(format!("collector panicked: {}", panic))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn new_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sources {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}
