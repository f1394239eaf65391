use crate::core::aggregator::{self, Partition, ReportFormat};
use crate::core::cache::ProbeCache;
use crate::core::normalizer;
use crate::core::prober::Prober;
use crate::domain::model::{Annotations, Identifier, OwnerId, ProbeResult};
use crate::domain::ports::{Annotator, DeliveryChannel, Fetcher, NoAnnotation, SavedSets};
use crate::utils::error::{CheckError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Collecting,
    Dispatching,
    Aggregating,
    Emitting,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Idle => "idle",
            BatchState::Collecting => "collecting",
            BatchState::Dispatching => "dispatching",
            BatchState::Aggregating => "aggregating",
            BatchState::Emitting => "emitting",
        };
        f.write_str(name)
    }
}

/// Outcome of one bulk check as seen by the caller.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub partition: Partition,
    pub cache_hits: usize,
    pub probed: usize,
    pub chunks_sent: usize,
    pub chunks_failed: usize,
    /// Non-fatal store persistence problem observed during the check.
    pub warning: Option<String>,
}

struct Batch {
    owner: OwnerId,
    state: BatchState,
    started: Instant,
}

impl Batch {
    fn start(owner: OwnerId) -> Self {
        Self {
            owner,
            state: BatchState::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: BatchState) {
        tracing::debug!(
            "Batch for owner {}: {} -> {} ({:?})",
            self.owner,
            self.state,
            next,
            self.started.elapsed()
        );
        self.state = next;
    }
}

pub const NO_SAVED_NUMBERS: &str = "You have no saved numbers. Add some first.";

/// Runs the check-all-saved-identifiers flow over explicit store, cache and
/// prober instances.
pub struct Orchestrator<F: Fetcher> {
    saved: Arc<dyn SavedSets>,
    cache: Arc<ProbeCache>,
    prober: Prober<F>,
    format: ReportFormat,
    inline_max: usize,
    annotator: Arc<dyn Annotator>,
}

impl<F: Fetcher> Orchestrator<F> {
    pub fn new(
        saved: Arc<dyn SavedSets>,
        cache: Arc<ProbeCache>,
        prober: Prober<F>,
        format: ReportFormat,
        inline_max: usize,
    ) -> Self {
        Self {
            saved,
            cache,
            prober,
            format,
            inline_max,
            annotator: Arc::new(NoAnnotation),
        }
    }

    /// Runs `annotator` over the positive identifiers of every batch.
    pub fn with_annotator(mut self, annotator: Arc<dyn Annotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    pub async fn check_saved(
        &self,
        owner: OwnerId,
        channel: &dyn DeliveryChannel,
    ) -> Result<CheckReport> {
        self.check_saved_at(owner, channel, Utc::now()).await
    }

    pub async fn check_saved_at(
        &self,
        owner: OwnerId,
        channel: &dyn DeliveryChannel,
        now: DateTime<Utc>,
    ) -> Result<CheckReport> {
        let mut batch = Batch::start(owner);
        batch.advance(BatchState::Collecting);
        let ids = self.collect(owner).await?;
        self.run(batch, ids, channel, now).await
    }

    /// Low-latency variant: identifiers come from the query text when it has
    /// any, otherwise from the saved set, and are capped at `inline_max`.
    pub async fn check_inline(
        &self,
        owner: OwnerId,
        query: &str,
        channel: &dyn DeliveryChannel,
    ) -> Result<CheckReport> {
        self.check_inline_at(owner, query, channel, Utc::now()).await
    }

    pub async fn check_inline_at(
        &self,
        owner: OwnerId,
        query: &str,
        channel: &dyn DeliveryChannel,
        now: DateTime<Utc>,
    ) -> Result<CheckReport> {
        let mut batch = Batch::start(owner);
        batch.advance(BatchState::Collecting);

        let from_query = normalizer::identifiers(normalizer::split_tokens(query));
        let mut ids = if from_query.is_empty() {
            self.collect(owner).await?
        } else {
            deterministic(from_query)
        };
        if ids.len() > self.inline_max {
            tracing::debug!(
                "Inline check for owner {} truncated from {} to {}",
                owner,
                ids.len(),
                self.inline_max
            );
            ids.truncate(self.inline_max);
        }
        self.run(batch, ids, channel, now).await
    }

    async fn collect(&self, owner: OwnerId) -> Result<Vec<Identifier>> {
        let saved = self.saved.saved(owner).await.map_err(|e| {
            tracing::error!("Could not enumerate saved numbers for {}: {}", owner, e);
            CheckError::EnumerationError {
                owner,
                message: e.to_string(),
            }
        })?;
        Ok(deterministic(saved))
    }

    async fn run(
        &self,
        mut batch: Batch,
        ids: Vec<Identifier>,
        channel: &dyn DeliveryChannel,
        now: DateTime<Utc>,
    ) -> Result<CheckReport> {
        let mut report = CheckReport {
            warning: self.saved.persistence_warning(),
            ..CheckReport::default()
        };

        let format = self.format.clone().limited_to(channel.max_chunk_size());
        if channel.max_chunk_size() < format.widest_line(ids.len()) {
            tracing::warn!(
                "Channel accepts {} bytes per message; long result lines will be split",
                channel.max_chunk_size()
            );
        }

        if ids.is_empty() {
            batch.advance(BatchState::Emitting);
            self.emit(&format.single(NO_SAVED_NUMBERS), channel, &mut report)
                .await;
            batch.advance(BatchState::Idle);
            return Ok(report);
        }

        batch.advance(BatchState::Dispatching);
        let results = self.dispatch(&ids, now, &mut report).await;

        batch.advance(BatchState::Aggregating);
        report.partition = aggregator::partition(&results);
        let annotations = if report.partition.positive.is_empty() {
            Annotations::new()
        } else {
            self.annotator.annotate(&report.partition.positive).await
        };
        let chunks = format.format_annotated(&report.partition, &annotations);

        batch.advance(BatchState::Emitting);
        self.emit(&chunks, channel, &mut report).await;

        tracing::info!(
            "Checked {} numbers for owner {}: {} restricted, {} unknown, {} cached, {} probed in {:?}",
            report.partition.total,
            batch.owner,
            report.partition.positive.len(),
            report.partition.unknown.len(),
            report.cache_hits,
            report.probed,
            batch.started.elapsed()
        );
        batch.advance(BatchState::Idle);
        Ok(report)
    }

    /// Cache hits resolve immediately; misses go to the prober together and
    /// every fresh outcome is written back.
    async fn dispatch(
        &self,
        ids: &[Identifier],
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        for id in ids {
            match self.cache.get(id, now) {
                Some(classification) => results.push(ProbeResult::new(id.clone(), classification)),
                None => misses.push(id.clone()),
            }
        }
        report.cache_hits = results.len();
        report.probed = misses.len();

        let fresh = self.prober.probe_batch(&misses).await;
        for result in &fresh {
            self.cache.set(result.id.clone(), result.classification, now);
        }
        results.extend(fresh);
        results
    }

    async fn emit(&self, chunks: &[String], channel: &dyn DeliveryChannel, report: &mut CheckReport) {
        for chunk in chunks {
            match channel.send(chunk).await {
                Ok(()) => report.chunks_sent += 1,
                Err(e) => {
                    tracing::warn!("Failed to deliver result chunk: {}", e);
                    report.chunks_failed += 1;
                }
            }
        }
    }
}

fn deterministic(ids: Vec<Identifier>) -> Vec<Identifier> {
    let mut ids = normalizer::dedupe(ids);
    ids.sort();
    ids
}
