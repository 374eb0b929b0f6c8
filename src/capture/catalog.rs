//! Source enumeration across several probing strategies.
//!
//! The host capture API returns different source sets depending on the
//! requested frame size and source kinds, and individual requests fail
//! intermittently. The catalog runs every strategy in turn and keeps the
//! richest result: the one with the most distinct sources.

use super::error::{CaptureError, CaptureResult};
use super::host::{RawSource, SourceProvider, SourceRequest};
use super::model::{CaptureSource, DisplayDescriptor, FrameSize, SourceKind};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// One way of asking the host for sources.
#[async_trait]
pub trait EnumerationStrategy: Send + Sync {
    fn name(&self) -> String;

    async fn probe(&self, provider: &dyn SourceProvider) -> CaptureResult<Vec<CaptureSource>>;
}

/// Sources found by one strategy, scored by distinct-id count.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub index: usize,
    pub score: usize,
    pub sources: Vec<CaptureSource>,
}

/// Plain request strategy, optionally filtering the result to screens.
pub struct RequestStrategy {
    label: String,
    request: SourceRequest,
}

impl RequestStrategy {
    pub fn new(label: impl Into<String>, request: SourceRequest) -> Self {
        Self {
            label: label.into(),
            request,
        }
    }
}

#[async_trait]
impl EnumerationStrategy for RequestStrategy {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn probe(&self, provider: &dyn SourceProvider) -> CaptureResult<Vec<CaptureSource>> {
        let raw = provider.get_sources(&self.request).await?;
        Ok(screens_only(raw))
    }
}

/// Parses the host's display association. Unparsable or absent ⇒ `None`.
pub fn parse_display_id(raw: Option<&str>) -> Option<u64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Converts host sources to catalog sources, dropping non-screen kinds.
pub fn screens_only(raw: Vec<RawSource>) -> Vec<CaptureSource> {
    raw.into_iter()
        .filter(|s| s.kind == SourceKind::Screen)
        .map(|s| CaptureSource {
            display_id: parse_display_id(s.display_id.as_deref()),
            id: s.id,
            name: s.name,
            kind: s.kind,
            frame: s.frame,
        })
        .collect()
}

fn distinct_ids(sources: &[CaptureSource]) -> usize {
    sources.iter().map(|s| s.id.as_str()).collect::<HashSet<_>>().len()
}

/// Frame sizes used by the built-in strategies.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSizes {
    pub baseline: FrameSize,
    pub high_res: FrameSize,
    pub low_res: FrameSize,
}

/// The built-in strategy list, in tie-break order.
pub fn default_strategies(
    sizes: ProbeSizes,
    displays: &[DisplayDescriptor],
) -> Vec<Box<dyn EnumerationStrategy>> {
    let mut strategies: Vec<Box<dyn EnumerationStrategy>> = vec![
        Box::new(RequestStrategy::new(
            "baseline",
            SourceRequest::screens(sizes.baseline),
        )),
        Box::new(RequestStrategy::new(
            "high-res",
            SourceRequest::screens(sizes.high_res),
        )),
        Box::new(RequestStrategy::new(
            "low-res",
            SourceRequest::screens(sizes.low_res),
        )),
        Box::new(RequestStrategy::new(
            "with-windows",
            SourceRequest::screens_and_windows(sizes.baseline),
        )),
    ];

    for display in displays {
        strategies.push(Box::new(RequestStrategy::new(
            format!("display-{}", display.id),
            SourceRequest::screens(display.physical_size()),
        )));
    }

    strategies
}

/// Runs the strategies sequentially and keeps the best outcome.
///
/// Ties go to the earliest strategy. Failures and empty results are logged
/// and skipped.
pub async fn run_strategies(
    provider: &dyn SourceProvider,
    strategies: &[Box<dyn EnumerationStrategy>],
) -> CaptureResult<StrategyOutcome> {
    let mut best: Option<StrategyOutcome> = None;

    for (index, strategy) in strategies.iter().enumerate() {
        let name = strategy.name();
        let start = std::time::Instant::now();

        let sources = match strategy.probe(provider).await {
            Ok(sources) if !sources.is_empty() => sources,
            Ok(_) => {
                log::warn!("[CATALOG] Strategy {} returned no screen sources", name);
                continue;
            }
            Err(e) => {
                log::warn!("[CATALOG] Strategy {} failed: {}", name, e);
                continue;
            }
        };

        let score = distinct_ids(&sources);
        log::info!(
            "[CATALOG] Strategy {} found {} sources in {}ms",
            name,
            score,
            start.elapsed().as_millis()
        );

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(StrategyOutcome {
                strategy: name,
                index,
                score,
                sources,
            });
        }
    }

    best.ok_or(CaptureError::NoSourcesAvailable {
        attempts: strategies.len(),
    })
}

/// Enumerates screen sources through the host, keeping the richest set.
#[derive(Clone)]
pub struct SourceCatalog {
    provider: Arc<dyn SourceProvider>,
}

impl SourceCatalog {
    pub fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn SourceProvider> {
        &self.provider
    }

    pub async fn enumerate(
        &self,
        sizes: ProbeSizes,
        displays: &[DisplayDescriptor],
    ) -> CaptureResult<StrategyOutcome> {
        let strategies = default_strategies(sizes, displays);
        let outcome = run_strategies(self.provider.as_ref(), &strategies).await?;
        log::info!(
            "[CATALOG] Using strategy {} ({} sources): {}",
            outcome.strategy,
            outcome.score,
            outcome
                .sources
                .iter()
                .map(|s| format!("{} '{}'", s.id, s.name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(outcome)
    }
}
