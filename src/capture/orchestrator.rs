//! Screenshot façade: one `capture_screenshot` entry point over the pipeline.
//!
//! ```text
//! initialize: topology → compatibility mode → catalog → selector → diagnostic pass
//! capture:    resolve source → fresh high-res frame → encode with fallback → cache id
//! ```
//!
//! All state sits behind one async mutex, so overlapping captures run one
//! after another and `last_successful_source` updates are ordered.

use super::catalog::{ProbeSizes, SourceCatalog};
use super::compat::{ColorCompatibilityAdvisor, CompatibilityMode, CompatibilityProfile};
use super::encoder::CaptureEncoder;
use super::error::{CaptureError, CaptureResult};
use super::host::{DisplayProvider, SourceProvider};
use super::model::{CaptureSource, CapturedImage, DisplayDescriptor, FrameSize, Source};
use super::selector::{RecommendationSummary, SourceSelector};
use super::topology::{primary_of, DisplayTopology};
use crate::config::CaptureConfig;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrchestratorState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Optional targeting for a capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub display_id: Option<u64>,
    pub preferred_source_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HdrStatus {
    pub mode: CompatibilityMode,
    pub profile: CompatibilityProfile,
}

/// Read-only snapshot for a settings/debug panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub initialized: bool,
    pub state: OrchestratorState,
    pub hdr_status: Option<HdrStatus>,
    pub monitor_info: Vec<DisplayDescriptor>,
    pub last_successful_source: Option<String>,
    pub recommendation: Option<RecommendationSummary>,
    pub catalog_strategy: Option<String>,
    pub source_count: usize,
    pub source_checks: Vec<SourceCheck>,
}

/// Outcome of encoding one source's enumeration frame during initialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCheck {
    pub source_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of probing one source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaptureReport {
    pub success: bool,
    pub source_id: String,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct Inner {
    state: OrchestratorState,
    displays: Vec<DisplayDescriptor>,
    advisor: Option<ColorCompatibilityAdvisor>,
    encoder: Option<CaptureEncoder>,
    catalog: Vec<CaptureSource>,
    catalog_strategy: Option<String>,
    selector: SourceSelector,
    last_successful_source: Option<String>,
    source_checks: Vec<SourceCheck>,
    /// Why the last catalog refresh failed; set while `Failed`.
    catalog_error: Option<CaptureError>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: OrchestratorState::Uninitialized,
            displays: Vec::new(),
            advisor: None,
            encoder: None,
            catalog: Vec::new(),
            catalog_strategy: None,
            selector: SourceSelector::new(),
            last_successful_source: None,
            source_checks: Vec::new(),
            catalog_error: None,
        }
    }

    fn primary_size(&self) -> FrameSize {
        primary_of(&self.displays)
            .map(|d| FrameSize::new(d.bounds.width, d.bounds.height))
            .unwrap_or(FrameSize::new(1920, 1080))
    }
}

pub struct ScreenshotOrchestrator {
    topology: DisplayTopology,
    catalog: SourceCatalog,
    config: CaptureConfig,
    inner: Mutex<Inner>,
}

impl ScreenshotOrchestrator {
    pub fn new(
        displays: Arc<dyn DisplayProvider>,
        sources: Arc<dyn SourceProvider>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            topology: DisplayTopology::new(displays),
            catalog: SourceCatalog::new(sources),
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Convenience for a backend that implements both host traits.
    pub fn with_host<H>(host: Arc<H>, config: CaptureConfig) -> Self
    where
        H: DisplayProvider + SourceProvider + 'static,
    {
        Self::new(host.clone(), host, config)
    }

    /// Returns `Ok(true)` once topology and compatibility mode are known.
    ///
    /// A catalog failure leaves the orchestrator `Failed` (captures retry
    /// initialization lazily) but still returns `Ok(true)`.
    pub async fn initialize(&self) -> CaptureResult<bool> {
        let mut inner = self.inner.lock().await;
        self.initialize_locked(&mut inner).await
    }

    pub async fn state(&self) -> OrchestratorState {
        self.inner.lock().await.state
    }

    pub async fn mode(&self) -> Option<CompatibilityMode> {
        self.inner.lock().await.advisor.as_ref().map(|a| a.mode())
    }

    pub async fn profile(&self) -> Option<CompatibilityProfile> {
        self.inner
            .lock()
            .await
            .advisor
            .as_ref()
            .map(|a| a.profile().clone())
    }

    async fn initialize_locked(&self, inner: &mut Inner) -> CaptureResult<bool> {
        let start = std::time::Instant::now();
        inner.state = OrchestratorState::Initializing;
        inner.last_successful_source = None;
        inner.source_checks.clear();
        inner.catalog_error = None;

        let displays = match self.topology.list_displays().await {
            Ok(displays) => displays,
            Err(e) => {
                log::error!("[CAPTURE] Initialization failed: {}", e);
                inner.state = OrchestratorState::Failed;
                return Err(e);
            }
        };

        let advisor = ColorCompatibilityAdvisor::initialize(
            &displays,
            self.config.force_mode,
            self.config.fallback_chain(),
        );
        let encoder = CaptureEncoder::new(
            self.catalog.provider().clone(),
            advisor.clone(),
            self.config.capture_floor,
        );

        inner.displays = displays;
        inner.advisor = Some(advisor.clone());
        inner.encoder = Some(encoder.clone());

        if let Err(e) = self.refresh_catalog(inner).await {
            log::warn!(
                "[CAPTURE] Initialization degraded after {}ms: {}",
                start.elapsed().as_millis(),
                e
            );
            inner.state = OrchestratorState::Failed;
            return Ok(true);
        }

        // Diagnostic pass over every enumeration frame; the first success is cached.
        let mut checks = Vec::with_capacity(inner.catalog.len());
        for source in &inner.catalog {
            let check = match encoder.encode(source.id.clone(), source.frame.clone()).await {
                Ok(image) => {
                    log::info!(
                        "[CAPTURE] Diagnostic: {} ok ({} bytes)",
                        source.id,
                        image.byte_len
                    );
                    SourceCheck {
                        source_id: source.id.clone(),
                        ok: true,
                        byte_len: Some(image.byte_len),
                        error: None,
                    }
                }
                Err(e) => {
                    log::warn!("[CAPTURE] Diagnostic: {} failed: {}", source.id, e);
                    SourceCheck {
                        source_id: source.id.clone(),
                        ok: false,
                        byte_len: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            checks.push(check);
        }
        match checks.iter().find(|c| c.ok) {
            Some(check) => inner.last_successful_source = Some(check.source_id.clone()),
            None => log::warn!("[CAPTURE] Diagnostic pass found no working source"),
        }
        inner.source_checks = checks;

        inner.state = OrchestratorState::Ready;
        log::info!(
            "[CAPTURE] Initialized in {}ms (mode {}, {} sources)",
            start.elapsed().as_millis(),
            advisor.mode(),
            inner.catalog.len()
        );
        Ok(true)
    }

    /// Re-enumerates sources and recomputes the recommendation.
    ///
    /// On failure the catalog is empty, so the orchestrator drops to
    /// `Failed` and the next call re-initializes.
    async fn refresh_catalog(&self, inner: &mut Inner) -> CaptureResult<()> {
        let result = self.rebuild_catalog(inner).await;
        if let Err(e) = &result {
            inner.state = OrchestratorState::Failed;
            inner.catalog_error = Some(e.clone());
        }
        result
    }

    async fn rebuild_catalog(&self, inner: &mut Inner) -> CaptureResult<()> {
        inner.catalog.clear();
        inner.catalog_strategy = None;

        let Some(advisor) = inner.advisor.as_ref() else {
            return Err(CaptureError::NoSuitableSource);
        };
        let baseline = primary_of(&inner.displays)
            .map(|d| advisor.optimal_frame_size(d))
            .unwrap_or(FrameSize::new(1280, 720));
        let sizes = ProbeSizes {
            baseline,
            high_res: self.config.high_res_probe,
            low_res: self.config.low_res_probe,
        };

        let outcome = match self.catalog.enumerate(sizes, &inner.displays).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Clears stale virtual sources and recommendation.
                let _ = inner.selector.recommend(&[], &inner.displays);
                return Err(e);
            }
        };
        inner.selector.recommend(&outcome.sources, &inner.displays)?;
        inner.catalog = outcome.sources;
        inner.catalog_strategy = Some(outcome.strategy);
        Ok(())
    }

    /// Initializes lazily. Still `Failed` afterwards ⇒ the catalog error.
    async fn ensure_ready(&self, inner: &mut Inner) -> CaptureResult<()> {
        if matches!(
            inner.state,
            OrchestratorState::Uninitialized | OrchestratorState::Failed
        ) {
            log::info!("[CAPTURE] Not initialized — initializing before capture");
            self.initialize_locked(inner).await?;
        }
        if inner.state == OrchestratorState::Failed {
            return Err(inner
                .catalog_error
                .clone()
                .unwrap_or(CaptureError::NoSuitableSource));
        }
        Ok(())
    }

    /// Captures the resolved source and returns the encoded image.
    pub async fn capture_screenshot(&self, options: CaptureOptions) -> CaptureResult<CapturedImage> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&mut inner).await?;

        let source = resolve_source(&inner, &options)?;
        match self.capture_source(&inner, &source).await {
            Ok(image) => {
                inner.last_successful_source = Some(source.id().to_string());
                Ok(image)
            }
            Err(CaptureError::SourceVanished { id, name }) => {
                log::warn!(
                    "[CAPTURE] Source {} ({}) vanished — refreshing catalog and retrying once",
                    id,
                    name
                );
                self.refresh_catalog(&mut inner).await?;
                let primary = inner
                    .selector
                    .recommendation()
                    .map(|r| r.primary.clone())
                    .ok_or(CaptureError::NoSuitableSource)?;
                let image = self.capture_source(&inner, &primary).await?;
                inner.last_successful_source = Some(primary.id().to_string());
                Ok(image)
            }
            Err(e) => {
                log::error!("[CAPTURE] Capture of {} failed: {}", source.id(), e);
                Err(e)
            }
        }
    }

    async fn capture_source(&self, inner: &Inner, source: &Source) -> CaptureResult<CapturedImage> {
        let encoder = inner.encoder.as_ref().ok_or(CaptureError::NoSuitableSource)?;
        let primary = inner.primary_size();
        match source {
            Source::Physical(s) => encoder.capture_physical(s, primary).await,
            Source::Virtual(v) => encoder.capture_virtual(v, primary).await,
        }
    }

    /// Probes one source by id (or name) without touching the cache.
    pub async fn test_capture(&self, source_id: &str) -> TestCaptureReport {
        let mut inner = self.inner.lock().await;

        if let Err(e) = self.ensure_ready(&mut inner).await {
            return TestCaptureReport {
                success: false,
                source_id: source_id.to_string(),
                source_name: String::new(),
                data_url: None,
                error: Some(e.to_string()),
            };
        }

        let Some(source) = inner.selector.find(source_id) else {
            return TestCaptureReport {
                success: false,
                source_id: source_id.to_string(),
                source_name: String::new(),
                data_url: None,
                error: Some(format!("unknown source '{}'", source_id)),
            };
        };

        match self.capture_source(&inner, &source).await {
            Ok(image) => TestCaptureReport {
                success: true,
                source_id: source.id().to_string(),
                source_name: source.name().to_string(),
                data_url: Some(image.data_url),
                error: None,
            },
            Err(e) => TestCaptureReport {
                success: false,
                source_id: source.id().to_string(),
                source_name: source.name().to_string(),
                data_url: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let inner = self.inner.lock().await;
        Diagnostics {
            initialized: inner.state == OrchestratorState::Ready,
            state: inner.state,
            hdr_status: inner.advisor.as_ref().map(|a| HdrStatus {
                mode: a.mode(),
                profile: a.profile().clone(),
            }),
            monitor_info: inner.displays.clone(),
            last_successful_source: inner.last_successful_source.clone(),
            recommendation: inner.selector.summary(),
            catalog_strategy: inner.catalog_strategy.clone(),
            source_count: inner.catalog.len(),
            source_checks: inner.source_checks.clone(),
        }
    }
}

/// `display_id` → `preferred_source_id` → last success → recommended primary.
fn resolve_source(inner: &Inner, options: &CaptureOptions) -> CaptureResult<Source> {
    if let Some(display_id) = options.display_id {
        match inner.selector.source_for_display(display_id) {
            Some(source) => return Ok(source),
            None => log::warn!(
                "[CAPTURE] No source for display {} — falling back",
                display_id
            ),
        }
    }

    if let Some(preferred) = options.preferred_source_id.as_deref() {
        match inner.selector.find(preferred) {
            Some(source) => return Ok(source),
            None => log::warn!(
                "[CAPTURE] Preferred source '{}' not cataloged — falling back",
                preferred
            ),
        }
    }

    if let Some(last) = inner.last_successful_source.as_deref() {
        if let Some(source) = inner.selector.find(last) {
            return Ok(source);
        }
    }

    inner
        .selector
        .recommendation()
        .map(|r| r.primary.clone())
        .ok_or(CaptureError::NoSuitableSource)
}
