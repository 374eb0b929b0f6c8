//! Integration tests for the capture pipeline.
//!
//! Drives the public API end to end against an in-memory host: display
//! topology, compatibility mode, strategy probing, selection, fallback
//! encoding and the orchestrator's resolution order.

use async_trait::async_trait;
use chatshot_lib::capture::catalog::{run_strategies, EnumerationStrategy};
use chatshot_lib::capture::compat::{derive_mode, optimal_frame_size};
use chatshot_lib::capture::encode::{EncodeError, EncodedFrame, FallbackChain, FrameEncoder, Tier};
use chatshot_lib::capture::host::{
    DisplayProvider, HostDisplay, HostError, RawSource, SourceProvider, SourceRequest,
};
use chatshot_lib::capture::model::{CaptureFrame, FrameSize, Rect, SourceKind};
use chatshot_lib::capture::selector::{MatchKind, SourceSelector};
use chatshot_lib::capture::{
    CaptureError, CaptureOptions, CaptureSource, CompatibilityMode, DisplayDescriptor,
    ScreenshotOrchestrator, Source,
};
use chatshot_lib::config::CaptureConfig;
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

// ── Fake host ───────────────────────────────────────────────────────

struct FakeHost {
    displays: Vec<HostDisplay>,
    primary: u64,
    sources: Vec<(&'static str, &'static str, Option<&'static str>)>,
    requests: Mutex<Vec<SourceRequest>>,
}

impl FakeHost {
    fn new(
        displays: Vec<HostDisplay>,
        sources: Vec<(&'static str, &'static str, Option<&'static str>)>,
    ) -> Arc<Self> {
        let primary = displays.first().map_or(0, |d| d.id);
        Arc::new(Self {
            displays,
            primary,
            sources,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DisplayProvider for FakeHost {
    async fn displays(&self) -> Result<Vec<HostDisplay>, HostError> {
        Ok(self.displays.clone())
    }

    async fn primary_display_id(&self) -> Result<u64, HostError> {
        Ok(self.primary)
    }
}

#[async_trait]
impl SourceProvider for FakeHost {
    async fn get_sources(&self, request: &SourceRequest) -> Result<Vec<RawSource>, HostError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .sources
            .iter()
            .map(|(id, name, display)| RawSource {
                id: id.to_string(),
                name: name.to_string(),
                display_id: display.map(String::from),
                kind: SourceKind::Screen,
                frame: textured_frame(200, 120),
            })
            .collect())
    }
}

fn textured_frame(w: u32, h: u32) -> CaptureFrame {
    CaptureFrame::new(RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 5) as u8, (y * 3) as u8, ((x * y) % 251) as u8, 255])
    }))
}

fn host_display(id: u64, bounds: Rect, depth: u32, space: &str) -> HostDisplay {
    HostDisplay {
        id,
        bounds,
        scale_factor: 1.0,
        color_depth: depth,
        color_space: space.to_string(),
    }
}

fn descriptor(id: u64, bounds: Rect, depth: u32, space: &str, scale: f64) -> DisplayDescriptor {
    DisplayDescriptor {
        id,
        bounds,
        scale_factor: scale,
        color_depth: depth,
        color_space: space.to_string(),
        is_primary: id == 1,
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn two_display_entire_screen_scenario() {
    let host = FakeHost::new(
        vec![
            host_display(1, Rect::new(0, 0, 1920, 1080), 24, "srgb"),
            host_display(2, Rect::new(1920, 0, 2560, 1440), 24, "srgb"),
        ],
        vec![("screen:0:0", "Entire screen", Some("not-a-number"))],
    );
    let orch = ScreenshotOrchestrator::with_host(host.clone(), CaptureConfig::default());
    assert!(orch.initialize().await.unwrap());
    assert_eq!(orch.mode().await, Some(CompatibilityMode::Standard));

    let diag = orch.diagnostics().await;
    let rec = diag.recommendation.expect("recommendation");
    assert_eq!(rec.match_kind, MatchKind::EntireScreen);
    assert_eq!(rec.primary_id, "screen:0:0");
    assert_eq!(rec.virtual_sources.len(), 2);

    let a = rec.virtual_sources[0].crop_rect;
    let b = rec.virtual_sources[1].crop_rect;
    assert!((a.x).abs() < 1e-9 && (a.y).abs() < 1e-9);
    assert!((a.width - 0.4286).abs() < 1e-4);
    assert!((b.x - 0.4286).abs() < 1e-4);
    assert!((b.width - 0.5714).abs() < 1e-4);
    assert!((b.height - 1.0).abs() < 1e-9);
    // Tiles meet with no gap.
    assert!((a.x + a.width - b.x).abs() < 1e-12);
}

#[test]
fn ten_bit_display_p3_scenario() {
    let d = descriptor(1, Rect::new(0, 0, 1512, 982), 30, "Display-P3 (10-bit)", 2.0);
    let report = derive_mode(std::slice::from_ref(&d));
    assert_eq!(report.mode, CompatibilityMode::HdrSafe);

    let size = optimal_frame_size(report.mode, &d);
    assert!(size.width <= 800 && size.height <= 600);
    assert!(size.width <= (800.0 / d.scale_factor) as u32);
}

// ── Properties ──────────────────────────────────────────────────────

#[test]
fn boring_displays_never_hdr_safe() {
    let sizes = [(1280, 720), (1366, 768), (1920, 1080), (2560, 1080), (1920, 1200)];
    for (w, h) in sizes {
        for scale in [1.0, 1.25, 1.33] {
            let report = derive_mode(&[descriptor(1, Rect::new(0, 0, w, h), 24, "srgb", scale)]);
            assert_ne!(
                report.mode,
                CompatibilityMode::HdrSafe,
                "{}x{} @{}",
                w,
                h,
                scale
            );
        }
    }
}

struct Counted(usize);

#[async_trait]
impl EnumerationStrategy for Counted {
    fn name(&self) -> String {
        format!("counted-{}", self.0)
    }

    async fn probe(
        &self,
        _: &dyn SourceProvider,
    ) -> Result<Vec<CaptureSource>, CaptureError> {
        Ok((0..self.0)
            .map(|i| CaptureSource {
                id: format!("screen:{}:0", i),
                name: format!("Screen {}", i + 1),
                display_id: Some(i as u64),
                kind: SourceKind::Screen,
                frame: CaptureFrame::empty(),
            })
            .collect())
    }
}

#[tokio::test]
async fn strategy_selection_prefers_earliest_maximum() {
    let host = FakeHost::new(vec![], vec![]);
    let strategies: Vec<Box<dyn EnumerationStrategy>> = [3, 5, 2, 5, 1]
        .into_iter()
        .map(|n| Box::new(Counted(n)) as Box<dyn EnumerationStrategy>)
        .collect();
    let outcome = run_strategies(host.as_ref(), &strategies).await.unwrap();
    assert_eq!(outcome.index, 1);
    assert_eq!(outcome.score, 5);
}

#[test]
fn exact_match_beats_entire_screen_name() {
    let displays = vec![
        descriptor(1, Rect::new(0, 0, 1920, 1080), 24, "srgb", 1.0),
        descriptor(2, Rect::new(1920, 0, 1920, 1080), 24, "srgb", 1.0),
    ];
    let sources = vec![
        CaptureSource {
            id: "screen:all:0".into(),
            name: "Entire Screen".into(),
            display_id: None,
            kind: SourceKind::Screen,
            frame: CaptureFrame::empty(),
        },
        CaptureSource {
            id: "screen:1:0".into(),
            name: "Screen 1".into(),
            display_id: Some(1),
            kind: SourceKind::Screen,
            frame: CaptureFrame::empty(),
        },
    ];
    let mut selector = SourceSelector::new();
    let rec = selector.recommend(&sources, &displays).unwrap();
    assert!(matches!(&rec.primary, Source::Physical(s) if s.id == "screen:1:0"));
    assert!(selector.virtual_sources().is_empty());
}

struct Scripted(Option<usize>, &'static str);

impl FrameEncoder for Scripted {
    fn label(&self) -> String {
        self.1.to_string()
    }

    fn encode(&self, _: &CaptureFrame) -> Result<EncodedFrame, EncodeError> {
        self.0
            .map(|n| EncodedFrame {
                mime: "image/jpeg",
                bytes: vec![7u8; n],
            })
            .ok_or(EncodeError::Codec {
                format: "PNG",
                message: "HDR surface unsupported".into(),
            })
    }
}

#[test]
fn fallback_chain_discards_tiny_intermediate() {
    let chain = FallbackChain::new(
        vec![
            Tier {
                encoder: Arc::new(Scripted(None, "png")),
                min_bytes: 1000,
            },
            Tier {
                encoder: Arc::new(Scripted(Some(200), "jpeg-q90")),
                min_bytes: 500,
            },
            Tier {
                encoder: Arc::new(Scripted(Some(600), "jpeg-q50")),
                min_bytes: 500,
            },
        ],
        500,
    );
    let out = chain.run(&CaptureFrame::empty()).unwrap();
    assert_eq!(out.label, "jpeg-q50");
    assert_eq!(out.frame.bytes.len(), 600);
}

#[tokio::test]
async fn reinitialize_yields_same_mode_and_primary() {
    let host = FakeHost::new(
        vec![
            host_display(1, Rect::new(0, 0, 1920, 1080), 24, "srgb"),
            host_display(2, Rect::new(0, 1080, 1920, 1080), 30, "rec2020"),
        ],
        vec![
            ("screen:1:0", "Screen 1", Some("1")),
            ("screen:2:0", "Screen 2", Some("2")),
        ],
    );
    let orch = ScreenshotOrchestrator::with_host(host, CaptureConfig::default());

    orch.initialize().await.unwrap();
    let first = orch.diagnostics().await;
    orch.initialize().await.unwrap();
    let second = orch.diagnostics().await;

    assert_eq!(orch.mode().await, Some(CompatibilityMode::HdrSafe));
    assert_eq!(
        first.hdr_status.map(|h| h.mode),
        second.hdr_status.map(|h| h.mode)
    );
    assert_eq!(
        first.recommendation.map(|r| r.primary_id),
        second.recommendation.map(|r| r.primary_id)
    );
}

// ── Orchestrator ────────────────────────────────────────────────────

#[tokio::test]
async fn capture_requests_double_primary_resolution() {
    let host = FakeHost::new(
        vec![host_display(1, Rect::new(0, 0, 2560, 1440), 24, "srgb")],
        vec![("screen:1:0", "Screen 1", Some("1"))],
    );
    let orch = ScreenshotOrchestrator::with_host(host.clone(), CaptureConfig::default());
    let image = orch.capture_screenshot(CaptureOptions::default()).await.unwrap();
    assert!(image.byte_len >= 500);

    let requests = host.requests.lock().unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.frame_size, FrameSize::new(5120, 2880));
}

#[tokio::test]
async fn unknown_display_falls_back_to_recommended_primary() {
    let host = FakeHost::new(
        vec![host_display(1, Rect::new(0, 0, 1920, 1080), 24, "srgb")],
        vec![("screen:1:0", "Screen 1", Some("1"))],
    );
    let orch = ScreenshotOrchestrator::with_host(host, CaptureConfig::default());
    let image = orch
        .capture_screenshot(CaptureOptions {
            display_id: Some(99),
            preferred_source_id: None,
        })
        .await
        .unwrap();
    assert_eq!(image.source_id, "screen:1:0");
}

#[tokio::test]
async fn forced_mode_from_config_shows_in_diagnostics() {
    let host = FakeHost::new(
        vec![host_display(1, Rect::new(0, 0, 1920, 1080), 24, "srgb")],
        vec![("screen:1:0", "Screen 1", Some("1"))],
    );
    let config = CaptureConfig {
        force_mode: Some(CompatibilityMode::Safe),
        ..CaptureConfig::default()
    };
    let orch = ScreenshotOrchestrator::with_host(host.clone(), config);
    orch.initialize().await.unwrap();

    let status = orch.diagnostics().await.hdr_status.unwrap();
    assert_eq!(status.mode, CompatibilityMode::Safe);
    assert!(status.profile.report.forced);
    assert!(status
        .profile
        .launch_flags
        .to_args()
        .contains(&"--disable-gpu".to_string()));

    // Safe mode probes the baseline at 640×480.
    let requests = host.requests.lock().unwrap();
    assert_eq!(requests[0].frame_size, FrameSize::new(640, 480));
}

#[tokio::test]
async fn launch_profile_without_displays_is_safe() {
    let host = FakeHost::new(vec![host_display(1, Rect::new(0, 0, 0, 0), 24, "srgb")], vec![]);
    let profile = chatshot_lib::launch_profile(host, &CaptureConfig::default()).await;
    assert_eq!(profile.mode(), CompatibilityMode::Safe);
}
