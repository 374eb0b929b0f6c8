//! Picks the source for the target display.
//!
//! Priority, first match wins:
//! 1. a source associated with the primary display,
//! 2. an "entire screen" source, split into one virtual source per display,
//! 3. the first cataloged source.

use super::error::{CaptureError, CaptureResult};
use super::model::{CaptureSource, CropRect, DisplayDescriptor, Rect, Source, VirtualSource};
use super::topology::primary_of;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Source names that mean "all displays in one frame", across UI languages.
static ENTIRE_SCREEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)entire|whole|all|complete|full|gesamter|gesamt").unwrap()
});

pub const BEST_EFFORT_REASON: &str = "no exact or entire-screen match; using best-effort";

/// How the primary source was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    ExactDisplay,
    EntireScreen,
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub primary: Source,
    pub alternatives: Vec<Source>,
    pub match_kind: MatchKind,
    pub reasoning: String,
}

/// Serializable view of a recommendation for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSummary {
    pub primary_id: String,
    pub primary_name: String,
    pub primary_kind: &'static str,
    pub match_kind: MatchKind,
    pub reasoning: String,
    pub alternative_ids: Vec<String>,
    pub virtual_sources: Vec<VirtualSource>,
}

pub fn is_entire_screen_name(name: &str) -> bool {
    ENTIRE_SCREEN_PATTERN.is_match(name)
}

/// One virtual source per display, cropped out of `combined`.
///
/// Crop rects are the display bounds normalized against the bounding box of
/// all displays.
pub fn synthesize_virtual_sources(
    combined: &CaptureSource,
    displays: &[DisplayDescriptor],
) -> Vec<VirtualSource> {
    let Some(union) = Rect::bounding_box(displays.iter().map(|d| &d.bounds)) else {
        return Vec::new();
    };
    if union.width == 0 || union.height == 0 {
        return Vec::new();
    }

    displays
        .iter()
        .enumerate()
        .map(|(index, display)| VirtualSource {
            id: format!("virtual:{}:{}", combined.id, display.id),
            name: format!("{} (Display {})", combined.name, index + 1),
            original_source_id: combined.id.clone(),
            original_source_name: combined.name.clone(),
            crop_rect: CropRect::normalized(&display.bounds, &union),
            target_display_id: display.id,
            display_bounds: display.bounds,
        })
        .collect()
}

/// Holds the sources of the last recommendation pass for per-display lookup.
#[derive(Debug, Default, Clone)]
pub struct SourceSelector {
    physical: Vec<CaptureSource>,
    virtual_sources: Vec<VirtualSource>,
    last: Option<Recommendation>,
}

impl SourceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranks `sources` for the topology's primary display. Replaces any
    /// virtual sources from an earlier pass.
    pub fn recommend(
        &mut self,
        sources: &[CaptureSource],
        displays: &[DisplayDescriptor],
    ) -> CaptureResult<Recommendation> {
        self.physical = sources.to_vec();
        self.virtual_sources.clear();
        self.last = None;

        if sources.is_empty() {
            return Err(CaptureError::NoSuitableSource);
        }

        let recommendation = if let Some(exact) = primary_of(displays)
            .and_then(|primary| sources.iter().find(|s| s.display_id == Some(primary.id)))
        {
            Recommendation {
                primary: Source::Physical(exact.clone()),
                alternatives: others(sources, &exact.id),
                match_kind: MatchKind::ExactDisplay,
                reasoning: format!(
                    "source '{}' is associated with the primary display",
                    exact.name
                ),
            }
        } else if let Some((combined, reason)) = entire_screen_source(sources, displays) {
            self.virtual_sources = synthesize_virtual_sources(combined, displays);
            let mut alternatives: Vec<Source> = self
                .virtual_sources
                .iter()
                .cloned()
                .map(Source::Virtual)
                .collect();
            alternatives.extend(others(sources, &combined.id));
            Recommendation {
                primary: Source::Physical(combined.clone()),
                alternatives,
                match_kind: MatchKind::EntireScreen,
                reasoning: format!(
                    "source '{}' {}; {} virtual sources",
                    combined.name,
                    reason,
                    self.virtual_sources.len()
                ),
            }
        } else {
            let first = &sources[0];
            Recommendation {
                primary: Source::Physical(first.clone()),
                alternatives: others(sources, &first.id),
                match_kind: MatchKind::BestEffort,
                reasoning: BEST_EFFORT_REASON.to_string(),
            }
        };

        log::info!(
            "[SELECT] Primary source {} ({:?}): {}",
            recommendation.primary.id(),
            recommendation.match_kind,
            recommendation.reasoning
        );

        self.last = Some(recommendation.clone());
        Ok(recommendation)
    }

    /// The last recommendation, if a pass succeeded.
    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.last.as_ref()
    }

    /// Virtual sources are checked first, then physical sources.
    pub fn source_for_display(&self, display_id: u64) -> Option<Source> {
        if let Some(v) = self
            .virtual_sources
            .iter()
            .find(|v| v.target_display_id == display_id)
        {
            return Some(Source::Virtual(v.clone()));
        }
        self.physical
            .iter()
            .find(|s| s.display_id == Some(display_id))
            .cloned()
            .map(Source::Physical)
    }

    /// Looks a source up by id, then by name, across physical and virtual sources.
    pub fn find(&self, id_or_name: &str) -> Option<Source> {
        let by_id = self
            .virtual_sources
            .iter()
            .find(|v| v.id == id_or_name)
            .cloned()
            .map(Source::Virtual)
            .or_else(|| {
                self.physical
                    .iter()
                    .find(|s| s.id == id_or_name)
                    .cloned()
                    .map(Source::Physical)
            });

        by_id.or_else(|| {
            self.physical
                .iter()
                .find(|s| s.name == id_or_name)
                .cloned()
                .map(Source::Physical)
                .or_else(|| {
                    self.virtual_sources
                        .iter()
                        .find(|v| v.name == id_or_name)
                        .cloned()
                        .map(Source::Virtual)
                })
        })
    }

    pub fn virtual_sources(&self) -> &[VirtualSource] {
        &self.virtual_sources
    }

    pub fn summary(&self) -> Option<RecommendationSummary> {
        let rec = self.last.as_ref()?;
        Some(RecommendationSummary {
            primary_id: rec.primary.id().to_string(),
            primary_name: rec.primary.name().to_string(),
            primary_kind: rec.primary.kind_label(),
            match_kind: rec.match_kind,
            reasoning: rec.reasoning.clone(),
            alternative_ids: rec.alternatives.iter().map(|s| s.id().to_string()).collect(),
            virtual_sources: self.virtual_sources.clone(),
        })
    }
}

fn others(sources: &[CaptureSource], exclude: &str) -> Vec<Source> {
    sources
        .iter()
        .filter(|s| s.id != exclude)
        .cloned()
        .map(Source::Physical)
        .collect()
}

/// First source named like a whole-desktop capture, or the lone source when
/// there are several displays.
fn entire_screen_source<'a>(
    sources: &'a [CaptureSource],
    displays: &[DisplayDescriptor],
) -> Option<(&'a CaptureSource, &'static str)> {
    if let Some(named) = sources.iter().find(|s| is_entire_screen_name(&s.name)) {
        return Some((named, "is named as an entire-screen capture"));
    }
    if sources.len() == 1 && displays.len() > 1 {
        return Some((&sources[0], "is the only source across multiple displays"));
    }
    None
}
