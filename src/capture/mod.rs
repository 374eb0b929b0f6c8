//! Screen capture domain: public API.
//!
//! This module owns source enumeration, source selection, colour
//! compatibility and encoding. The embedding application talks to
//! [`ScreenshotOrchestrator`]; backends plug in through the traits in
//! [`host`].

pub mod catalog;
pub mod compat;
pub mod encode;
pub mod encoder;
pub mod error;
pub mod host;
pub mod model;
pub mod orchestrator;
pub mod region;
pub mod selector;
pub mod topology;
#[cfg(feature = "desktop")]
pub mod xcap_host;

pub use compat::{CompatibilityMode, CompatibilityProfile, LaunchFlags};
pub use error::{CaptureError, CaptureResult};
pub use model::{CaptureSource, CapturedImage, CropRect, DisplayDescriptor, Source, VirtualSource};
pub use orchestrator::{
    CaptureOptions, Diagnostics, ScreenshotOrchestrator, SourceCheck, TestCaptureReport,
};
pub use region::captured_to_png_bytes;
#[cfg(feature = "desktop")]
pub use xcap_host::XcapHost;
