//! Error taxonomy surfaced by the capture pipeline.

use super::host::HostError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("Display topology unavailable: {0}")]
    TopologyUnavailable(String),

    #[error("No capture sources available ({attempts} enumeration strategies tried)")]
    NoSourcesAvailable { attempts: usize },

    #[error("Capture source '{id}' ({name}) no longer present")]
    SourceVanished { id: String, name: String },

    #[error("Captured frame for '{0}' is empty")]
    EmptyFrame(String),

    #[error("All {tiers} encoding tiers failed or produced undersized output")]
    EncodingExhausted { tiers: usize },

    #[error("No suitable capture source found")]
    NoSuitableSource,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Capture task failed: {0}")]
    Task(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
