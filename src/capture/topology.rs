//! Live read of the host display list.

use super::error::{CaptureError, CaptureResult};
use super::host::DisplayProvider;
use super::model::DisplayDescriptor;
use std::sync::Arc;

/// Reads displays through a [`DisplayProvider`]. Holds no cached state;
/// every call goes back to the host.
#[derive(Clone)]
pub struct DisplayTopology {
    provider: Arc<dyn DisplayProvider>,
}

impl DisplayTopology {
    pub fn new(provider: Arc<dyn DisplayProvider>) -> Self {
        Self { provider }
    }

    pub async fn list_displays(&self) -> CaptureResult<Vec<DisplayDescriptor>> {
        let displays = self
            .provider
            .displays()
            .await
            .map_err(|e| CaptureError::TopologyUnavailable(e.to_string()))?;

        if displays.is_empty() {
            return Err(CaptureError::TopologyUnavailable(
                "host reported zero displays".into(),
            ));
        }

        let primary_id = self
            .provider
            .primary_display_id()
            .await
            .map_err(|e| CaptureError::TopologyUnavailable(e.to_string()))?;

        let primary_known = displays.iter().any(|d| d.id == primary_id);
        if !primary_known {
            log::warn!(
                "[TOPOLOGY] Primary display {} not in display list — using first display",
                primary_id
            );
        }

        Ok(displays
            .into_iter()
            .enumerate()
            .map(|(index, d)| DisplayDescriptor {
                is_primary: if primary_known {
                    d.id == primary_id
                } else {
                    index == 0
                },
                id: d.id,
                bounds: d.bounds,
                scale_factor: d.scale_factor,
                color_depth: d.color_depth,
                color_space: d.color_space,
            })
            .collect())
    }

    pub async fn primary_display(&self) -> CaptureResult<DisplayDescriptor> {
        let displays = self.list_displays().await?;
        primary_of(&displays)
            .cloned()
            .ok_or_else(|| CaptureError::TopologyUnavailable("no primary display".into()))
    }
}

/// The display flagged primary in an already-read list.
pub fn primary_of(displays: &[DisplayDescriptor]) -> Option<&DisplayDescriptor> {
    displays.iter().find(|d| d.is_primary).or(displays.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::host::{HostDisplay, HostError};
    use crate::capture::model::Rect;
    use async_trait::async_trait;

    struct FixedDisplays {
        displays: Vec<HostDisplay>,
        primary: u64,
    }

    #[async_trait]
    impl DisplayProvider for FixedDisplays {
        async fn displays(&self) -> Result<Vec<HostDisplay>, HostError> {
            Ok(self.displays.clone())
        }

        async fn primary_display_id(&self) -> Result<u64, HostError> {
            Ok(self.primary)
        }
    }

    struct BrokenDisplays;

    #[async_trait]
    impl DisplayProvider for BrokenDisplays {
        async fn displays(&self) -> Result<Vec<HostDisplay>, HostError> {
            Err(HostError::Backend("no display server".into()))
        }

        async fn primary_display_id(&self) -> Result<u64, HostError> {
            Err(HostError::Backend("no display server".into()))
        }
    }

    fn host_display(id: u64, x: i32) -> HostDisplay {
        HostDisplay {
            id,
            bounds: Rect::new(x, 0, 1920, 1080),
            scale_factor: 1.0,
            color_depth: 24,
            color_space: "srgb".into(),
        }
    }

    #[tokio::test]
    async fn marks_designated_primary() {
        let topology = DisplayTopology::new(Arc::new(FixedDisplays {
            displays: vec![host_display(7, 0), host_display(9, 1920)],
            primary: 9,
        }));
        let displays = topology.list_displays().await.unwrap();
        assert!(!displays[0].is_primary);
        assert!(displays[1].is_primary);
        assert_eq!(topology.primary_display().await.unwrap().id, 9);
    }

    #[tokio::test]
    async fn unknown_primary_falls_back_to_first() {
        let topology = DisplayTopology::new(Arc::new(FixedDisplays {
            displays: vec![host_display(7, 0), host_display(9, 1920)],
            primary: 42,
        }));
        assert_eq!(topology.primary_display().await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn host_failure_is_topology_unavailable() {
        let topology = DisplayTopology::new(Arc::new(BrokenDisplays));
        let err = topology.list_displays().await.unwrap_err();
        assert!(matches!(err, CaptureError::TopologyUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_display_list_is_topology_unavailable() {
        let topology = DisplayTopology::new(Arc::new(FixedDisplays {
            displays: vec![],
            primary: 0,
        }));
        assert!(matches!(
            topology.list_displays().await,
            Err(CaptureError::TopologyUnavailable(_))
        ));
    }
}
