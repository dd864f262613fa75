//! Off-thread free-space search.
//!
//! The worker boundary is a minimal serialized projection of node geometry
//! ([`GeometryRecord`]) plus the anchor and size of the node being placed. The
//! worker returns a single center position. On native targets the search runs
//! on tokio's blocking pool under a wall-clock timeout; in the browser a Web
//! Worker calls the exported `locate_free_space` wasm function, which runs the
//! identical algorithm through [`LocateRequest::solve`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::free_space::{LocatorConfig, find_free_position, grid_slot};
use super::{Point, Rect, Size};
use crate::graph::NodeId;

/// Geometry of one existing node, centered at `(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryRecord {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl GeometryRecord {
    pub fn rect(&self) -> Rect {
        Rect::centered(Point { x: self.x, y: self.y }, Size { w: self.width, h: self.height })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateRequest {
    pub anchor: Point,
    pub size: Size,
    pub occupied: Vec<GeometryRecord>,
    #[serde(default)]
    pub config: LocatorConfig,
}

impl LocateRequest {
    /// Run the search in-process.
    pub fn solve(&self) -> Point {
        let rects: Vec<Rect> = self.occupied.iter().map(GeometryRecord::rect).collect();
        find_free_position(self.anchor, self.size, &rects, &self.config)
    }

    /// Whether this request is large enough to be worth offloading.
    pub fn should_offload(&self) -> bool {
        self.occupied.len() >= self.config.offload_threshold
    }

    /// Degraded placement used when the offloaded search does not answer.
    pub fn fallback(&self) -> Point {
        grid_slot(self.anchor, self.occupied.len(), &self.config)
    }
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("free-space search timed out after {0} ms")]
    Timeout(u64),
    #[error("free-space worker failed: {0}")]
    WorkerFailed(String),
    #[error("no async runtime available for offloading")]
    Unavailable,
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::time::Duration;

    use tracing::{debug, warn};

    use super::{LocateError, LocateRequest};
    use crate::layout::Point;

    /// Run the search on the blocking pool, bounded by `timeout`.
    pub async fn locate_offloaded(request: LocateRequest, timeout: Duration) -> Result<Point, LocateError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(LocateError::Unavailable);
        }
        let job = tokio::task::spawn_blocking(move || request.solve());
        match tokio::time::timeout(timeout, job).await {
            Ok(Ok(point)) => Ok(point),
            Ok(Err(e)) => Err(LocateError::WorkerFailed(e.to_string())),
            Err(_) => Err(LocateError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Place a node, offloading large requests. Never fails: small requests run
    /// in-process, and a failed or slow offload degrades to a grid slot.
    pub async fn locate_or_fallback(request: LocateRequest) -> Point {
        if !request.should_offload() {
            return request.solve();
        }
        let timeout = Duration::from_millis(request.config.offload_timeout_ms);
        let fallback = request.fallback();
        match locate_offloaded(request.clone(), timeout).await {
            Ok(point) => {
                debug!(occupied = request.occupied.len(), "offloaded free-space search finished");
                point
            }
            Err(LocateError::Unavailable) => request.solve(),
            Err(e) => {
                warn!(error = %e, "offloaded free-space search failed, using grid slot");
                fallback
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{locate_offloaded, locate_or_fallback};

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(not(target_arch = "wasm32"))]
    use std::time::Duration;

    fn request_with(count: usize, threshold: usize) -> LocateRequest {
        let occupied = (0..count)
            .map(|i| GeometryRecord {
                id: NodeId::from_u128(i as u128 + 1),
                parent_id: None,
                x: (i % 10) as f64 * 300.0,
                y: (i / 10) as f64 * 200.0,
                width: 200.0,
                height: 100.0,
            })
            .collect();
        LocateRequest {
            anchor: Point::ORIGIN,
            size: Size { w: 200.0, h: 100.0 },
            occupied,
            config: LocatorConfig { offload_threshold: threshold, ..LocatorConfig::default() },
        }
    }

    #[test]
    fn test_request_json_contract() {
        let json = r#"{
            "anchor": {"x": 0, "y": 0},
            "size": {"w": 100, "h": 50},
            "occupied": [{"id": "00000000-0000-0000-0000-000000000001", "parentId": null,
                          "x": 0, "y": 0, "width": 100, "height": 50}]
        }"#;
        let req: LocateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.config, LocatorConfig::default());
        let p = req.solve();
        assert!(!Rect::centered(p, req.size).overlaps(&req.occupied[0].rect()));
    }

    #[test]
    fn test_should_offload_threshold() {
        assert!(!request_with(3, 40).should_offload());
        assert!(request_with(40, 40).should_offload());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_offloaded_matches_in_process() {
        let req = request_with(50, 10);
        let expected = req.solve();
        let got = locate_offloaded(req, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got, expected);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_locate_or_fallback_small_request_runs_inline() {
        let req = request_with(2, 40);
        let expected = req.solve();
        assert_eq!(locate_or_fallback(req).await, expected);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_timed_out_offload_uses_grid_slot() {
        // One wall covering the whole search area: the search walks every radius.
        let wall = GeometryRecord {
            id: NodeId::from_u128(1),
            parent_id: None,
            x: 0.0,
            y: 0.0,
            width: 100_000.0,
            height: 100_000.0,
        };
        let req = LocateRequest {
            anchor: Point::new(2000.0, 15000.0),
            size: Size { w: 200.0, h: 100.0 },
            occupied: vec![wall],
            config: LocatorConfig {
                offload_threshold: 1,
                offload_timeout_ms: 0,
                max_radius: 20_000.0,
                radius_step: 2.0,
                ..LocatorConfig::default()
            },
        };
        assert!(req.should_offload());
        let expected = req.fallback();

        let err = locate_offloaded(req.clone(), Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LocateError::Timeout(0)));
        assert_eq!(locate_or_fallback(req).await, expected);
    }
}
