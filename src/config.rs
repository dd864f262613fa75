//! Tuning constants for the canvas views, gathered in one deserializable
//! aggregate so the host can override any subset with partial JSON.

use serde::{Deserialize, Serialize};

use crate::layout::{
    CollisionConfig, DebounceConfig, LocatorConfig, RadialConfig, SimulationConfig, Size, DEFAULT_NODE_SIZE,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub locator: LocatorConfig,
    pub simulation: SimulationConfig,
    pub collision: CollisionConfig,
    pub debounce: DebounceConfig,
    pub radial: RadialConfig,
    /// Body size assumed until a view reports real geometry.
    pub default_node_size: Size,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            locator: LocatorConfig::default(),
            simulation: SimulationConfig::default(),
            collision: CollisionConfig::default(),
            debounce: DebounceConfig::default(),
            radial: RadialConfig::default(),
            default_node_size: DEFAULT_NODE_SIZE,
        }
    }
}

impl EditorConfig {
    /// Parse a partial JSON override. An empty string gives the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let cfg = EditorConfig::from_json(r#"{"collision":{"margin":24},"simulation":{"maxTicks":50}}"#).unwrap();
        assert_eq!(cfg.collision.margin, 24.0);
        assert_eq!(cfg.collision.settle_steps, CollisionConfig::default().settle_steps);
        assert_eq!(cfg.simulation.max_ticks, 50);
        assert_eq!(cfg.locator, LocatorConfig::default());
        assert_eq!(cfg.default_node_size, DEFAULT_NODE_SIZE);
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(EditorConfig::from_json("  ").unwrap(), EditorConfig::default());
        assert!(EditorConfig::from_json("{").is_err());
    }
}
