//! # Per-service configuration.
//!
//! [`ServiceConfig`] holds the optional control loops a service offers and the
//! capacity of its event bus. Hosts usually deserialize it from their own
//! configuration files; every field has a default.
//!
//! # Example
//! ```
//! use mtpvisor::ServiceConfig;
//!
//! let mut cfg = ServiceConfig::default();
//! cfg.hold_loop = true;
//!
//! assert!(!cfg.pause_loop);
//! assert_eq!(cfg.bus_capacity_clamped(), 1024);
//! ```

use serde::Deserialize;

/// Configuration applied when a service is built.
///
/// ## Field semantics
/// - `pause_loop`: offer `pause`/`resume` (execute → pausing → paused → resuming)
/// - `hold_loop`: offer `hold`/`unhold` (execute/paused → holding → held → unholding)
/// - `restart`: offer `restart` from execute
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Enables the pause loop.
    pub pause_loop: bool,

    /// Enables the hold loop.
    pub hold_loop: bool,

    /// Enables the restart command.
    pub restart: bool,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl ServiceConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ServiceConfig {
    /// Default configuration:
    ///
    /// - all optional loops disabled
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            pause_loop: false,
            hold_loop: false,
            restart: false,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let cfg: ServiceConfig = serde_json::from_str(r#"{ "hold_loop": true }"#).unwrap();
        assert!(cfg.hold_loop);
        assert!(!cfg.pause_loop);
        assert_eq!(cfg.bus_capacity, 1024);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cfg = ServiceConfig {
            bus_capacity: 0,
            ..ServiceConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
