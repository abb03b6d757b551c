//! Tunables consumed by the control point.

use std::time::Duration;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_VOLUME_QUIET_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_INSTANCE_ID: &str = "0";
pub const DEFAULT_ROOT_ID: &str = "0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlConfig {
    /// Quiet period before a burst of pushed properties is published.
    pub debounce_quiet_period: Duration,
    /// Quiet period applied to volume slider input.
    pub volume_quiet_period: Duration,
    /// Write the requested volume locally once the device accepted it.
    pub optimistic_volume: bool,
    /// Instance used when a device is selected without one.
    pub default_instance_id: String,
    /// Container id of a content directory's root.
    pub root_id: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            debounce_quiet_period: DEFAULT_QUIET_PERIOD,
            volume_quiet_period: DEFAULT_VOLUME_QUIET_PERIOD,
            optimistic_volume: true,
            default_instance_id: DEFAULT_INSTANCE_ID.to_string(),
            root_id: DEFAULT_ROOT_ID.to_string(),
        }
    }
}

impl ControlConfig {
    #[cfg(feature = "hkconfig")]
    pub fn from_config(config: &hkconfig::Config) -> Self {
        Self {
            debounce_quiet_period: Duration::from_millis(
                config
                    .get_renderer_debounce_ms()
                    .unwrap_or(hkconfig::DEFAULT_DEBOUNCE_MS),
            ),
            volume_quiet_period: Duration::from_millis(
                config
                    .get_volume_debounce_ms()
                    .unwrap_or(hkconfig::DEFAULT_VOLUME_DEBOUNCE_MS),
            ),
            optimistic_volume: config
                .get_optimistic_volume()
                .unwrap_or(hkconfig::DEFAULT_OPTIMISTIC_VOLUME),
            default_instance_id: config.get_default_instance_id(),
            root_id: config.get_browser_root_id(),
        }
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.debounce_quiet_period = quiet_period;
        self
    }

    pub fn with_volume_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.volume_quiet_period = quiet_period;
        self
    }

    pub fn with_optimistic_volume(mut self, enabled: bool) -> Self {
        self.optimistic_volume = enabled;
        self
    }
}
