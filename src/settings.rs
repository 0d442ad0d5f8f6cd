//! Per-run configuration
//!
//! Nothing is persisted; every value comes from the command line or the
//! defaults below.

use std::time::Duration;

/// Default node and timing values
pub mod defaults {
    use std::time::Duration;

    pub const MIX_SINK: &str = "record_mix";
    pub const MONITOR_SINK: &str = "monitor_mix";
    pub const MIRROR_NODE: &str = "scrcpy";

    pub const FADE_DURATION: Duration = Duration::from_millis(500);
    pub const FADE_STEPS: u32 = 20;
    pub const FADE_STEP_INTERVAL: Duration = Duration::from_millis(25);

    pub const PORT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MIRROR_NODE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
    pub const MIRROR_STARTUP: Duration = Duration::from_secs(2);
    pub const AUTO_LINK_SETTLE: Duration = Duration::from_millis(300);
}

/// How the live listening path is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorMode {
    /// mix -> dedicated monitor sink -> output; the monitor sink is faded
    #[default]
    Staged,
    /// mix -> output directly; nothing to fade without touching the recording
    Direct,
}

/// Timing of volume ramps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSettings {
    pub duration: Duration,
    /// Step count for fades across many entities
    pub steps: u32,
    /// Step length for single-entity fades
    pub step_interval: Duration,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            duration: defaults::FADE_DURATION,
            steps: defaults::FADE_STEPS,
            step_interval: defaults::FADE_STEP_INTERVAL,
        }
    }
}

/// Everything a recording session needs to know up front
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mix_sink: String,
    pub monitor_sink: String,
    pub mirror_node: String,
    /// Start the phone-mirroring tool and mix its microphone in
    pub with_mirror: bool,
    /// Mix in the physical USB capture interface
    pub with_capture: bool,
    /// Explicit capture source pattern instead of USB auto-detection
    pub capture_pattern: Option<String>,
    /// Route the mix to the default output for live listening
    pub monitor: bool,
    pub monitor_mode: MonitorMode,
    pub fade: FadeSettings,
    pub port_timeout: Duration,
    pub mirror_timeout: Duration,
    pub poll_interval: Duration,
    pub mirror_startup: Duration,
    pub auto_link_settle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mix_sink: defaults::MIX_SINK.to_string(),
            monitor_sink: defaults::MONITOR_SINK.to_string(),
            mirror_node: defaults::MIRROR_NODE.to_string(),
            with_mirror: true,
            with_capture: true,
            capture_pattern: None,
            monitor: true,
            monitor_mode: MonitorMode::Staged,
            fade: FadeSettings::default(),
            port_timeout: defaults::PORT_TIMEOUT,
            mirror_timeout: defaults::MIRROR_NODE_TIMEOUT,
            poll_interval: defaults::POLL_INTERVAL,
            mirror_startup: defaults::MIRROR_STARTUP,
            auto_link_settle: defaults::AUTO_LINK_SETTLE,
        }
    }
}

impl SessionConfig {
    /// Fast timings for driving a session against an in-memory server
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            fade: FadeSettings {
                duration: Duration::from_millis(10),
                steps: 4,
                step_interval: Duration::from_millis(5),
            },
            port_timeout: Duration::from_millis(20),
            mirror_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
            mirror_startup: Duration::ZERO,
            auto_link_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}
