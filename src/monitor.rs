//! Live monitoring on/off
//!
//! Turning monitoring on connects the monitor path to the default output
//! and fades it in. Turning it off fades it out first and only then removes
//! the monitor links, otherwise the cut is audible.

use crate::fade::FadeEngine;
use crate::models::{MonitoringState, Percent, VolumeTarget};
use crate::routing::Router;
use crate::settings::MonitorMode;
use log::{info, warn};

/// The route from the mix to the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPath {
    /// Node whose outputs feed the default output
    pub node: String,
    /// Volume faded when toggling
    pub volume: VolumeTarget,
    pub mode: MonitorMode,
}

impl MonitorPath {
    /// mix -> monitor sink -> output, fading the monitor sink
    pub fn staged(monitor_sink: &str) -> Self {
        Self {
            node: monitor_sink.to_string(),
            volume: VolumeTarget::Sink(monitor_sink.to_string()),
            mode: MonitorMode::Staged,
        }
    }

    /// mix -> output. The mix sink is only held at full volume while links
    /// settle, so the recording is not faded along with the monitor.
    pub fn direct(mix_sink: &str) -> Self {
        Self {
            node: mix_sink.to_string(),
            volume: VolumeTarget::Sink(mix_sink.to_string()),
            mode: MonitorMode::Direct,
        }
    }

    /// (silent, audible) levels of the faded volume
    fn levels(&self) -> (Percent, Percent) {
        match self.mode {
            MonitorMode::Staged => (Percent::MUTE, Percent::FULL),
            MonitorMode::Direct => (Percent::FULL, Percent::FULL),
        }
    }
}

#[derive(Debug, Default)]
pub struct Monitoring {
    state: MonitoringState,
    path: Option<MonitorPath>,
    output: Option<String>,
}

impl Monitoring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, path: MonitorPath, output: Option<String>) {
        self.path = Some(path);
        self.output = output;
    }

    /// Forget the configuration. Does not touch the graph.
    pub fn reset(&mut self) {
        self.state = MonitoringState::Disabled;
        self.path = None;
        self.output = None;
    }

    pub fn state(&self) -> MonitoringState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == MonitoringState::Enabled
    }

    pub fn path(&self) -> Option<&MonitorPath> {
        self.path.as_ref()
    }

    pub fn enable(&mut self, router: &mut Router, fades: &FadeEngine) -> MonitoringState {
        if self.is_enabled() {
            return self.state;
        }
        let (Some(path), Some(output)) = (&self.path, &self.output) else {
            warn!("No monitor path or default output configured");
            return self.state;
        };

        info!("Enabling monitor: {} -> {}", path.node, output);
        let (silent, audible) = path.levels();
        if path.mode == MonitorMode::Staged {
            fades.set(&path.volume, silent);
        }

        if let Err(e) = router.connect_nodes(&path.node, output, true) {
            warn!("Could not connect monitor path: {}", e);
            return self.state;
        }

        fades.ramp_one(&path.volume, silent, audible, fades.settings().duration);
        self.state = MonitoringState::Enabled;
        self.state
    }

    pub fn disable(&mut self, router: &mut Router, fades: &FadeEngine) -> MonitoringState {
        if !self.is_enabled() {
            return self.state;
        }
        let Some(path) = &self.path else {
            self.state = MonitoringState::Disabled;
            return self.state;
        };

        info!("Disabling monitor");
        let (silent, audible) = path.levels();
        fades.ramp_one(&path.volume, audible, silent, fades.settings().duration);

        self.release(router)
    }

    /// Remove the monitor links without fading. The caller must have
    /// silenced the path already.
    pub fn release(&mut self, router: &mut Router) -> MonitoringState {
        if !self.is_enabled() {
            return self.state;
        }
        if let Some(path) = &self.path {
            let node = path.node.as_str();
            let output = self.output.as_deref();
            let removed = router.ledger_mut().disconnect_matching(|link| {
                link.is_monitor_link
                    && link.output.matches(node)
                    && output.map_or(true, |out| link.input.matches(out))
            });
            info!("Removed {} monitor links", removed);
        }

        self.state = MonitoringState::Disabled;
        self.state
    }

    /// Whether fading the monitor path would also fade the recording
    pub fn shares_mix(&self) -> bool {
        self.path
            .as_ref()
            .is_some_and(|path| path.mode == MonitorMode::Direct)
    }

    /// Flip monitoring and return the resulting state
    pub fn toggle(&mut self, router: &mut Router, fades: &FadeEngine) -> MonitoringState {
        match self.state {
            MonitoringState::Enabled => self.disable(router, fades),
            MonitoringState::Disabled => self.enable(router, fades),
        }
    }
}
