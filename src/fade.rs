//! Stepwise linear volume ramps
//!
//! Ramps block the calling thread: each step sets every target's volume and
//! then sleeps. A failed volume change on one target does not stop the ramp.

use crate::models::{Percent, VolumeTarget};
use crate::server::AudioServer;
use crate::settings::FadeSettings;
use log::{debug, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct FadeEngine {
    server: Arc<dyn AudioServer>,
    settings: FadeSettings,
}

impl FadeEngine {
    pub fn new(server: Arc<dyn AudioServer>, settings: FadeSettings) -> Self {
        Self { server, settings }
    }

    pub fn settings(&self) -> FadeSettings {
        self.settings
    }

    /// Set a volume immediately. Returns false if the server refused.
    pub fn set(&self, target: &VolumeTarget, volume: Percent) -> bool {
        match self.server.set_volume(target, volume) {
            Ok(()) => true,
            Err(e) => {
                debug!("Failed to set {} to {}: {}", target.name(), volume, e);
                false
            }
        }
    }

    /// Ramp many targets together over the configured number of steps.
    ///
    /// Returns the number of volume changes that failed.
    pub fn ramp_all(
        &self,
        targets: &[VolumeTarget],
        from: Percent,
        to: Percent,
        duration: Duration,
    ) -> usize {
        self.ramp(targets, from, to, duration, self.settings.steps)
    }

    /// Ramp a single target in fixed-length steps
    pub fn ramp_one(
        &self,
        target: &VolumeTarget,
        from: Percent,
        to: Percent,
        duration: Duration,
    ) -> usize {
        let interval = self.settings.step_interval.max(Duration::from_millis(1));
        let steps = (duration.as_nanos() / interval.as_nanos()).min(u32::MAX as u128) as u32;
        self.ramp(std::slice::from_ref(target), from, to, duration, steps)
    }

    /// Fade everything in from silence using the configured duration
    pub fn fade_in(&self, targets: &[VolumeTarget]) -> usize {
        self.ramp_all(targets, Percent::MUTE, Percent::FULL, self.settings.duration)
    }

    /// Fade everything out to silence using the configured duration
    pub fn fade_out(&self, targets: &[VolumeTarget]) -> usize {
        self.ramp_all(targets, Percent::FULL, Percent::MUTE, self.settings.duration)
    }

    fn ramp(
        &self,
        targets: &[VolumeTarget],
        from: Percent,
        to: Percent,
        duration: Duration,
        steps: u32,
    ) -> usize {
        let steps = steps.max(1);
        let step_delay = duration / steps;
        let mut failures = 0;

        for step in 0..=steps {
            let volume = Percent::lerp(from, to, step as f64 / steps as f64);
            for target in targets {
                if !self.set(target, volume) {
                    failures += 1;
                }
            }
            if step < steps {
                thread::sleep(step_delay);
            }
        }

        if failures > 0 {
            warn!("{} volume changes failed during fade {} -> {}", failures, from, to);
        }
        failures
    }
}
