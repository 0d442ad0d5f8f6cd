//! Recording session: build the routing, run, tear it down
//!
//! Setup creates the mix sink, mutes and wires every input into it, builds
//! the optional monitor path and fades everything in. Cleanup fades out,
//! unlinks, stops helpers and removes only the sinks we created. Cleanup can
//! run any number of times and copes with a half-finished setup; it also
//! runs when the session is dropped.

use crate::fade::FadeEngine;
use crate::models::{MonitoringState, Percent, VolumeTarget};
use crate::monitor::{MonitorPath, Monitoring};
use crate::process::Mirror;
use crate::routing::{Router, VirtualEndpoint, VirtualSinks};
use crate::server::{AudioServer, ServerError};
use crate::settings::{MonitorMode, SessionConfig};
use log::{info, warn};
use std::sync::Arc;
use std::thread;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to set up mix sink '{name}': {source}")]
    MixSink {
        name: String,
        #[source]
        source: ServerError,
    },

    #[error("Audio server unreachable: {0}")]
    ServerUnreachable(#[source] ServerError),
}

/// Names of what can be recorded after setup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSources {
    /// Physical capture source mixed in
    pub capture: Option<String>,
    /// Node of the mirroring tool's audio stream
    pub mirror: Option<String>,
    /// Monitor source of the mix sink
    pub mix: Option<String>,
}

pub struct Session {
    config: SessionConfig,
    router: Router,
    sinks: VirtualSinks,
    fades: FadeEngine,
    monitoring: Monitoring,
    mirror: Mirror,
    mix: Option<VirtualEndpoint>,
    monitor_sink: Option<VirtualEndpoint>,
    default_output: Option<String>,
    managed_sources: Vec<String>,
    /// Managed volumes have been brought up from silence
    faded_in: bool,
}

impl Session {
    pub fn new(server: Arc<dyn AudioServer>, config: SessionConfig) -> Self {
        Self {
            router: Router::new(server.clone()),
            sinks: VirtualSinks::new(server.clone()),
            fades: FadeEngine::new(server, config.fade),
            monitoring: Monitoring::new(),
            mirror: Mirror::new(),
            mix: None,
            monitor_sink: None,
            default_output: None,
            managed_sources: Vec::new(),
            faded_in: false,
            config,
        }
    }

    pub fn setup(&mut self) -> Result<SessionSources, SessionError> {
        let mut sources = SessionSources::default();

        let mix = self
            .sinks
            .ensure(&self.config.mix_sink)
            .map_err(|source| SessionError::MixSink {
                name: self.config.mix_sink.clone(),
                source,
            })?;
        self.wait_for_ports(&mix.name);
        self.fades
            .set(&VolumeTarget::Sink(mix.name.clone()), Percent::MUTE);
        self.mix = Some(mix.clone());

        let default_output = self
            .router
            .directory()
            .default_sink()
            .map_err(SessionError::ServerUnreachable)?;
        if default_output.is_none() {
            warn!("No default output configured; monitoring unavailable");
        }
        self.default_output = default_output.clone();

        if self.config.monitor && self.config.monitor_mode == MonitorMode::Staged {
            self.create_monitor_sink();
        }

        if self.config.with_capture {
            sources.capture = self.add_capture(&mix.name);
        }

        if self.config.with_mirror {
            sources.mirror = self.add_mirror(&mix.name);
        }

        sources.mix = Some(mix.monitor_source());

        if self.config.monitor {
            if let Some(output) = &default_output {
                self.configure_monitoring(&mix.name, output);
            }
        }

        self.fades.fade_in(&self.managed_targets());
        self.faded_in = true;

        if self.monitoring.path().is_some() {
            self.monitoring.enable(&mut self.router, &self.fades);
        }

        Ok(sources)
    }

    /// Flip live monitoring and return the new state
    pub fn toggle_monitoring(&mut self) -> MonitoringState {
        self.monitoring.toggle(&mut self.router, &self.fades)
    }

    pub fn monitoring_state(&self) -> MonitoringState {
        self.monitoring.state()
    }

    pub fn mirror_running(&mut self) -> bool {
        self.mirror.is_running()
    }

    #[cfg(test)]
    pub fn managed_sources(&self) -> &[String] {
        &self.managed_sources
    }

    pub fn link_count(&self) -> usize {
        self.router.ledger().len()
    }

    pub fn mix(&self) -> Option<&VirtualEndpoint> {
        self.mix.as_ref()
    }

    pub fn default_output(&self) -> Option<&str> {
        self.default_output.as_deref()
    }

    /// Tear everything down, fades first
    pub fn cleanup(&mut self) {
        // A direct monitor path is the mix itself; it goes silent with the
        // fade-out below and is unlinked after it
        if self.monitoring.is_enabled() && !self.monitoring.shares_mix() {
            self.monitoring.disable(&mut self.router, &self.fades);
        }

        let targets = self.managed_targets();
        if self.faded_in {
            self.fades.fade_out(&targets);
        } else {
            // Setup stopped before the fade-in; everything is still muted
            for target in &targets {
                self.fades.set(target, Percent::MUTE);
            }
        }
        self.faded_in = false;

        self.monitoring.release(&mut self.router);

        let ledger = self.router.ledger_mut();
        if !ledger.is_empty() {
            info!("Removing {} links", ledger.len());
            ledger.disconnect_all();
        }
        self.mirror.stop();
        self.sinks.destroy_all();

        self.managed_sources.clear();
        self.mix = None;
        self.monitor_sink = None;
        self.default_output = None;
        self.monitoring.reset();
    }

    /// Sources and the mix sink, everything faded together
    fn managed_targets(&self) -> Vec<VolumeTarget> {
        let mut targets: Vec<VolumeTarget> = self
            .managed_sources
            .iter()
            .map(|s| VolumeTarget::Source(s.clone()))
            .collect();
        if let Some(mix) = &self.mix {
            targets.push(VolumeTarget::Sink(mix.name.clone()));
        }
        targets
    }

    fn wait_for_ports(&self, node: &str) -> bool {
        let found = self.router.directory().wait_for_node(
            node,
            self.config.port_timeout,
            self.config.poll_interval,
        );
        if !found {
            warn!("{} ports did not appear in time", node);
        }
        found
    }

    fn create_monitor_sink(&mut self) {
        match self.sinks.ensure(&self.config.monitor_sink) {
            Ok(sink) => {
                self.wait_for_ports(&sink.name);
                self.fades
                    .set(&VolumeTarget::Sink(sink.name.clone()), Percent::MUTE);
                self.monitor_sink = Some(sink);
            }
            Err(e) => warn!("Failed to create monitor sink: {}", e),
        }
    }

    fn add_capture(&mut self, mix: &str) -> Option<String> {
        let directory = self.router.directory();
        let found = match &self.config.capture_pattern {
            Some(pattern) => directory.find_source(pattern),
            None => directory.find_usb_capture(),
        };
        let source = match found {
            Ok(Some(source)) => source,
            Ok(None) => {
                warn!("Capture device not found");
                return None;
            }
            Err(e) => {
                warn!("Failed to look up capture device: {}", e);
                return None;
            }
        };

        info!("Found capture device: {} ({})", source.label(), source.name);
        self.managed_sources.push(source.name.clone());
        self.fades
            .set(&VolumeTarget::Source(source.name.clone()), Percent::MUTE);

        if let Err(e) = self.router.connect_nodes(&source.name, mix, false) {
            warn!("Failed to connect {} to {}: {}", source.name, mix, e);
        }
        Some(source.name)
    }

    fn add_mirror(&mut self, mix: &str) -> Option<String> {
        if let Err(e) = self.mirror.start(self.config.mirror_startup) {
            warn!("{}", e);
            return None;
        }

        let node = self.config.mirror_node.clone();
        let appeared = self.router.directory().wait_for_node(
            &node,
            self.config.mirror_timeout,
            self.config.poll_interval,
        );
        if !appeared {
            warn!("{} node did not appear", node);
            return None;
        }

        // The mirror plays to the default output on its own; take that away
        thread::sleep(self.config.auto_link_settle);
        if let Some(output) = self.default_output.clone() {
            self.router.disconnect_auto_links(&node, &output);
        }

        if let Err(e) = self.router.connect_nodes(&node, mix, false) {
            warn!("Failed to connect {} to {}: {}", node, mix, e);
        }
        Some(node)
    }

    fn configure_monitoring(&mut self, mix: &str, output: &str) {
        self.router.disconnect_auto_links(mix, output);

        let path = match self.config.monitor_mode {
            MonitorMode::Staged => {
                let Some(monitor_sink) = self.monitor_sink.as_ref().map(|s| s.name.clone()) else {
                    warn!("No monitor sink; monitoring disabled");
                    return;
                };
                info!("Setting up monitoring: {} -> {} -> {}", mix, monitor_sink, output);
                if let Err(e) = self.router.connect_nodes(mix, &monitor_sink, false) {
                    warn!("Failed to connect {} to {}: {}", mix, monitor_sink, e);
                    return;
                }
                MonitorPath::staged(&monitor_sink)
            }
            MonitorMode::Direct => {
                info!("Setting up monitoring: {} -> {}", mix, output);
                MonitorPath::direct(mix)
            }
        };

        self.monitoring.configure(path, Some(output.to_string()));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::fake::{Call, FakeServer};

    const SYNTH: &str = "alsa_input.usb-KORG_NTS-1-00.mono-fallback";
    const SPEAKERS: &str = "alsa_output.pci-0000_00_1f.3.analog-stereo";

    fn config() -> SessionConfig {
        SessionConfig {
            with_mirror: false,
            with_capture: true,
            monitor: true,
            ..SessionConfig::instant()
        }
    }

    #[test]
    fn test_setup_and_cleanup_round_trip() {
        let server = Arc::new(FakeServer::studio());
        let mut session = Session::new(server.clone(), config());

        let sources = session.setup().unwrap();
        assert_eq!(sources.capture.as_deref(), Some(SYNTH));
        assert_eq!(sources.mix.as_deref(), Some("record_mix.monitor"));
        assert_eq!(sources.mirror, None);

        assert_eq!(
            server.volume(&VolumeTarget::Sink("record_mix".to_string())),
            Some(Percent::FULL)
        );
        assert_eq!(
            server.volume(&VolumeTarget::Source(SYNTH.to_string())),
            Some(Percent::FULL)
        );
        assert_eq!(
            server.volume(&VolumeTarget::Sink("monitor_mix".to_string())),
            Some(Percent::FULL)
        );

        let capture = format!("{}:capture_MONO", SYNTH);
        assert!(server.has_link(&capture, "record_mix:playback_FL"));
        assert!(server.has_link(&capture, "record_mix:playback_FR"));
        assert!(server.has_link("record_mix:monitor_FL", "monitor_mix:playback_FL"));
        assert!(server.has_link(
            "monitor_mix:monitor_FL",
            &format!("{}:playback_FL", SPEAKERS)
        ));
        assert_eq!(session.monitoring_state(), MonitoringState::Enabled);
        assert_eq!(session.managed_sources(), &[SYNTH.to_string()]);

        session.cleanup();
        assert_eq!(session.link_count(), 0);
        assert!(session.managed_sources().is_empty());
        assert!(session.mix().is_none());
        assert_eq!(session.monitoring_state(), MonitoringState::Disabled);
        assert!(server.current_links().is_empty());
        assert_eq!(server.sink_names(), vec![SPEAKERS.to_string()]);
        assert_eq!(
            server.volume(&VolumeTarget::Source(SYNTH.to_string())),
            Some(Percent::MUTE)
        );

        server.clear_calls();
        session.cleanup();
        assert!(server.calls().is_empty());
    }

    #[test]
    fn test_toggle_keeps_recording_path() {
        let server = Arc::new(FakeServer::studio());
        let mut session = Session::new(server.clone(), config());
        session.setup().unwrap();

        assert_eq!(session.toggle_monitoring(), MonitoringState::Disabled);
        assert!(!server.has_link(
            "monitor_mix:monitor_FL",
            &format!("{}:playback_FL", SPEAKERS)
        ));
        assert!(server.has_link("record_mix:monitor_FL", "monitor_mix:playback_FL"));
        assert_eq!(
            server.volume(&VolumeTarget::Sink("record_mix".to_string())),
            Some(Percent::FULL)
        );

        assert_eq!(session.toggle_monitoring(), MonitoringState::Enabled);
        assert!(server.has_link(
            "monitor_mix:monitor_FR",
            &format!("{}:playback_FR", SPEAKERS)
        ));
    }

    #[test]
    fn test_direct_monitoring_has_no_monitor_sink() {
        let server = Arc::new(FakeServer::studio());
        let mut session = Session::new(
            server.clone(),
            SessionConfig {
                monitor_mode: MonitorMode::Direct,
                ..config()
            },
        );
        session.setup().unwrap();

        assert!(!server.sink_names().contains(&"monitor_mix".to_string()));
        assert!(server.has_link(
            "record_mix:monitor_FL",
            &format!("{}:playback_FL", SPEAKERS)
        ));
        assert_eq!(session.monitoring_state(), MonitoringState::Enabled);

        session.cleanup();
        assert!(server.current_links().is_empty());
    }

    #[test]
    fn test_existing_mix_sink_survives_cleanup() {
        let server = Arc::new(FakeServer::studio());
        server.add_sink("record_mix", "record_mix", false);
        let mut session = Session::new(server.clone(), config());

        session.setup().unwrap();
        session.cleanup();

        let names = server.sink_names();
        assert!(names.contains(&"record_mix".to_string()));
        assert!(!names.contains(&"monitor_mix".to_string()));
    }

    #[test]
    fn test_missing_capture_device_is_tolerated() {
        let server = Arc::new(FakeServer::new());
        server.add_sink(SPEAKERS, "Built-in Audio", true);
        let mut session = Session::new(server.clone(), config());

        let sources = session.setup().unwrap();
        assert_eq!(sources.capture, None);
        assert!(sources.mix.is_some());
        assert!(session.managed_sources().is_empty());
    }

    #[test]
    fn test_without_monitor_nothing_reaches_output() {
        let server = Arc::new(FakeServer::studio());
        let mut session = Session::new(
            server.clone(),
            SessionConfig {
                monitor: false,
                ..config()
            },
        );
        session.setup().unwrap();

        assert_eq!(session.monitoring_state(), MonitoringState::Disabled);
        assert!(!server.sink_names().contains(&"monitor_mix".to_string()));
        assert!(server
            .current_links()
            .iter()
            .all(|(_, input)| !input.starts_with(SPEAKERS)));
        assert_eq!(session.toggle_monitoring(), MonitoringState::Disabled);
    }

    #[test]
    fn test_unreachable_server_aborts_setup() {
        let server = Arc::new(FakeServer::studio());
        server.set_unreachable();
        let mut session = Session::new(server.clone(), config());

        assert!(matches!(
            session.setup(),
            Err(SessionError::MixSink { .. })
        ));
        session.cleanup();
        assert!(server.calls().is_empty());
    }

    #[test]
    fn test_direct_cleanup_silences_mix_before_unlinking_output() {
        let server = Arc::new(FakeServer::studio());
        let mut session = Session::new(
            server.clone(),
            SessionConfig {
                monitor_mode: MonitorMode::Direct,
                ..config()
            },
        );
        session.setup().unwrap();
        server.clear_calls();

        session.cleanup();

        let calls = server.calls();
        let unlink = calls
            .iter()
            .position(|c| {
                matches!(c, Call::Disconnect(out, inp)
                    if out.starts_with("record_mix:") && inp.starts_with(SPEAKERS))
            })
            .unwrap();
        let mix = VolumeTarget::Sink("record_mix".to_string());
        let before: Vec<Percent> = calls[..unlink]
            .iter()
            .filter_map(|c| match c {
                Call::SetVolume(target, volume) if *target == mix => Some(*volume),
                _ => None,
            })
            .collect();
        assert_eq!(before.last(), Some(&Percent::MUTE));
        assert!(!calls[unlink..].iter().any(|c| {
            matches!(c, Call::SetVolume(target, volume)
                if *target == mix && *volume > Percent::MUTE)
        }));
        assert!(server.current_links().is_empty());
    }

    #[test]
    fn test_cleanup_after_setup_fails_halfway() {
        let server = Arc::new(FakeServer::studio());
        server.fail_default_sink();
        let mut session = Session::new(server.clone(), config());

        assert!(matches!(
            session.setup(),
            Err(SessionError::ServerUnreachable(_))
        ));
        assert!(server.sink_names().contains(&"record_mix".to_string()));
        server.clear_calls();

        session.cleanup();

        // Never faded in, so it stays muted on the way out
        let mix = VolumeTarget::Sink("record_mix".to_string());
        assert_eq!(server.volume_history(&mix), vec![Percent::MUTE]);
        assert!(server.calls().iter().any(|c| matches!(c, Call::Unload(_))));
        assert_eq!(server.sink_names(), vec![SPEAKERS.to_string()]);
        assert!(server.current_links().is_empty());
        assert_eq!(session.link_count(), 0);
    }

    #[test]
    fn test_drop_cleans_up() {
        let server = Arc::new(FakeServer::studio());
        {
            let mut session = Session::new(server.clone(), config());
            session.setup().unwrap();
        }
        assert!(server.current_links().is_empty());
        assert_eq!(server.sink_names(), vec![SPEAKERS.to_string()]);
    }
}
