//! Point-in-time views of sources, sinks and ports

use crate::models::{DeviceInfo, Port};
use crate::server::{AudioServer, ServerError};
use log::debug;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Output and input ports of the nodes matching a pattern
#[derive(Debug, Clone, Default)]
pub struct NodePorts {
    pub outputs: Vec<Port>,
    pub inputs: Vec<Port>,
}

/// Queries the audio server for endpoints and ports. Nothing is cached.
#[derive(Clone)]
pub struct EndpointDirectory {
    server: Arc<dyn AudioServer>,
}

impl EndpointDirectory {
    pub fn new(server: Arc<dyn AudioServer>) -> Self {
        Self { server }
    }

    pub(crate) fn server(&self) -> &Arc<dyn AudioServer> {
        &self.server
    }

    pub fn list_sources(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        self.server.list_sources()
    }

    pub fn list_sinks(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        self.server.list_sinks()
    }

    pub fn default_sink(&self) -> Result<Option<String>, ServerError> {
        self.server.default_sink()
    }

    /// Output ports whose identifier contains `pattern` (case-insensitive)
    pub fn output_ports(&self, pattern: &str) -> Result<Vec<Port>, ServerError> {
        Ok(filter_ports(self.server.output_ports()?, pattern))
    }

    /// Input ports whose identifier contains `pattern` (case-insensitive)
    pub fn input_ports(&self, pattern: &str) -> Result<Vec<Port>, ServerError> {
        Ok(filter_ports(self.server.input_ports()?, pattern))
    }

    pub fn ports_of(&self, pattern: &str) -> Result<NodePorts, ServerError> {
        Ok(NodePorts {
            outputs: self.output_ports(pattern)?,
            inputs: self.input_ports(pattern)?,
        })
    }

    /// First source whose name or description contains `pattern`
    pub fn find_source(&self, pattern: &str) -> Result<Option<DeviceInfo>, ServerError> {
        let pattern = pattern.to_lowercase();
        Ok(self.list_sources()?.into_iter().find(|s| {
            s.name.to_lowercase().contains(&pattern)
                || s.description.to_lowercase().contains(&pattern)
        }))
    }

    /// The USB audio interface input, never one of the monitor sources
    pub fn find_usb_capture(&self) -> Result<Option<DeviceInfo>, ServerError> {
        let sources = self.list_sources()?;

        let alsa_input = sources
            .iter()
            .find(|s| s.name.contains("alsa_input") && s.name.to_lowercase().contains("usb"));
        if let Some(source) = alsa_input {
            return Ok(Some(source.clone()));
        }

        Ok(sources.into_iter().find(|s| {
            let name = s.name.to_lowercase();
            let desc = s.description.to_lowercase();
            (name.contains("usb") || desc.contains("usb"))
                && !name.contains("monitor")
                && !desc.contains("monitor")
        }))
    }

    /// Poll until a node with ports matching `pattern` shows up.
    ///
    /// Returns false on timeout; query failures count as "not there yet".
    pub fn wait_for_node(&self, pattern: &str, timeout: Duration, poll: Duration) -> bool {
        let start = Instant::now();
        loop {
            match self.ports_of(pattern) {
                Ok(ports) if !ports.outputs.is_empty() || !ports.inputs.is_empty() => {
                    return true
                }
                Ok(_) => {}
                Err(e) => debug!("Port query failed while waiting for {}: {}", pattern, e),
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(poll.min(timeout.saturating_sub(start.elapsed())));
        }
    }
}

fn filter_ports(ids: Vec<String>, pattern: &str) -> Vec<Port> {
    ids.into_iter()
        .map(Port::parse)
        .filter(|p| p.matches(pattern))
        .collect()
}
