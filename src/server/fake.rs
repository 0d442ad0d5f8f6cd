//! In-memory audio server for tests
//!
//! Keeps a tiny model of the graph: sinks, sources, ports, links and volumes.
//! Every mutating call is recorded so tests can assert on ordering.

use super::{AudioServer, ServerError};
use crate::models::{DeviceInfo, ModuleHandle, Percent, VolumeTarget};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A mutating call the fake received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LoadNullSink(String),
    Unload(ModuleHandle),
    Connect(String, String),
    Disconnect(String, String),
    SetVolume(VolumeTarget, Percent),
}

#[derive(Default)]
struct Graph {
    sources: Vec<DeviceInfo>,
    sinks: Vec<DeviceInfo>,
    default_sink: Option<String>,
    outputs: Vec<String>,
    inputs: Vec<String>,
    links: Vec<(String, String)>,
    modules: HashMap<ModuleHandle, String>,
    next_module: u32,
    volumes: HashMap<VolumeTarget, Percent>,
    calls: Vec<Call>,
    failing_connects: HashSet<(String, String)>,
    failing_volumes: HashSet<String>,
    unreachable: bool,
    default_sink_fails: bool,
}

pub struct FakeServer {
    graph: Mutex<Graph>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            graph: Mutex::new(Graph {
                next_module: 500,
                ..Default::default()
            }),
        }
    }

    /// A desk with stereo speakers as the default output and one mono USB interface
    pub fn studio() -> Self {
        let server = Self::new();
        server.add_sink("alsa_output.pci-0000_00_1f.3.analog-stereo", "Built-in Audio", true);
        server.add_source(
            "alsa_input.usb-KORG_NTS-1-00.mono-fallback",
            "NTS-1 digital kit Mono",
            &["capture_MONO"],
        );
        server
    }

    pub fn add_sink(&self, name: &str, description: &str, default: bool) {
        let mut g = self.graph.lock().unwrap();
        g.sinks.push(DeviceInfo::new(name, description));
        g.inputs.push(format!("{}:playback_FL", name));
        g.inputs.push(format!("{}:playback_FR", name));
        g.outputs.push(format!("{}:monitor_FL", name));
        g.outputs.push(format!("{}:monitor_FR", name));
        if default {
            g.default_sink = Some(name.to_string());
        }
    }

    pub fn add_source(&self, name: &str, description: &str, channels: &[&str]) {
        let mut g = self.graph.lock().unwrap();
        g.sources.push(DeviceInfo::new(name, description));
        for channel in channels {
            g.outputs.push(format!("{}:{}", name, channel));
        }
    }

    /// Simulate a stream node (not a pactl source) exposing output ports
    pub fn add_stream(&self, node: &str, channels: &[&str]) {
        let mut g = self.graph.lock().unwrap();
        for channel in channels {
            g.outputs.push(format!("{}:{}", node, channel));
        }
    }

    /// A link the server made on its own
    pub fn add_foreign_link(&self, output: &str, input: &str) {
        let mut g = self.graph.lock().unwrap();
        g.links.push((output.to_string(), input.to_string()));
    }

    /// Drop a link behind our back, as when a device vanishes
    pub fn drop_link(&self, output: &str, input: &str) {
        let mut g = self.graph.lock().unwrap();
        g.links.retain(|(o, i)| !(o == output && i == input));
    }

    pub fn fail_connect(&self, output: &str, input: &str) {
        let mut g = self.graph.lock().unwrap();
        g.failing_connects
            .insert((output.to_string(), input.to_string()));
    }

    pub fn fail_volume(&self, name: &str) {
        self.graph
            .lock()
            .unwrap()
            .failing_volumes
            .insert(name.to_string());
    }

    /// Only the default-sink query fails, as when the server goes away mid-setup
    pub fn fail_default_sink(&self) {
        self.graph.lock().unwrap().default_sink_fails = true;
    }

    pub fn set_unreachable(&self) {
        self.graph.lock().unwrap().unreachable = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.graph.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.graph.lock().unwrap().calls.clear();
    }

    pub fn current_links(&self) -> Vec<(String, String)> {
        self.graph.lock().unwrap().links.clone()
    }

    pub fn has_link(&self, output: &str, input: &str) -> bool {
        self.current_links()
            .iter()
            .any(|(o, i)| o == output && i == input)
    }

    pub fn volume(&self, target: &VolumeTarget) -> Option<Percent> {
        self.graph.lock().unwrap().volumes.get(target).copied()
    }

    pub fn sink_names(&self) -> Vec<String> {
        let g = self.graph.lock().unwrap();
        g.sinks.iter().map(|s| s.name.clone()).collect()
    }

    /// Volume calls for one target, in order
    pub fn volume_history(&self, target: &VolumeTarget) -> Vec<Percent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetVolume(t, v) if t == *target => Some(v),
                _ => None,
            })
            .collect()
    }

    fn reachable(g: &Graph) -> Result<(), ServerError> {
        if g.unreachable {
            Err(ServerError::CommandFailed {
                command: "pactl info".to_string(),
                stderr: "Connection failure: Connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl AudioServer for FakeServer {
    fn list_sources(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        let g = self.graph.lock().unwrap();
        Self::reachable(&g)?;
        let mut sources = g.sources.clone();
        // Every sink carries a monitor source
        for sink in &g.sinks {
            sources.push(DeviceInfo::new(
                format!("{}.monitor", sink.name),
                format!("Monitor of {}", sink.label()),
            ));
        }
        Ok(sources)
    }

    fn list_sinks(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        let g = self.graph.lock().unwrap();
        Self::reachable(&g)?;
        Ok(g.sinks.clone())
    }

    fn default_sink(&self) -> Result<Option<String>, ServerError> {
        let g = self.graph.lock().unwrap();
        Self::reachable(&g)?;
        if g.default_sink_fails {
            return Err(ServerError::CommandFailed {
                command: "pactl get-default-sink".to_string(),
                stderr: "Connection failure: Connection terminated".to_string(),
            });
        }
        Ok(g.default_sink.clone())
    }

    fn output_ports(&self) -> Result<Vec<String>, ServerError> {
        let g = self.graph.lock().unwrap();
        Self::reachable(&g)?;
        Ok(g.outputs.clone())
    }

    fn input_ports(&self) -> Result<Vec<String>, ServerError> {
        let g = self.graph.lock().unwrap();
        Self::reachable(&g)?;
        Ok(g.inputs.clone())
    }

    fn links(&self) -> Result<Vec<(String, String)>, ServerError> {
        let g = self.graph.lock().unwrap();
        Self::reachable(&g)?;
        Ok(g.links.clone())
    }

    fn load_null_sink(&self, name: &str, description: &str) -> Result<ModuleHandle, ServerError> {
        {
            let mut g = self.graph.lock().unwrap();
            Self::reachable(&g)?;
            g.calls.push(Call::LoadNullSink(name.to_string()));
        }
        self.add_sink(name, description, false);
        let mut g = self.graph.lock().unwrap();
        let handle = ModuleHandle(g.next_module);
        g.next_module += 1;
        g.modules.insert(handle, name.to_string());
        Ok(handle)
    }

    fn unload_module(&self, handle: ModuleHandle) -> Result<(), ServerError> {
        let mut g = self.graph.lock().unwrap();
        g.calls.push(Call::Unload(handle));
        let name = g.modules.remove(&handle).ok_or_else(|| ServerError::CommandFailed {
            command: format!("pactl unload-module {}", handle),
            stderr: "No such entity".to_string(),
        })?;
        let prefix = format!("{}:", name);
        g.sinks.retain(|s| s.name != name);
        g.inputs.retain(|p| !p.starts_with(&prefix));
        g.outputs.retain(|p| !p.starts_with(&prefix));
        g.links
            .retain(|(o, i)| !o.starts_with(&prefix) && !i.starts_with(&prefix));
        Ok(())
    }

    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        let mut g = self.graph.lock().unwrap();
        g.calls
            .push(Call::Connect(output.to_string(), input.to_string()));
        let pair = (output.to_string(), input.to_string());
        let exists = g.outputs.iter().any(|p| p == output) && g.inputs.iter().any(|p| p == input);
        if !exists || g.failing_connects.contains(&pair) || g.links.contains(&pair) {
            return Err(ServerError::CommandFailed {
                command: format!("pw-link {} {}", output, input),
                stderr: "failed to link ports".to_string(),
            });
        }
        g.links.push(pair);
        Ok(())
    }

    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        let mut g = self.graph.lock().unwrap();
        g.calls
            .push(Call::Disconnect(output.to_string(), input.to_string()));
        let before = g.links.len();
        g.links.retain(|(o, i)| !(o == output && i == input));
        if g.links.len() == before {
            return Err(ServerError::CommandFailed {
                command: format!("pw-link -d {} {}", output, input),
                stderr: "link not found".to_string(),
            });
        }
        Ok(())
    }

    fn set_volume(&self, target: &VolumeTarget, volume: Percent) -> Result<(), ServerError> {
        let mut g = self.graph.lock().unwrap();
        g.calls.push(Call::SetVolume(target.clone(), volume));
        if g.failing_volumes.contains(target.name()) {
            return Err(ServerError::CommandFailed {
                command: format!("pactl set-volume {}", target.name()),
                stderr: "No such entity".to_string(),
            });
        }
        g.volumes.insert(target.clone(), volume);
        Ok(())
    }
}
