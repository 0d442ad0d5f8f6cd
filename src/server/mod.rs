//! Audio server access
//!
//! This module provides:
//! - The `AudioServer` trait: point-in-time queries and graph mutations
//! - `PulseCli`, a backend driving `pactl` and `pw-link`
//! - `RegistryServer` (feature `registry`), reading ports from the PipeWire registry

#[cfg(test)]
pub mod fake;
mod pulse;
#[cfg(feature = "registry")]
mod registry;

use crate::models::{DeviceInfo, ModuleHandle, Percent, VolumeTarget};

pub use pulse::PulseCli;
#[cfg(feature = "registry")]
pub use registry::RegistryServer;

/// Errors from talking to the audio server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0} not found - is it installed?")]
    ToolMissing(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("I/O error running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse server output: {0}")]
    Parse(String),
}

/// Query and mutation interface of the audio server
///
/// Every query is a fresh snapshot; the graph changes underneath us as
/// devices and links come and go.
pub trait AudioServer: Send + Sync {
    fn list_sources(&self) -> Result<Vec<DeviceInfo>, ServerError>;

    fn list_sinks(&self) -> Result<Vec<DeviceInfo>, ServerError>;

    fn default_sink(&self) -> Result<Option<String>, ServerError>;

    /// All output port identifiers (`node:channel`)
    fn output_ports(&self) -> Result<Vec<String>, ServerError>;

    /// All input port identifiers (`node:channel`)
    fn input_ports(&self) -> Result<Vec<String>, ServerError>;

    /// Current links as (output, input) identifier pairs
    fn links(&self) -> Result<Vec<(String, String)>, ServerError>;

    fn load_null_sink(&self, name: &str, description: &str) -> Result<ModuleHandle, ServerError>;

    fn unload_module(&self, handle: ModuleHandle) -> Result<(), ServerError>;

    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError>;

    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError>;

    fn set_volume(&self, target: &VolumeTarget, volume: Percent) -> Result<(), ServerError>;
}
