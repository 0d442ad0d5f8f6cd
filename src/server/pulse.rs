//! `pactl` / `pw-link` backend
//!
//! Works against PipeWire (through pipewire-pulse) and plain PulseAudio with
//! the JACK-style port names PipeWire exposes.

use super::{AudioServer, ServerError};
use crate::models::{DeviceInfo, ModuleHandle, Percent, VolumeTarget};
use log::trace;
use std::io::ErrorKind;
use std::process::{Command, Output};

/// Audio server driven through the `pactl` and `pw-link` command-line tools
#[derive(Debug, Clone)]
pub struct PulseCli {
    pactl: String,
    pw_link: String,
}

impl PulseCli {
    pub fn new() -> Self {
        Self {
            pactl: "pactl".to_string(),
            pw_link: "pw-link".to_string(),
        }
    }

    /// Run a tool, returning its output whatever the exit status
    fn run(&self, program: &str, args: &[&str]) -> Result<Output, ServerError> {
        trace!("Running {} {}", program, args.join(" "));
        Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ServerError::ToolMissing(program.to_string())
            } else {
                ServerError::Io {
                    command: program.to_string(),
                    source: e,
                }
            }
        })
    }

    /// Run a tool and require a zero exit status, returning trimmed stdout
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<String, ServerError> {
        let output = self.run(program, args)?;
        if !output.status.success() {
            return Err(ServerError::CommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn list_devices(&self, kind: &str) -> Result<Vec<DeviceInfo>, ServerError> {
        let stdout = self.run_checked(&self.pactl, &["-f", "json", "list", kind])?;
        parse_device_list(&stdout)
    }

    fn port_lines(&self, flag: &str) -> Result<Vec<String>, ServerError> {
        let stdout = self.run_checked(&self.pw_link, &[flag])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

impl Default for PulseCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioServer for PulseCli {
    fn list_sources(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        self.list_devices("sources")
    }

    fn list_sinks(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        self.list_devices("sinks")
    }

    fn default_sink(&self) -> Result<Option<String>, ServerError> {
        match self.run_checked(&self.pactl, &["get-default-sink"]) {
            Ok(name) if name.is_empty() => Ok(None),
            Ok(name) => Ok(Some(name)),
            // No default configured is reported as a failed command
            Err(ServerError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn output_ports(&self) -> Result<Vec<String>, ServerError> {
        self.port_lines("-o")
    }

    fn input_ports(&self) -> Result<Vec<String>, ServerError> {
        self.port_lines("-i")
    }

    fn links(&self) -> Result<Vec<(String, String)>, ServerError> {
        let stdout = self.run_checked(&self.pw_link, &["-l"])?;
        Ok(parse_link_listing(&stdout))
    }

    fn load_null_sink(&self, name: &str, description: &str) -> Result<ModuleHandle, ServerError> {
        let sink_name = format!("sink_name={}", name);
        let properties = format!("sink_properties=device.description={}", description);
        let stdout = self.run_checked(
            &self.pactl,
            &["load-module", "module-null-sink", &sink_name, &properties],
        )?;
        stdout
            .parse::<u32>()
            .map(ModuleHandle)
            .map_err(|_| ServerError::Parse(format!("unexpected module id '{}'", stdout)))
    }

    fn unload_module(&self, handle: ModuleHandle) -> Result<(), ServerError> {
        self.run_checked(&self.pactl, &["unload-module", &handle.to_string()])
            .map(|_| ())
    }

    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        self.run_checked(&self.pw_link, &[output, input]).map(|_| ())
    }

    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        self.run_checked(&self.pw_link, &["-d", output, input])
            .map(|_| ())
    }

    fn set_volume(&self, target: &VolumeTarget, volume: Percent) -> Result<(), ServerError> {
        let command = match target {
            VolumeTarget::Source(_) => "set-source-volume",
            VolumeTarget::Sink(_) => "set-sink-volume",
        };
        let level = volume.to_string();
        self.run_checked(&self.pactl, &[command, target.name(), &level])
            .map(|_| ())
    }
}

/// Parse `pactl -f json list sources|sinks`
pub(crate) fn parse_device_list(json: &str) -> Result<Vec<DeviceInfo>, ServerError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|e| ServerError::Parse(e.to_string()))
}

/// Parse `pw-link -l`
///
/// Output ports are unindented, each followed by indented `|-> input` lines.
/// Input ports list their peers with `|<-`, which we skip since every link
/// also appears under its output port.
pub(crate) fn parse_link_listing(listing: &str) -> Vec<(String, String)> {
    let mut links = Vec::new();
    let mut current_output: Option<&str> = None;

    for line in listing.lines() {
        if !line.starts_with(char::is_whitespace) && line.contains(':') {
            current_output = Some(line.trim());
        } else if let Some((_, dest)) = line.split_once("|-> ") {
            let dest = dest.trim();
            match current_output {
                Some(output) if !dest.is_empty() => {
                    links.push((output.to_string(), dest.to_string()))
                }
                _ => {}
            }
        }
    }

    links
}
