use serde::{Deserialize, Serialize};
use std::fmt;

/// A source or sink as reported by the audio server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl DeviceInfo {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            index: 0,
            name: name.into(),
            description: description.into(),
        }
    }

    /// Description for display, falling back to the node name
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}

/// Channel position parsed from a port's channel suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTag {
    Mono,
    Left,
    Right,
    Other,
}

impl ChannelTag {
    /// Classify a channel name such as `capture_MONO`, `playback_FL` or `monitor_FR`.
    ///
    /// Only an exact tag or an underscore-delimited suffix counts, so
    /// `MONITOR` never reads as mono.
    pub fn classify(channel: &str) -> ChannelTag {
        let upper = channel.to_ascii_uppercase();
        let has_tag = |tag: &str| upper == tag || upper.ends_with(&format!("_{}", tag));

        if has_tag("MONO") {
            ChannelTag::Mono
        } else if has_tag("FL") || has_tag("L") {
            ChannelTag::Left
        } else if has_tag("FR") || has_tag("R") {
            ChannelTag::Right
        } else {
            ChannelTag::Other
        }
    }
}

/// A single-channel port, identified as `node:channel`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Port {
    id: String,
    split: Option<usize>,
}

impl Port {
    pub fn parse(id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        let split = id.rfind(':');
        Self { id, split }
    }

    /// Full identifier as the server names it
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning node name (everything before the last separator)
    #[cfg(test)]
    pub fn node(&self) -> &str {
        match self.split {
            Some(i) => &self.id[..i],
            None => &self.id,
        }
    }

    /// Channel name (everything after the last separator)
    pub fn channel(&self) -> Option<&str> {
        self.split.map(|i| &self.id[i + 1..])
    }

    pub fn tag(&self) -> ChannelTag {
        self.channel()
            .map(ChannelTag::classify)
            .unwrap_or(ChannelTag::Other)
    }

    /// Case-insensitive substring match against the full identifier
    pub fn matches(&self, pattern: &str) -> bool {
        self.id.to_lowercase().contains(&pattern.to_lowercase())
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A link created by this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub output: Port,
    pub input: Port,
    pub is_monitor_link: bool,
}

impl Link {
    #[cfg(test)]
    pub fn joins(&self, output: &Port, input: &Port) -> bool {
        self.output == *output && self.input == *input
    }
}

/// Opaque handle of a server module we loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u32);

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Volume in integer percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(u8);

impl Percent {
    pub const MUTE: Percent = Percent(0);
    pub const FULL: Percent = Percent(100);

    /// Clamps to 0..=100
    pub fn new(value: u32) -> Self {
        Percent(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Linear interpolation rounded to the nearest integer percent
    pub fn lerp(from: Percent, to: Percent, progress: f64) -> Percent {
        let progress = progress.clamp(0.0, 1.0);
        let from = from.0 as f64;
        let to = to.0 as f64;
        Percent::new((from + (to - from) * progress).round() as u32)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.value())
    }
}

/// Something whose volume this process controls
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VolumeTarget {
    Source(String),
    Sink(String),
}

impl VolumeTarget {
    pub fn name(&self) -> &str {
        match self {
            VolumeTarget::Source(name) | VolumeTarget::Sink(name) => name,
        }
    }
}

/// Whether the live listening path is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitoringState {
    #[default]
    Disabled,
    Enabled,
}
