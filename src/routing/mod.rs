//! Audio graph routing
//!
//! This module provides:
//! - Endpoint discovery (`EndpointDirectory`)
//! - Channel matching between port lists (`matcher`)
//! - The ledger of links we created (`LinkLedger`)
//! - Creation and teardown of mixing sinks (`VirtualSinks`)

mod directory;
pub mod matcher;
mod ledger;
mod virtual_sink;

use crate::server::{AudioServer, ServerError};
use log::{info, warn};
use std::sync::Arc;

pub use directory::EndpointDirectory;
pub use ledger::LinkLedger;
pub use virtual_sink::{VirtualEndpoint, VirtualSinks};

/// Which end of a connection had nothing to offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    Output,
    Input,
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("No {side:?} ports found matching '{pattern}'")]
    NoPorts { side: PortSide, pattern: String },

    #[error("No compatible channels between '{source_pattern}' and '{sink_pattern}'")]
    NoLinks {
        source_pattern: String,
        sink_pattern: String,
    },

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Wires nodes together through the ledger
pub struct Router {
    directory: EndpointDirectory,
    ledger: LinkLedger,
}

impl Router {
    pub fn new(server: Arc<dyn AudioServer>) -> Self {
        Self {
            directory: EndpointDirectory::new(server.clone()),
            ledger: LinkLedger::new(server),
        }
    }

    pub fn directory(&self) -> &EndpointDirectory {
        &self.directory
    }

    pub fn ledger(&self) -> &LinkLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut LinkLedger {
        &mut self.ledger
    }

    /// Link the output ports of `source_pattern` to the input ports of
    /// `sink_pattern` by channel. Returns the number of links made.
    pub fn connect_nodes(
        &mut self,
        source_pattern: &str,
        sink_pattern: &str,
        as_monitor: bool,
    ) -> Result<usize, RouteError> {
        let outputs = self.directory.output_ports(source_pattern)?;
        let inputs = self.directory.input_ports(sink_pattern)?;

        let pairs = matcher::match_ports(&outputs, &inputs).ok_or_else(|| {
            let (side, pattern) = if outputs.is_empty() {
                (PortSide::Output, source_pattern)
            } else {
                (PortSide::Input, sink_pattern)
            };
            RouteError::NoPorts {
                side,
                pattern: pattern.to_string(),
            }
        })?;

        let linked = pairs
            .iter()
            .filter(|(out, inp)| self.ledger.connect(out, inp, as_monitor))
            .count();

        if linked == 0 {
            return Err(RouteError::NoLinks {
                source_pattern: source_pattern.to_string(),
                sink_pattern: sink_pattern.to_string(),
            });
        }
        Ok(linked)
    }

    /// Remove links the server created by itself from `source_pattern` to `sink`.
    ///
    /// Links in our ledger are left alone.
    pub fn disconnect_auto_links(&mut self, source_pattern: &str, sink: &str) -> usize {
        let links = match self.directory.server().links() {
            Ok(links) => links,
            Err(e) => {
                warn!("Could not list links: {}", e);
                return 0;
            }
        };

        let source_pattern = source_pattern.to_lowercase();
        let sink = sink.to_lowercase();
        let mut removed = 0;

        for (output, input) in links {
            if !output.to_lowercase().contains(&source_pattern)
                || !input.to_lowercase().contains(&sink)
                || self.ledger.contains(&output, &input)
            {
                continue;
            }
            match self.directory.server().disconnect(&output, &input) {
                Ok(()) => {
                    info!("Disconnected auto-link: {} -> {}", output, input);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove auto-link {} -> {}: {}", output, input, e),
            }
        }

        removed
    }
}
