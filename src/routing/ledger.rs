//! Record of every link this process created
//!
//! Links only enter the ledger after the server accepted them, and leave it
//! when we disconnect them. A link the server already dropped on its own
//! counts as disconnected.

use crate::models::{Link, Port};
use crate::server::AudioServer;
use log::{debug, info, warn};
use std::sync::Arc;

pub struct LinkLedger {
    server: Arc<dyn AudioServer>,
    links: Vec<Link>,
}

impl LinkLedger {
    pub fn new(server: Arc<dyn AudioServer>) -> Self {
        Self {
            server,
            links: Vec::new(),
        }
    }

    /// Link two ports, recording the link on success. Failures are not retried.
    pub fn connect(&mut self, output: &Port, input: &Port, as_monitor: bool) -> bool {
        match self.server.connect(output.id(), input.id()) {
            Ok(()) => {
                info!("Linked: {} -> {}", output, input);
                self.links.push(Link {
                    output: output.clone(),
                    input: input.clone(),
                    is_monitor_link: as_monitor,
                });
                true
            }
            Err(e) => {
                warn!("Failed to link {} -> {}: {}", output, input, e);
                false
            }
        }
    }

    /// Remove the first ledger entry for this pair, if any
    #[cfg(test)]
    pub fn disconnect(&mut self, output: &Port, input: &Port) -> bool {
        match self.links.iter().position(|l| l.joins(output, input)) {
            Some(index) => {
                let link = self.links.remove(index);
                self.unlink(&link);
                true
            }
            None => false,
        }
    }

    /// Remove every link matching `predicate`, returning how many were removed
    pub fn disconnect_matching<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Link) -> bool,
    {
        let (matching, kept): (Vec<Link>, Vec<Link>) =
            self.links.drain(..).partition(|l| predicate(l));
        self.links = kept;
        for link in &matching {
            self.unlink(link);
        }
        matching.len()
    }

    #[cfg(test)]
    pub fn disconnect_monitor_links(&mut self) -> usize {
        self.disconnect_matching(|l| l.is_monitor_link)
    }

    /// Remove everything. Calling it on an empty ledger issues no commands.
    pub fn disconnect_all(&mut self) -> usize {
        self.disconnect_matching(|_| true)
    }

    pub fn contains(&self, output: &str, input: &str) -> bool {
        self.links
            .iter()
            .any(|l| l.output.id() == output && l.input.id() == input)
    }

    #[cfg(test)]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn unlink(&self, link: &Link) {
        match self.server.disconnect(link.output.id(), link.input.id()) {
            Ok(()) => info!("Unlinked: {} -> {}", link.output, link.input),
            // Already gone, e.g. the device was unplugged
            Err(e) => debug!(
                "Link {} -> {} was already gone: {}",
                link.output, link.input, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::fake::{Call, FakeServer};

    const MIC: &str = "alsa_input.usb-KORG_NTS-1-00.mono-fallback:capture_MONO";
    const OUT_FL: &str = "alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL";
    const OUT_FR: &str = "alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FR";

    fn setup() -> (Arc<FakeServer>, LinkLedger) {
        let server = Arc::new(FakeServer::studio());
        let ledger = LinkLedger::new(server.clone());
        (server, ledger)
    }

    fn disconnects(server: &FakeServer) -> usize {
        server
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Disconnect(..)))
            .count()
    }

    #[test]
    fn test_failed_connect_is_not_recorded() {
        let (server, mut ledger) = setup();
        server.fail_connect(MIC, OUT_FL);

        assert!(!ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FL), false));
        assert!(ledger.is_empty());

        assert!(ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FR), false));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(MIC, OUT_FR));
    }

    #[test]
    fn test_disconnect_all_is_idempotent() {
        let (server, mut ledger) = setup();
        ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FL), false);
        ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FR), true);

        assert_eq!(ledger.disconnect_all(), 2);
        assert!(ledger.is_empty());
        assert!(server.current_links().is_empty());
        assert_eq!(disconnects(&server), 2);

        assert_eq!(ledger.disconnect_all(), 0);
        assert!(ledger.is_empty());
        assert_eq!(disconnects(&server), 2);
    }

    #[test]
    fn test_stale_disconnect_is_satisfied() {
        let (server, mut ledger) = setup();
        ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FL), false);
        server.drop_link(MIC, OUT_FL);

        assert!(ledger.disconnect(&Port::parse(MIC), &Port::parse(OUT_FL)));
        assert!(ledger.is_empty());
        assert!(!ledger.disconnect(&Port::parse(MIC), &Port::parse(OUT_FL)));
    }

    #[test]
    fn test_disconnect_monitor_links_only() {
        let (server, mut ledger) = setup();
        ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FL), false);
        ledger.connect(&Port::parse(MIC), &Port::parse(OUT_FR), true);

        assert_eq!(ledger.disconnect_monitor_links(), 1);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(MIC, OUT_FL));
        assert!(server.has_link(MIC, OUT_FL));
        assert!(!server.has_link(MIC, OUT_FR));
    }
}
