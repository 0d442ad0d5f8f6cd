//! Port discovery from a PipeWire registry snapshot
//!
//! Ports are read straight from the registry and named `node.name:port.name`,
//! the same convention `pw-link` prints. Everything else is delegated to
//! `PulseCli`.

use super::{AudioServer, PulseCli, ServerError};
use crate::models::{DeviceInfo, ModuleHandle, Percent, VolumeTarget};
use pipewire::{context::ContextRc, main_loop::MainLoopRc, registry::GlobalObject, types::ObjectType};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

static PIPEWIRE_INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

#[derive(Default)]
struct Snapshot {
    nodes: HashMap<u32, String>,
    ports: Vec<(u32, String, Direction)>,
}

impl Snapshot {
    fn port_ids(&self, direction: Direction) -> Vec<String> {
        self.ports
            .iter()
            .filter(|(_, _, d)| *d == direction)
            .filter_map(|(node_id, port, _)| {
                self.nodes
                    .get(node_id)
                    .map(|node| format!("{}:{}", node, port))
            })
            .collect()
    }
}

/// `PulseCli` with registry-based port listing
pub struct RegistryServer {
    cli: PulseCli,
    roundtrip: Duration,
}

impl RegistryServer {
    pub fn new() -> Self {
        PIPEWIRE_INIT.call_once(|| {
            pipewire::init();
        });
        Self {
            cli: PulseCli::new(),
            roundtrip: Duration::from_millis(100),
        }
    }

    fn snapshot(&self) -> Result<Snapshot, ServerError> {
        let pw_err = |what: &str, e: pipewire::Error| {
            ServerError::Parse(format!("{}: {}", what, e))
        };

        let snapshot = Rc::new(RefCell::new(Snapshot::default()));

        let mainloop = MainLoopRc::new(None)
            .map_err(|e| pw_err("Failed to create PipeWire main loop", e))?;
        let context = ContextRc::new(&mainloop, None)
            .map_err(|e| pw_err("Failed to create PipeWire context", e))?;
        let core = context
            .connect_rc(None)
            .map_err(|e| pw_err("Failed to connect to PipeWire", e))?;
        let registry = core
            .get_registry_rc()
            .map_err(|e| pw_err("Failed to get PipeWire registry", e))?;

        let snapshot_clone = snapshot.clone();
        let _listener = registry
            .add_listener_local()
            .global(move |global| {
                record_global(&snapshot_clone, global);
            })
            .register();

        let mainloop_weak = mainloop.downgrade();
        let timer = mainloop.loop_().add_timer(move |_| {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        });
        timer
            .update_timer(Some(self.roundtrip), None)
            .into_result()
            .map_err(|e| ServerError::Parse(format!("Failed to set timer: {}", e)))?;

        mainloop.run();

        let result = snapshot.take();
        Ok(result)
    }
}

impl Default for RegistryServer {
    fn default() -> Self {
        Self::new()
    }
}

fn record_global<P: AsRef<pipewire::spa::utils::dict::DictRef>>(
    snapshot: &Rc<RefCell<Snapshot>>,
    global: &GlobalObject<P>,
) {
    let props = match &global.props {
        Some(p) => p.as_ref(),
        None => return,
    };

    match global.type_ {
        ObjectType::Node => {
            if let Some(name) = props.get(*pipewire::keys::NODE_NAME) {
                snapshot
                    .borrow_mut()
                    .nodes
                    .insert(global.id, name.to_string());
            }
        }
        ObjectType::Port => {
            let node_id = props
                .get(*pipewire::keys::NODE_ID)
                .and_then(|s| s.parse().ok());
            let name = props.get(*pipewire::keys::PORT_NAME);
            let direction = match props.get(*pipewire::keys::PORT_DIRECTION) {
                Some("in") => Direction::In,
                _ => Direction::Out,
            };
            if let (Some(node_id), Some(name)) = (node_id, name) {
                snapshot
                    .borrow_mut()
                    .ports
                    .push((node_id, name.to_string(), direction));
            }
        }
        _ => {}
    }
}

impl AudioServer for RegistryServer {
    fn list_sources(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        self.cli.list_sources()
    }

    fn list_sinks(&self) -> Result<Vec<DeviceInfo>, ServerError> {
        self.cli.list_sinks()
    }

    fn default_sink(&self) -> Result<Option<String>, ServerError> {
        self.cli.default_sink()
    }

    fn output_ports(&self) -> Result<Vec<String>, ServerError> {
        Ok(self.snapshot()?.port_ids(Direction::Out))
    }

    fn input_ports(&self) -> Result<Vec<String>, ServerError> {
        Ok(self.snapshot()?.port_ids(Direction::In))
    }

    fn links(&self) -> Result<Vec<(String, String)>, ServerError> {
        self.cli.links()
    }

    fn load_null_sink(&self, name: &str, description: &str) -> Result<ModuleHandle, ServerError> {
        self.cli.load_null_sink(name, description)
    }

    fn unload_module(&self, handle: ModuleHandle) -> Result<(), ServerError> {
        self.cli.unload_module(handle)
    }

    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        self.cli.connect(output, input)
    }

    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        self.cli.disconnect(output, input)
    }

    fn set_volume(&self, target: &VolumeTarget, volume: Percent) -> Result<(), ServerError> {
        self.cli.set_volume(target, volume)
    }
}
