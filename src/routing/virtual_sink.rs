//! Null sinks used as mixing points
//!
//! A sink we create is unloaded again by us, at the latest when the owning
//! `VirtualSinks` is dropped. A sink that already existed is reused and
//! never unloaded.

use crate::models::ModuleHandle;
use crate::server::{AudioServer, ServerError};
use log::{info, warn};
use std::sync::Arc;

/// A named mixing sink and, if we loaded it, its module handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEndpoint {
    pub name: String,
    pub handle: Option<ModuleHandle>,
}

impl VirtualEndpoint {
    pub fn is_owned(&self) -> bool {
        self.handle.is_some()
    }

    /// Name of the source carrying what is played into this sink
    pub fn monitor_source(&self) -> String {
        format!("{}.monitor", self.name)
    }
}

pub struct VirtualSinks {
    server: Arc<dyn AudioServer>,
    owned: Vec<(String, ModuleHandle)>,
}

impl VirtualSinks {
    pub fn new(server: Arc<dyn AudioServer>) -> Self {
        Self {
            server,
            owned: Vec::new(),
        }
    }

    /// Find the sink called `name`, or create it
    pub fn ensure(&mut self, name: &str) -> Result<VirtualEndpoint, ServerError> {
        let exists = self.server.list_sinks()?.iter().any(|s| s.name == name);
        if exists {
            info!("Virtual sink '{}' already exists", name);
            return Ok(VirtualEndpoint {
                name: name.to_string(),
                handle: None,
            });
        }

        let handle = self.server.load_null_sink(name, name)?;
        info!("Created virtual sink: {} (module {})", name, handle);
        self.owned.push((name.to_string(), handle));

        Ok(VirtualEndpoint {
            name: name.to_string(),
            handle: Some(handle),
        })
    }

    /// Unload one sink we created. Failures are logged and swallowed.
    pub fn destroy(&mut self, handle: ModuleHandle) {
        let Some(index) = self.owned.iter().position(|(_, h)| *h == handle) else {
            warn!("Refusing to unload module {} we did not load", handle);
            return;
        };
        let (name, handle) = self.owned.remove(index);
        match self.server.unload_module(handle) {
            Ok(()) => info!("Removed virtual sink {}", name),
            Err(e) => warn!("Failed to remove virtual sink {}: {}", name, e),
        }
    }

    /// Unload every sink we created, newest first
    pub fn destroy_all(&mut self) {
        while let Some((_, handle)) = self.owned.last().cloned() {
            self.destroy(handle);
        }
    }

    #[cfg(test)]
    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }
}

impl Drop for VirtualSinks {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
