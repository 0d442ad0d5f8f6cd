//! Ctrl+C handling
//!
//! A small Tokio runtime listens for SIGINT in the background. The first
//! interrupt asks the foreground loop to stop; while cleanup is running,
//! interrupts are masked so the fade-out always completes.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

pub struct Interrupts {
    _runtime: Runtime,
    requested: Arc<AtomicBool>,
    masked: Arc<AtomicBool>,
}

impl Interrupts {
    /// Install the SIGINT listener
    pub fn install() -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("tapmix-signals")
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create Tokio runtime: {}", e))?;

        let requested = Arc::new(AtomicBool::new(false));
        let masked = Arc::new(AtomicBool::new(false));

        let task_requested = requested.clone();
        let task_masked = masked.clone();
        runtime.spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }
                if task_masked.load(Ordering::SeqCst) {
                    warn!("Interrupt ignored while cleaning up");
                } else if task_requested.swap(true, Ordering::SeqCst) {
                    info!("Already stopping...");
                } else {
                    println!("\nStopping...");
                }
            }
        });

        Ok(Self {
            _runtime: runtime,
            requested,
            masked,
        })
    }

    /// Has a stop been requested?
    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Ask the foreground loop to stop, as Ctrl+C would
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Flag shared with other threads (e.g. the stdin reader)
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.requested.clone()
    }

    /// Ignore interrupts until the guard is dropped
    pub fn mask(&self) -> MaskGuard {
        let previous = self.masked.swap(true, Ordering::SeqCst);
        MaskGuard {
            masked: self.masked.clone(),
            previous,
        }
    }
}

pub struct MaskGuard {
    masked: Arc<AtomicBool>,
    previous: bool,
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        self.masked.store(self.previous, Ordering::SeqCst);
    }
}
