//! Keyboard controls while a session runs
//!
//! Lines typed on stdin: `m` toggles monitoring, `q` stops.

use log::debug;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    ToggleMonitor,
    Quit,
}

impl Control {
    pub fn parse(line: &str) -> Option<Control> {
        match line.trim().to_ascii_lowercase().as_str() {
            "m" | "monitor" => Some(Control::ToggleMonitor),
            "q" | "quit" => Some(Control::Quit),
            _ => None,
        }
    }
}

/// Read controls from stdin on a background thread
pub fn spawn_stdin_reader() -> Receiver<Control> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match Control::parse(&line) {
                Some(control) => {
                    if sender.send(control).is_err() {
                        break;
                    }
                }
                None => debug!("Ignoring input '{}'", line.trim()),
            }
        }
    });
    receiver
}
