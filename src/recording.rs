//! Recording to WAV files with one `pw-record` per target
//!
//! Files are named `<timestamp>_<label>.wav` inside the output directory.

use crate::process::{self, ManagedProcess};
use crate::session::SessionSources;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const RECORDER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Which of the session's sources to record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetSelection {
    /// Every available source into its own file
    #[default]
    All,
    MixOnly,
    CaptureOnly,
    MirrorOnly,
}

/// Map of file label to recording target
pub fn select_targets(
    sources: &SessionSources,
    selection: TargetSelection,
    mirror_node: &str,
) -> BTreeMap<String, String> {
    let mut targets = BTreeMap::new();
    let mut add = |label: &str, target: Option<&str>| {
        if let Some(target) = target {
            targets.insert(label.to_string(), target.to_string());
        }
    };

    match selection {
        TargetSelection::MixOnly => add("mix", sources.mix.as_deref()),
        TargetSelection::CaptureOnly => add("synth", sources.capture.as_deref()),
        // Recorded straight from the mirror's stream node
        TargetSelection::MirrorOnly => add("mic", Some(mirror_node)),
        TargetSelection::All => {
            add("synth", sources.capture.as_deref());
            add("mic", sources.mirror.as_deref());
            add("mix", sources.mix.as_deref());
        }
    }

    targets
}

/// Path of the file for one target
pub fn output_path(output_dir: &Path, timestamp: &str, label: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.wav", timestamp, label))
}

/// Timestamp prefix for files started now
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Record every target with `pw-record` until `duration` elapses or `stop` is set
pub fn record(
    targets: &BTreeMap<String, String>,
    duration: Duration,
    output_dir: &Path,
    stop: &AtomicBool,
    tick: impl FnMut(),
) -> Result<BTreeMap<String, PathBuf>, String> {
    record_with(targets, duration, output_dir, stop, tick, process::start_recorder)
}

/// Like `record`, with the recorder launcher supplied by the caller
pub fn record_with<L>(
    targets: &BTreeMap<String, String>,
    duration: Duration,
    output_dir: &Path,
    stop: &AtomicBool,
    mut tick: impl FnMut(),
    mut launch: L,
) -> Result<BTreeMap<String, PathBuf>, String>
where
    L: FnMut(&str, &str, &Path) -> Result<ManagedProcess, String>,
{
    std::fs::create_dir_all(output_dir)
        .map_err(|e| format!("Failed to create output directory: {}", e))?;

    let timestamp = timestamp_now();
    let mut recorders: Vec<ManagedProcess> = Vec::new();
    let mut files = BTreeMap::new();

    for (label, target) in targets {
        let path = output_path(output_dir, &timestamp, label);
        println!("  Recording {} from '{}' -> {}", label, target, path.display());
        match launch(label, target, &path) {
            Ok(recorder) => {
                recorders.push(recorder);
                files.insert(label.clone(), path);
            }
            Err(e) => warn!("Could not record {}: {}", label, e),
        }
    }

    if recorders.is_empty() {
        return Err("No targets to record".to_string());
    }

    let start = Instant::now();
    while start.elapsed() < duration && !stop.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL.min(duration.saturating_sub(start.elapsed())));
        tick();

        recorders.retain_mut(|recorder| {
            let alive = recorder.is_running();
            if !alive {
                warn!("{} recording stopped unexpectedly", recorder.label());
            }
            alive
        });
        if recorders.is_empty() {
            break;
        }
    }

    for recorder in &mut recorders {
        recorder.stop(RECORDER_STOP_TIMEOUT);
        info!("{} done", recorder.label());
    }

    println!("\nRecorded {:.1} seconds", start.elapsed().as_secs_f64());
    Ok(files)
}

/// What ended up on disk for one target
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub label: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// From the WAV header, if it could be read
    pub duration_seconds: Option<f64>,
}

impl SavedFile {
    pub fn size_kib(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

/// Inspect recorded files, skipping any that were never written
pub fn summarize(files: &BTreeMap<String, PathBuf>) -> Vec<SavedFile> {
    files
        .iter()
        .filter_map(|(label, path)| {
            let metadata = std::fs::metadata(path).ok()?;
            Some(SavedFile {
                label: label.clone(),
                path: path.clone(),
                size_bytes: metadata.len(),
                duration_seconds: wav_duration(path),
            })
        })
        .collect()
}

fn wav_duration(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}
