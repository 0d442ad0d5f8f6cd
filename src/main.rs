//! Tapmix - mix, monitor and record several audio inputs on Linux
//!
//! This is the main entry point for the tapmix command.

mod cli;
mod controls;
mod fade;
mod interrupt;
mod models;
mod monitor;
mod process;
mod recording;
mod routing;
mod server;
mod session;
mod settings;

use anyhow::{bail, Context};
use clap::Parser;
use cli::{Backend, Command, MonitorArgs, RecordArgs};
use controls::Control;
use interrupt::Interrupts;
use log::{info, warn};
use models::MonitoringState;
use routing::EndpointDirectory;
use server::{AudioServer, PulseCli};
use session::{Session, SessionSources};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const LOOP_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    info!("Starting tapmix");

    let server = open_server(args.backend)?;
    match &args.command {
        Command::List => list_devices(&EndpointDirectory::new(server)),
        Command::Monitor(monitor) => run_monitor(server, monitor),
        Command::Record(record) => run_record(server, record),
    }
}

fn open_server(backend: Backend) -> anyhow::Result<Arc<dyn AudioServer>> {
    match backend {
        Backend::Pulse => Ok(Arc::new(PulseCli::new())),
        #[cfg(feature = "registry")]
        Backend::Registry => Ok(Arc::new(server::RegistryServer::new())),
        #[cfg(not(feature = "registry"))]
        Backend::Registry => bail!("tapmix was built without the `registry` feature"),
    }
}

fn list_devices(directory: &EndpointDirectory) -> anyhow::Result<()> {
    let sources = directory.list_sources().context("Failed to list sources")?;
    let sinks = directory.list_sinks().context("Failed to list sinks")?;
    let default_sink = directory.default_sink().unwrap_or_default();

    println!("Sources:");
    for source in &sources {
        println!("  [{}] {} ({})", source.index, source.label(), source.name);
    }
    println!("\nSinks:");
    for sink in &sinks {
        let marker = if default_sink.as_deref() == Some(sink.name.as_str()) {
            " *"
        } else {
            ""
        };
        println!("  [{}] {} ({}){}", sink.index, sink.label(), sink.name, marker);
    }
    Ok(())
}

fn run_monitor(server: Arc<dyn AudioServer>, args: &MonitorArgs) -> anyhow::Result<()> {
    let interrupts = Interrupts::install().map_err(anyhow::Error::msg)?;
    let config = args.routing.session_config(true);
    let watch_mirror = config.with_mirror;
    let mut session = Session::new(server, config);

    println!("Setting up audio routing...");
    let sources = match session.setup() {
        Ok(sources) => sources,
        Err(e) => {
            finish(&mut session, &interrupts);
            return Err(e).context("Setup failed");
        }
    };
    print_sources(&session, &sources);

    let controls = controls::spawn_stdin_reader();
    println!("\nMonitoring. Type m + Enter to toggle, q + Enter or Ctrl+C to stop.");

    let mirror_expected = watch_mirror && sources.mirror.is_some();
    while !interrupts.requested() {
        thread::sleep(LOOP_INTERVAL);
        handle_controls(&controls, &mut session, &interrupts);

        if mirror_expected && !session.mirror_running() {
            warn!("Mirror exited unexpectedly");
            println!("\nMirror stopped.");
            break;
        }
    }

    finish(&mut session, &interrupts);
    Ok(())
}

fn run_record(server: Arc<dyn AudioServer>, args: &RecordArgs) -> anyhow::Result<()> {
    let interrupts = Interrupts::install().map_err(anyhow::Error::msg)?;
    let config = args.routing.session_config(!args.no_monitor);
    let mirror_node = config.mirror_node.clone();
    let mut session = Session::new(server, config);

    println!("Setting up audio routing...");
    let sources = match session.setup() {
        Ok(sources) => sources,
        Err(e) => {
            finish(&mut session, &interrupts);
            return Err(e).context("Setup failed");
        }
    };
    print_sources(&session, &sources);

    let targets = recording::select_targets(&sources, args.selection(), &mirror_node);
    if targets.is_empty() {
        finish(&mut session, &interrupts);
        bail!("No sources available to record");
    }

    let controls = controls::spawn_stdin_reader();
    println!(
        "\nRecording for {:.1}s to {}. Type m + Enter to toggle monitoring, q + Enter or Ctrl+C to stop.",
        args.duration().as_secs_f64(),
        args.output.display()
    );

    let stop = interrupts.flag();
    let result = recording::record(&targets, args.duration(), &args.output, &stop, || {
        handle_controls(&controls, &mut session, &interrupts)
    });

    finish(&mut session, &interrupts);

    let files = result.map_err(anyhow::Error::msg)?;
    println!("\nSaved files:");
    for file in recording::summarize(&files) {
        match file.duration_seconds {
            Some(seconds) => println!(
                "  {}: {} ({:.1} KiB, {:.1}s)",
                file.label,
                file.path.display(),
                file.size_kib(),
                seconds
            ),
            None => println!(
                "  {}: {} ({:.1} KiB)",
                file.label,
                file.path.display(),
                file.size_kib()
            ),
        }
    }
    Ok(())
}

fn print_sources(session: &Session, sources: &SessionSources) {
    if let Some(mix) = session.mix() {
        let origin = if mix.is_owned() { "created" } else { "existing" };
        info!("Mix sink {} ({}), {} links", mix.name, origin, session.link_count());
    }

    let show = |label: &str, value: Option<&str>| {
        println!("  {:<8} {}", label, value.unwrap_or("(none)"));
    };
    show("synth:", sources.capture.as_deref());
    show("mic:", sources.mirror.as_deref());
    show("mix:", sources.mix.as_deref());
    show("output:", session.default_output());
    if session.monitoring_state() == MonitoringState::Enabled {
        println!("  monitoring on");
    }
}

fn handle_controls(controls: &Receiver<Control>, session: &mut Session, interrupts: &Interrupts) {
    while let Ok(control) = controls.try_recv() {
        match control {
            Control::ToggleMonitor => match session.toggle_monitoring() {
                MonitoringState::Enabled => println!("Monitoring on"),
                MonitoringState::Disabled => println!("Monitoring off"),
            },
            Control::Quit => interrupts.request(),
        }
    }
}

fn finish(session: &mut Session, interrupts: &Interrupts) {
    let _mask = interrupts.mask();
    println!("Cleaning up...");
    session.cleanup();
    println!("Done.");
}
