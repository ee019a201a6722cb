use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam::channel;
use foundation_simulations::{EventStream, SimulationConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::BoxedError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Adds the options every simulation subcommand shares.
pub fn with_run_args(command: clap::Command) -> clap::Command {
    command
        .arg(
            clap::Arg::new("config")
                .long("config")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::Arg::new("seconds")
                .long("seconds")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("speed")
                .long("speed")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(f64))
                .default_value("1.0"),
        )
        .arg(
            clap::Arg::new("log-level")
                .long("log-level")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(Level))
                .default_value("info"),
        )
}

pub struct RunOptions {
    pub config: SimulationConfig,
    pub duration: Option<Duration>,
}

/// Installs logging, then loads, scales and validates the configuration.
pub fn prepare(args: &clap::ArgMatches) -> std::result::Result<RunOptions, BoxedError> {
    let level = args
        .get_one::<Level>("log-level")
        .copied()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let speed = args.get_one::<f64>("speed").copied().unwrap_or(1.0);
    if !speed.is_finite() || speed < 0.0 {
        return Err(format!("--speed must be a non-negative number, got {speed}").into());
    }

    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            SimulationConfig::from_path(path.clone())?
        }
        None => SimulationConfig::default(),
    }
    .scaled(speed);
    config.validate()?;

    Ok(RunOptions {
        config,
        duration: args.get_one::<u64>("seconds").copied().map(Duration::from_secs),
    })
}

/// Prints every event until the run duration elapses or Ctrl-C arrives.
pub fn watch<E: std::fmt::Debug>(
    events: &EventStream<E>,
    duration: Option<Duration>,
) -> std::result::Result<(), BoxedError> {
    let (stop_sender, stop_receiver) = channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_sender.try_send(());
    })?;

    let deadline = duration.map(|duration| Instant::now() + duration);
    loop {
        if stop_receiver.try_recv().is_ok() {
            tracing::info!("interrupted, shutting down");
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::info!("run duration elapsed, shutting down");
            break;
        }
        if let Some(event) = events.next_timeout(POLL_INTERVAL) {
            println!("{event:?}");
        }
    }
    Ok(())
}

/// Prints whatever the engine emitted while shutting down.
pub fn flush<E: std::fmt::Debug>(events: EventStream<E>) {
    for event in events {
        println!("{event:?}");
    }
}
