use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libevio_blockparser::config::Config;
use libevio_blockparser::process::process;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn cli() -> Command {
    Command::new("evio_blockparser_cli")
        .about("Index, check and unblock CODA EVIO files")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Write a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Show debug logging"),
        )
}

/// Route log lines through the progress bars so the two do not garble each other
fn init_logging(verbose: bool) -> Result<MultiProgress, log::SetLoggerError> {
    let level = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let bars = MultiProgress::new();
    LogWrapper::new(bars.clone(), logger).try_init()?;
    Ok(bars)
}

fn load_config(path: &Path) -> Option<Config> {
    let config = match Config::read_config_file(path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return None;
        }
    };
    if config.unblock && !config.is_output_capacity_valid() {
        log::error!(
            "An output buffer of {} words cannot hold an unblocked event",
            config.output_capacity_words
        );
        return None;
    }

    log::info!("Reading {}", config.evio_path.to_string_lossy());
    log::info!("Summary goes to {}", config.summary_path.to_string_lossy());
    for bank in &config.banks {
        log::info!(
            "ROC {} bank {}: {:?}{}",
            bank.roc_id,
            bank.bank_id,
            bank.kind,
            if bank.swap { " (swapped)" } else { "" }
        );
    }
    if config.ignore_undefined_banks {
        log::info!("Banks not listed above are ignored");
    }
    if config.unblock {
        log::info!(
            "Unblocking into {} words, {:?} byte order",
            config.output_capacity_words,
            config.output_endian
        );
    }
    if let Some(max) = config.max_events {
        log::info!("Stopping after {max} events");
    }
    Some(config)
}

/// Run the processing on a worker thread, mirroring its status onto `bar`
fn run(config: Config, bar: &ProgressBar) -> ExitCode {
    let status = Arc::new(Mutex::new(0.0_f32));
    let worker_status = Arc::clone(&status);
    let handle = std::thread::spawn(move || process(config, worker_status));

    while !handle.is_finished() {
        std::thread::sleep(POLL_INTERVAL);
        if let Ok(fraction) = status.lock() {
            bar.set_position((*fraction * 100.0) as u64);
        }
    }
    bar.finish();

    match handle.join() {
        Ok(Ok(())) => {
            log::info!("Finished.");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
        Err(_) => {
            log::error!("The processing thread panicked");
            ExitCode::FAILURE
        }
    }
}

fn make_template(path: &Path) -> ExitCode {
    log::info!("Writing a template config to {}", path.to_string_lossy());
    match Config::default().write_config_file(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn scan(bars: &MultiProgress, config_path: &Path) -> ExitCode {
    let Some(config) = load_config(config_path) else {
        return ExitCode::FAILURE;
    };

    let bar = bars.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {elapsed}") {
        bar.set_style(style);
    }
    run(config, &bar)
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let bars = match init_logging(matches.get_flag("verbose")) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("Could not set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required");
        return ExitCode::FAILURE;
    };

    match matches.subcommand() {
        Some(("new", _)) => make_template(&config_path),
        _ => scan(&bars, &config_path),
    }
}
