//! Service orchestrator - Entry Point
//!
//! Deploys tenant services as Nomad jobs and reconciles their status.

use std::collections::HashMap;
use std::env;

use svcorch::app::options::AppOptions;
use svcorch::app::run::run;
use svcorch::filesys::file::File;
use svcorch::logs::{init_logging, LogOptions};
use svcorch::storage::layout::StorageLayout;
use svcorch::storage::settings::Settings;
use svcorch::version;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("svcorch {}", version::label());
        return;
    }

    let layout = match cli_args.get("base-dir") {
        Some(base_dir) => StorageLayout::new(base_dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file; a missing default file means defaults
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let mut settings = if settings_file.exists().await || cli_args.contains_key("config") {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!(
                    "Unable to read settings file {}: {}",
                    settings_file.path().display(),
                    e
                );
                std::process::exit(1);
            }
        }
    } else {
        Settings::default()
    };
    settings.apply_env(|name| env::var(name).ok());

    if cli_args.contains_key("check-config") {
        println!("Configuration OK: {}", settings_file.path().display());
        return;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log.json,
        log_dir: settings.log.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the orchestrator
    let options = AppOptions::from_settings(&settings, layout);

    info!("Running service orchestrator with options: {:?}", options);
    let result = run(version::label(), options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the orchestrator: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
