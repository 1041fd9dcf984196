//! homelink - home-automation controller daemon
//!
//! Wires the settings store and the MQTT session manager together and drives
//! the session from a fixed-period control loop until a shutdown signal.

use clap::{Parser, Subcommand};
use homelink::config::{ConfigError, ControllerConfig};
use homelink::error::ControllerResult;
use homelink::link::RumqttLink;
use homelink::observability::init_default_logging;
use homelink::session::SessionManager;
use homelink::settings::SettingsStore;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Control-loop period; each iteration runs one bounded session tick.
const LOOP_PERIOD: Duration = Duration::from_millis(50);

/// Home-automation controller connectivity daemon
#[derive(Parser)]
#[command(name = "homelink")]
#[command(about = "MQTT connectivity core for a home-automation controller")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller loop
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting homelink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_controller(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Controller shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ControllerConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ControllerConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = vec!["homelink.toml", "config/homelink.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(ControllerConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create homelink.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_controller(config: ControllerConfig) -> ControllerResult<()> {
    info!(device_id = %config.device.id, "controller starting");

    let mut store = SettingsStore::new(&config.settings.path);
    store.load();
    let store = Arc::new(Mutex::new(store));

    let link = RumqttLink::new(config.broker.clone());
    let mut session = SessionManager::new(link, config.session_options());
    if !session.begin() {
        return Err(ConfigError::InvalidConfig("session wiring failed".to_string()).into());
    }

    // Handlers run inside tick() and cannot publish through the session they
    // are dispatched from; they raise this flag and the control loop answers
    // with the current settings snapshot after the tick.
    let announce_settings = Arc::new(AtomicBool::new(false));

    register_settings_handlers(&mut session, &config.device.id, &store, &announce_settings).await;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut ticker = tokio::time::interval(LOOP_PERIOD);

    info!("controller loop running");

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                break;
            }
            _ = ticker.tick() => {
                session.tick().await;

                if announce_settings.swap(false, Ordering::SeqCst) {
                    publish_settings_state(&mut session, &store).await;
                }
            }
        }
    }

    Ok(())
}

/// Register the controller's inbound settings topics:
/// `<device>/settings/set` merges a JSON patch and persists it,
/// `<device>/settings/get` requests the current snapshot.
async fn register_settings_handlers(
    session: &mut SessionManager<RumqttLink>,
    device_id: &str,
    store: &Arc<Mutex<SettingsStore>>,
    announce: &Arc<AtomicBool>,
) {
    let set_topic = format!("{device_id}/settings/set");
    let get_topic = format!("{device_id}/settings/get");

    let set_store = store.clone();
    let set_announce = announce.clone();
    session
        .add_handler(&set_topic, move |_topic: &str, payload: &[u8]| {
            let Ok(patch) = std::str::from_utf8(payload) else {
                warn!("settings update was not valid UTF-8");
                return;
            };

            let Ok(mut guard) = set_store.lock() else {
                error!("settings store lock poisoned");
                return;
            };

            match guard.merge_json(patch) {
                Ok(()) => {
                    if let Err(err) = guard.save() {
                        warn!(error = %err, "settings updated but not persisted");
                    }
                    set_announce.store(true, Ordering::SeqCst);
                }
                Err(err) => warn!(error = %err, "settings update rejected"),
            }
        })
        .await;

    let get_announce = announce.clone();
    session
        .add_handler(&get_topic, move |_topic: &str, _payload: &[u8]| {
            get_announce.store(true, Ordering::SeqCst);
        })
        .await;
}

async fn publish_settings_state(
    session: &mut SessionManager<RumqttLink>,
    store: &Arc<Mutex<SettingsStore>>,
) {
    let snapshot = match store.lock() {
        Ok(guard) => guard.get().clone(),
        Err(_) => {
            error!("settings store lock poisoned");
            return;
        }
    };

    if !session.publish_json("settings/state", &snapshot).await {
        warn!("settings snapshot not published");
    }
}

fn handle_config_command(
    config: ControllerConfig,
    show: bool,
) -> ControllerResult<()> {
    if show {
        println!("Current configuration:");
        match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => warn!(error = %err, "configuration not renderable"),
        }
    }

    info!("Configuration validation complete");
    Ok(())
}
