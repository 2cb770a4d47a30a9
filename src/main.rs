//! # DS4 Lightbar
//!
//! Daemon that keeps DualShock 4 light bars configured and warns about low
//! batteries.
//!
//! Usage: `ds4-lightbar [config-path]` (defaults to `config.toml`).

use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::interval;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use ds4_lightbar::config::{Config, LedConfig, LoggingConfig};
use ds4_lightbar::controller::{ControllerEntry, ControllerEvent, ControllerRegistry, RegistrySettings};
use ds4_lightbar::error::Ds4Error;
use ds4_lightbar::hid::HidApiBackend;
use ds4_lightbar::led::LedEffectType;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// File name prefix of the daily rolling log
const LOG_FILE_PREFIX: &str = "ds4-lightbar.log";

/// Main entry point for the DS4 Lightbar daemon
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (defaults if the file does not exist)
///    - Set up logging, optionally to a daily rolling file
///    - Open `hidapi` and create the controller registry
///
/// 2. **Main Loop**
///    - Every scan interval: connect new controllers, retire dead ones,
///      poll batteries and re-evaluate low battery warnings
///    - Apply the configured light bar to every newly connected controller
///
/// 3. **Graceful Shutdown**
///    - On Ctrl+C stop all effects and alerts, switch light bars off and
///      close every device handle
///
/// # Errors
///
/// Returns error if:
/// - The configuration file exists but is invalid
/// - `hidapi` cannot be initialised
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, found) = load_config(&config_path)?;

    let _log_guard = init_logging(&config.logging);

    info!("DS4 Lightbar v{} starting...", env!("CARGO_PKG_VERSION"));
    if found {
        info!("Configuration loaded from {}", config_path);
    } else {
        warn!("{} not found, using default configuration", config_path);
    }

    let backend = HidApiBackend::new()?;
    let registry = Arc::new(ControllerRegistry::new(
        Box::new(backend),
        RegistrySettings::from(&config),
    )?);

    let events = tokio::spawn(handle_events(
        registry.clone(),
        registry.subscribe(),
        config.led.clone(),
    ));

    let mut cycle = interval(config.scan_interval());
    info!("Scanning for controllers every {} ms", config.scan.interval_ms);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = cycle.tick() => {
                let count = registry.scan_and_connect();
                registry.cleanup_disconnected().await;
                registry.poll_batteries().await;
                debug!("{} controller(s) tracked", count);
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    registry.shutdown().await;
    events.abort();

    Ok(())
}

/// Load the configuration, falling back to defaults when the file is missing
///
/// Returns the configuration and whether the file was found.
fn load_config(path: &str) -> Result<(Config, bool)> {
    match Config::load(path) {
        Ok(config) => Ok((config, true)),
        Err(Ds4Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok((Config::default(), false)),
        Err(e) => Err(e.into()),
    }
}

/// Console logging, plus a daily rolling file when `log_dir` is set
///
/// `RUST_LOG` overrides the configured level. The returned guard must be
/// kept alive so buffered file output is flushed on exit.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Some(guard)
}

/// Log every event and configure the light bar of new controllers
async fn handle_events(
    registry: Arc<ControllerRegistry>,
    mut events: broadcast::Receiver<ControllerEvent>,
    led: LedConfig,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event handler lagged, {} event(s) skipped", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match &event {
            ControllerEvent::Connected(record) => {
                if let Some(entry) = registry.get(record.id()) {
                    apply_led_config(&entry, &led).await;
                }
            }
            ControllerEvent::BatteryChanged { id, percent, charging } => {
                debug!("{}: battery {}%{}", id, percent, if *charging { " (charging)" } else { "" });
                if let Some(entry) = registry.get(id) {
                    if entry.effects().current_effect() == LedEffectType::HealthBar {
                        entry.effects().set_health_percentage(*percent);
                    }
                }
            }
            ControllerEvent::LowBatteryNotification {
                display_name, percent, ..
            } => {
                warn!("{}: battery low ({}%), please charge", display_name, percent);
            }
            other => debug!("Event: {:?}", other),
        }
    }
}

/// Apply the `[led]` section to a freshly connected controller
async fn apply_led_config(entry: &ControllerEntry, led: &LedConfig) {
    match led.effect {
        LedEffectType::None => {
            if !entry.led().set_led_color(led.color, 0, false) {
                warn!("{}: could not set light bar color", entry.id());
            }
        }
        LedEffectType::Breathing => entry.effects().start_breathing_with_color(led.color).await,
        effect => {
            entry.effects().set_base_color(led.color);
            entry.effects().start_effect(effect).await;
        }
    }
}
