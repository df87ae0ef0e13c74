//! Control Tower
//!
//! Run with: cargo run -- [--once] [--test-alerts] [--dashboard] [--diagnostics]
//!
//! Configuration comes from `CONTROL_TOWER_*` environment variables, optionally
//! loaded from a `.env` file:
//! - CONTROL_TOWER_DB_PATH: SQLite database file (default: sensor_data.db)
//! - CONTROL_TOWER_INTERVAL_SECS: Seconds between cycles (default: 5)
//! - CONTROL_TOWER_TEMP_MIN / CONTROL_TOWER_TEMP_MAX: °C (default: 15 / 35)
//! - CONTROL_TOWER_HUMIDITY_MIN / CONTROL_TOWER_HUMIDITY_MAX: % (default: 30 / 70)
//! - CONTROL_TOWER_LIGHT_MIN: lux (default: 70)
//! - CONTROL_TOWER_ALERTS_ENABLED: Master switch for alerts (default: true)
//! - CONTROL_TOWER_ALERT_COOLDOWN_SECS: Repeat-alert cooldown (default: 300)
//! - CONTROL_TOWER_EMAIL_TO / CONTROL_TOWER_EMAIL_WEBHOOK: Email recipient and relay
//! - CONTROL_TOWER_SMS_TO / CONTROL_TOWER_SMS_WEBHOOK: SMS recipient and relay
//! - CONTROL_TOWER_WEBHOOK_TIMEOUT_SECS: Bound on each relay request (default: 10)
//! - CONTROL_TOWER_DASHBOARD_HOST / CONTROL_TOWER_DASHBOARD_PORT (default: 127.0.0.1:8080)
//! - CONTROL_TOWER_LOG_FILE: Also write logs to this file
//! - RUST_LOG: Log level (default: info)

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use control_tower::alerts::{AlertDispatcher, RelayChannel};
use control_tower::api::{run_dashboard, AppState, DashboardConfig};
use control_tower::config::AppConfig;
use control_tower::monitor::{shutdown_channel, Monitor, RunMode};
use control_tower::sensor::{FixtureSensor, SensorSource, SimulatedSensor};
use control_tower::storage::{ReadingStore, SqliteReadingStore};

/// Control Tower monitoring system
#[derive(Parser)]
#[command(name = "control-tower")]
#[command(about = "Environmental monitoring loop with threshold alerts")]
#[command(version)]
struct Cli {
    /// Validate configuration, print a summary and exit
    #[arg(long)]
    diagnostics: bool,

    /// Run one sensor cycle and exit
    #[arg(long)]
    once: bool,

    /// Use fixed out-of-range sensor values to exercise the alert path
    #[arg(long)]
    test_alerts: bool,

    /// Serve the read-only dashboard while monitoring
    #[arg(long)]
    dashboard: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let _log_guard = init_logging(config.as_ref().ok().and_then(|c| c.log_file.as_deref()));
    let config = config.inspect_err(|e| tracing::error!(error = %e, "Configuration error"))?;

    if cli.diagnostics {
        return run_diagnostics(&config);
    }

    config.validate()?;

    // The loop must not run without a store
    let store = Arc::new(SqliteReadingStore::open_initialized(&config.db_path)?);
    tracing::info!(path = %config.db_path.display(), "Reading store ready");

    let sensor: Arc<dyn SensorSource> = if cli.test_alerts {
        tracing::warn!("Test mode: using fixed out-of-range sensor values");
        Arc::new(FixtureSensor::alert_test())
    } else {
        Arc::new(SimulatedSensor::new())
    };

    let mut dispatcher = AlertDispatcher::new(config.alerts.clone());
    if let Some(email) = &config.email {
        dispatcher = dispatcher.with_channel(Arc::new(
            RelayChannel::email(email.recipient.clone(), email.transport())
                .with_timeout(config.webhook_timeout),
        ));
    }
    if let Some(sms) = &config.sms {
        dispatcher = dispatcher.with_channel(Arc::new(
            RelayChannel::sms(sms.recipient.clone(), sms.transport())
                .with_timeout(config.webhook_timeout),
        ));
    }
    if dispatcher.channel_names().is_empty() {
        tracing::warn!("No notification channels configured, alerts will not leave this process");
    }

    let mode = if cli.once {
        RunMode::SingleCycle
    } else {
        RunMode::Continuous
    };

    let (handle, signal) = shutdown_channel();
    let handle = Arc::new(handle);
    {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move {
            wait_for_interrupt().await;
            tracing::info!("Shutdown requested");
            handle.trigger();
        });
    }

    let dashboard = if cli.dashboard {
        let state = Arc::new(AppState {
            store: store.clone() as Arc<dyn ReadingStore>,
            thresholds: config.thresholds,
            alerts: config.alerts.clone(),
            channels: dispatcher.channel_names(),
        });
        let dashboard_config = DashboardConfig {
            host: config.dashboard_host.clone(),
            port: config.dashboard_port,
        };
        Some(tokio::spawn(run_dashboard(
            dashboard_config,
            state,
            signal.clone(),
        )))
    } else {
        None
    };

    println!(
        r#"
  Control Tower {}
  Monitoring temperature, humidity and light
"#,
        env!("CARGO_PKG_VERSION")
    );

    let monitor = Monitor::new(sensor, store, config.thresholds, dispatcher)
        .with_interval(config.interval)
        .with_mode(mode);
    let summary = monitor.run(signal).await;

    // Stop the dashboard together with the loop
    handle.trigger();
    if let Some(task) = dashboard {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Dashboard failed"),
            Err(e) => tracing::error!(error = %e, "Dashboard task panicked"),
        }
    }

    tracing::info!(
        cycles = summary.cycles,
        alerts = summary.alerts_dispatched,
        reason = %summary.reason,
        "Control Tower stopped"
    );
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "control-tower.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "control_tower=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn run_diagnostics(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Running system diagnostics");

    let t = &config.thresholds;
    println!("Running diagnostics...");
    println!("  Temperature range: {}-{} °C", t.temperature_min, t.temperature_max);
    println!("  Humidity range:    {}-{} %", t.humidity_min, t.humidity_max);
    println!("  Light threshold:   {} lux", t.light_min);
    println!("  Cycle interval:    {:?}", config.interval);
    println!(
        "  Alerts:            {} (cooldown {:?})",
        if config.alerts.enabled { "enabled" } else { "disabled" },
        config.alerts.cooldown
    );
    println!(
        "  Email channel:     {}",
        config
            .email
            .as_ref()
            .map(|c| c.recipient.as_str())
            .unwrap_or("not configured")
    );
    println!(
        "  SMS channel:       {}",
        config
            .sms
            .as_ref()
            .map(|c| c.recipient.as_str())
            .unwrap_or("not configured")
    );
    println!("  Database:          {}", config.db_path.display());

    match config.validate() {
        Ok(()) => {
            println!("Diagnostics passed.");
            Ok(())
        }
        Err(e) => {
            println!("Diagnostics failed: {}", e);
            Err(e.into())
        }
    }
}
