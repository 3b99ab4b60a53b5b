// # rosterd - Roster HTTP Daemon
//
// This is a THIN integration layer: record rules, relationship upkeep and
// persistence all live in roster-core.
//
// The rosterd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Opening the document stores
// 4. Serving the HTTP API until SIGTERM/SIGINT, then flushing the stores
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `ROSTER_APP_NAME`: Application name used in alert headers (default: roster)
// - `ROSTER_BIND_ADDR`: Listen address (default: 127.0.0.1:8080)
// - `ROSTER_STORE_TYPE`: Type of document store (memory, file)
// - `ROSTER_STORE_DIR`: Directory for collection files (for file store)
// - `ROSTER_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
// - `ROSTER_EVENT_CHANNEL_CAPACITY`: Mutation event buffer (default: 1000)
// - `ROSTER_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export ROSTER_STORE_TYPE=file
// export ROSTER_STORE_DIR=/var/lib/roster
// export ROSTER_BIND_ADDR=0.0.0.0:8080
//
// rosterd
// ```

mod http;

use anyhow::Result;
use roster_core::{Roster, RosterConfig, StoreConfig};
use std::env;
use std::future::IntoFuture;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long in-flight requests may run after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum RosterExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RosterExitCode> for ExitCode {
    fn from(code: RosterExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration as read from the environment
struct Config {
    application_name: String,
    bind_addr: String,
    store_type: String,
    store_dir: Option<String>,
    request_timeout_secs: u64,
    event_channel_capacity: usize,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let defaults = RosterConfig::default();
        Ok(Self {
            application_name: env::var("ROSTER_APP_NAME")
                .unwrap_or_else(|_| defaults.application_name.clone()),
            bind_addr: env::var("ROSTER_BIND_ADDR")
                .unwrap_or_else(|_| defaults.server.bind_addr.clone()),
            store_type: env::var("ROSTER_STORE_TYPE").unwrap_or_else(|_| "memory".to_string()),
            store_dir: env::var("ROSTER_STORE_DIR").ok(),
            request_timeout_secs: parse_var(
                "ROSTER_REQUEST_TIMEOUT_SECS",
                defaults.server.request_timeout_secs,
            )?,
            event_channel_capacity: parse_var(
                "ROSTER_EVENT_CHANNEL_CAPACITY",
                defaults.events.channel_capacity,
            )?,
            log_level: env::var("ROSTER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the environment-specific settings
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "memory" => {}
            "file" => {
                if self.store_dir.as_ref().is_none_or(|dir| dir.is_empty()) {
                    anyhow::bail!(
                        "ROSTER_STORE_DIR is required when ROSTER_STORE_TYPE=file. \
                        Set it via: export ROSTER_STORE_DIR=/var/lib/roster"
                    );
                }
            }
            _ => anyhow::bail!(
                "ROSTER_STORE_TYPE '{}' is not supported. \
                Supported types: memory, file",
                self.store_type
            ),
        }

        if self.request_timeout_secs == 0 || self.request_timeout_secs > 3600 {
            anyhow::bail!(
                "ROSTER_REQUEST_TIMEOUT_SECS must be between 1 and 3600 seconds. Got: {}",
                self.request_timeout_secs
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ROSTER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the library configuration
    fn to_roster_config(&self) -> RosterConfig {
        let mut config = RosterConfig::new();
        config.application_name = self.application_name.clone();
        config.server.bind_addr = self.bind_addr.clone();
        config.server.request_timeout_secs = self.request_timeout_secs;
        config.events.channel_capacity = self.event_channel_capacity;
        if self.store_type == "file" {
            config.store = StoreConfig::File {
                directory: PathBuf::from(self.store_dir.clone().unwrap_or_default()),
            };
        }
        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RosterExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RosterExitCode::ConfigError.into();
    }
    let roster_config = config.to_roster_config();
    if let Err(e) = roster_config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RosterExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RosterExitCode::ConfigError.into();
    }

    info!("Starting rosterd daemon");
    info!(
        "Store type: {}, listening on {}",
        roster_config.store.type_name(),
        roster_config.server.bind_addr
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RosterExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(roster_config).await {
            error!("Daemon error: {}", e);
            RosterExitCode::RuntimeError
        } else {
            RosterExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: RosterConfig) -> Result<()> {
    let (roster, mut events) = Roster::open(&config).await?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Roster event");
        }
    });

    let state = http::AppState::new(roster.clone(), &config.application_name)?;
    let app = http::router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.server.bind_addr, e))?;
    info!("Listening on {}", listener.local_addr()?);

    let stop = Arc::new(Notify::new());
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown({
                let stop = Arc::clone(&stop);
                async move { stop.notified().await }
            })
            .into_future(),
    );

    tokio::select! {
        signal = wait_for_shutdown() => {
            let signal = signal?;
            info!("Received shutdown signal: {}", signal);
            stop.notify_one();

            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                Ok(joined) => joined??,
                Err(_) => {
                    warn!("In-flight requests still running after {:?}, abandoning them", SHUTDOWN_GRACE);
                    server.abort();
                }
            }
        }
        joined = &mut server => {
            joined??;
            anyhow::bail!("HTTP server stopped unexpectedly");
        }
    }

    info!("Flushing document stores");
    roster.flush().await?;
    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
