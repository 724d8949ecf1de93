//! resilience-probe
//!
//! Probes configured endpoints through per-endpoint circuit breakers and
//! prints breaker state after every round.
//!
//! ```text
//!   config.toml ──▶ ResilientExecutor ──▶ GET endpoint.url (with deadline)
//!        │                 │
//!        │ --watch         ├──▶ snapshots (stdout, JSON)
//!        ▼                 └──▶ TelemetryQueue ──▶ flusher ──▶ collector / log
//!   ConfigWatcher ──▶ CircuitRegistry::update_config
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use url::Url;

use endpoint_resilience::config::watcher::ConfigWatcher;
use endpoint_resilience::config::{load_config, ConfigError, EndpointConfig, ResilienceConfig};
use endpoint_resilience::lifecycle::signals::shutdown_on_signal;
use endpoint_resilience::lifecycle::Shutdown;
use endpoint_resilience::observability::{logging, metrics};
use endpoint_resilience::resilience::{with_deadline, DeadlineError};
use endpoint_resilience::telemetry::{HttpExporter, LogExporter, TelemetryFlusher, TelemetryQueue};
use endpoint_resilience::{BreakerEvent, BreakerObserver, ResilientExecutor, SystemClock};

#[derive(Parser)]
#[command(name = "resilience-probe")]
#[command(about = "Probe endpoints through per-endpoint circuit breakers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the effective settings
    Validate { config: PathBuf },
    /// Probe every configured endpoint on an interval
    Probe {
        config: PathBuf,

        /// Stop after this many rounds
        #[arg(long)]
        rounds: Option<u32>,

        #[arg(long, default_value_t = 5_000)]
        interval_ms: u64,

        /// Deadline for a single request
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,

        /// Reload breaker settings when the config file changes
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Debug, Error)]
enum ProbeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),
}

/// Prints state changes the way a UI would raise a notification.
struct ConsoleNotifier;

impl BreakerObserver for ConsoleNotifier {
    fn on_event(&self, event: &BreakerEvent) {
        match event {
            BreakerEvent::Opened { endpoint, failure_count, .. } => {
                eprintln!("[!] {endpoint} is unavailable ({failure_count} consecutive failures)")
            }
            BreakerEvent::Closed { endpoint } => eprintln!("[+] {endpoint} recovered"),
            BreakerEvent::Exhausted { endpoint, error_id, .. } => {
                eprintln!("[x] {endpoint} failed (reference {error_id})")
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Probe {
            config,
            rounds,
            interval_ms,
            timeout_ms,
            watch,
        } => {
            probe(
                &config,
                rounds,
                Duration::from_millis(interval_ms),
                Duration::from_millis(timeout_ms),
                watch,
            )
            .await
        }
    }
}

fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match load_config(path) {
        Ok(config) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            for error in &errors {
                eprintln!("error: {error}");
            }
            Err(format!("{} validation error(s) in {}", errors.len(), path.display()).into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn probe(
    path: &Path,
    rounds: Option<u32>,
    interval: Duration,
    timeout: Duration,
    watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    logging::init_logging(&config.observability.log_level);

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    tracing::info!(
        endpoints = config.endpoints.len(),
        failure_threshold = config.breaker.failure_threshold,
        cooldown_ms = config.breaker.cooldown_ms,
        attempts = config.retry.attempts,
        "Configuration loaded"
    );

    let queue = Arc::new(TelemetryQueue::new(config.telemetry.capacity));
    let executor = ResilientExecutor::from_config(
        &config,
        Arc::new(SystemClock),
        queue.clone(),
        vec![Arc::new(ConsoleNotifier) as Arc<dyn BreakerObserver>],
    );

    let shutdown = Arc::new(Shutdown::new());
    let flusher = spawn_flusher(&config, &executor, queue, &shutdown)?;

    let _watcher = if watch {
        let (watcher, mut updates) = ConfigWatcher::new(path, config.clone());
        let registry = executor.registry().clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                registry.update_config(new_config.breaker);
            }
        });
        Some(watcher.run()?)
    } else {
        None
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move { shutdown_on_signal(&signal_shutdown).await });

    let client = reqwest::Client::new();
    let mut stop = shutdown.subscribe();
    let mut ticker = tokio::time::interval(interval);
    let mut round = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.recv() => break,
        }

        round += 1;
        tokio::select! {
            _ = run_round(&executor, &client, &config.endpoints, timeout) => {}
            _ = stop.recv() => break,
        }

        println!(
            "{}",
            serde_json::to_string_pretty(&executor.registry().snapshots())?
        );

        if rounds.is_some_and(|limit| round >= limit) {
            break;
        }
    }

    shutdown.trigger();
    if let Some(handle) = flusher {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Telemetry flusher task failed");
        }
    }

    tracing::info!(rounds = round, "Probe finished");
    Ok(())
}

fn spawn_flusher(
    config: &ResilienceConfig,
    executor: &ResilientExecutor,
    queue: Arc<TelemetryQueue>,
    shutdown: &Shutdown,
) -> Result<Option<tokio::task::JoinHandle<()>>, Box<dyn std::error::Error>> {
    if !config.telemetry.enabled {
        return Ok(None);
    }

    let handle = match &config.telemetry.collector_url {
        Some(raw) => {
            let session_id = executor.registry().reporter().session_id();
            let exporter = HttpExporter::new(Url::parse(raw)?, session_id)?;
            let flusher = TelemetryFlusher::new(queue, exporter, &config.telemetry);
            tokio::spawn(flusher.run(shutdown.subscribe()))
        }
        None => {
            let flusher = TelemetryFlusher::new(queue, LogExporter, &config.telemetry);
            tokio::spawn(flusher.run(shutdown.subscribe()))
        }
    };
    Ok(Some(handle))
}

async fn run_round(
    executor: &ResilientExecutor,
    client: &reqwest::Client,
    endpoints: &[EndpointConfig],
    timeout: Duration,
) {
    for endpoint in endpoints {
        let options = executor
            .default_options()
            .with_context(endpoint.context.as_deref().unwrap_or(&endpoint.name));
        let url = endpoint.url.as_str();

        let result = executor
            .execute_with_policy(&endpoint.name, move || fetch(client, url, timeout), options)
            .await;

        match result {
            Ok(status) => tracing::info!(endpoint = %endpoint.name, status, "Probe succeeded"),
            Err(e) if e.is_circuit_open() => {
                tracing::warn!(endpoint = %endpoint.name, "Probe skipped, circuit open")
            }
            Err(e) => tracing::error!(endpoint = %endpoint.name, error = %e, "Probe failed"),
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<u16, DeadlineError<ProbeError>> {
    with_deadline(timeout, get_status(client, url)).await
}

async fn get_status(client: &reqwest::Client, url: &str) -> Result<u16, ProbeError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(ProbeError::Status(status.as_u16()))
    }
}
