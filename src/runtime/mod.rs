//! Sidecar runtime.
//!
//! Wires the fabric, its subscribers, the coordinator, the watcher and the
//! telemetry endpoint together, then runs until either a termination signal
//! arrives or (in one-shot mode) the coordinator reaches a terminal state.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::cli::RunOpts;
use crate::config::{self, Config};
use crate::coordinator::{RunCoordinator, RunMode};
use crate::events::{Fabric, Subscription};
use crate::observers::{CounterObserver, ExpiryObserver};
use crate::output::{FileMaterializer, HookMaterializer, OutputPipeline};
use crate::telemetry::{self, Aggregator};
use crate::watcher::{PipeSource, PipeWatcher, Watcher};

/// The assembled sidecar process.
pub struct Sidecar {
    mode: RunMode,
    telemetry_port: u16,
    aggregator: Arc<Aggregator>,
    fabric: Arc<Fabric>,
    coordinator: Arc<RunCoordinator>,
    coordinator_sub: Subscription,
    expiry: Option<(ExpiryObserver, Subscription)>,
    counters: Option<(CounterObserver, Subscription)>,
    watcher: Arc<dyn Watcher>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Sidecar {
    /// Assemble the sidecar from configuration. All subscriptions are
    /// registered here, before the watcher produces anything.
    pub fn start(mut config: Config, opts: &RunOpts) -> Result<Self> {
        apply_overrides(&mut config, opts);
        config::validate(&config)?;

        let mode = if config.one_shot {
            RunMode::OneShot
        } else {
            RunMode::Continuous
        };

        let aggregator = Arc::new(Aggregator::new(&config.telemetry.role)?);
        let fabric = Arc::new(Fabric::new(config.fabric.queue_capacity));

        let coordinator_sub = fabric.register();
        // Telemetry is not useful in a finite run: no exposition server,
        // no telemetry subscribers.
        let (expiry, counters) = match mode {
            RunMode::Continuous => (
                Some((
                    ExpiryObserver::new(Arc::clone(&aggregator), &config.resources),
                    fabric.register(),
                )),
                Some((
                    CounterObserver::new(Arc::clone(&aggregator)),
                    fabric.register(),
                )),
            ),
            RunMode::OneShot => (None, None),
        };

        let pipeline = Arc::new(
            OutputPipeline::new(Arc::clone(&aggregator))
                .with_step(Arc::new(FileMaterializer::new(&config.output.dir)?))
                .with_step(Arc::new(HookMaterializer)),
        );
        let coordinator = Arc::new(RunCoordinator::new(
            mode,
            &config.resources,
            pipeline,
            config.coordinator.max_inflight,
        ));

        let source = match &config.watcher.command {
            Some(command) => PipeSource::Command(command.clone()),
            None => PipeSource::Stdin,
        };
        let watcher: Arc<dyn Watcher> =
            Arc::new(PipeWatcher::new(source, Arc::clone(&aggregator)));

        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

        print_startup_banner(&config, mode, watcher.name());

        Ok(Self {
            mode,
            telemetry_port: config.telemetry.port,
            aggregator,
            fabric,
            coordinator,
            coordinator_sub,
            expiry,
            counters,
            watcher,
            shutdown_tx,
        })
    }

    /// Run until shutdown and return the process exit code.
    pub async fn run_until_shutdown(self) -> Result<i32> {
        let Self {
            mode,
            telemetry_port,
            aggregator,
            fabric,
            coordinator,
            coordinator_sub,
            expiry,
            counters,
            watcher,
            shutdown_tx,
        } = self;

        if mode == RunMode::Continuous {
            let aggregator = Arc::clone(&aggregator);
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                if let Err(err) = telemetry::serve(telemetry_port, aggregator, shutdown_rx).await
                {
                    error!("telemetry endpoint failed: {err:#}");
                }
            });
        }
        if let Some((observer, sub)) = expiry {
            tokio::spawn(observer.run(sub));
        }
        if let Some((observer, sub)) = counters {
            tokio::spawn(observer.run(sub));
        }

        let coordinator_handle = tokio::spawn(Arc::clone(&coordinator).run(coordinator_sub));

        // The watcher task owns the last fabric handle, so the stream
        // closes for every subscriber once the watcher stops.
        tokio::spawn(async move {
            if let Err(err) = watcher.run(fabric).await {
                error!("watcher failed: {err:#}");
            }
        });

        tokio::select! {
            _ = shutdown_signal() => {
                info!("received a termination signal, shutting down");
                let _ = shutdown_tx.send(());
                Ok(0)
            }
            joined = coordinator_handle => {
                let state = joined?;
                match mode {
                    RunMode::OneShot => {
                        let _ = shutdown_tx.send(());
                        Ok(state.exit_code())
                    }
                    RunMode::Continuous => {
                        // The fetcher went away; keep serving telemetry
                        // until the operator tells us to stop.
                        warn!("event stream ended, waiting for a termination signal");
                        shutdown_signal().await;
                        let _ = shutdown_tx.send(());
                        Ok(0)
                    }
                }
            }
        }
    }
}

fn apply_overrides(config: &mut Config, opts: &RunOpts) {
    if opts.one_shot {
        config.one_shot = true;
    }
    if let Some(port) = opts.metrics_port {
        config.telemetry.port = port;
    }
    if let Some(dir) = &opts.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(command) = &opts.watcher_cmd {
        config.watcher.command = Some(command.clone());
    }
    if let Some(capacity) = opts.queue_capacity {
        config.fabric.queue_capacity = capacity;
    }
}

/// Wait for an operator-issued termination signal.
///
/// Unix: interrupt, terminate, hangup or quit; Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
            _ = hangup.recv() => {}
            _ = quit.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

fn print_startup_banner(config: &Config, mode: RunMode, watcher: &str) {
    info!("-------------------------------------------");
    info!("  keysync v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "  Mode: {}",
        match mode {
            RunMode::OneShot => "one-shot",
            RunMode::Continuous => "continuous",
        }
    );
    info!("  Resources: {}", config.resources.len());
    info!("  Watcher: {watcher}");
    info!("  Output dir: {}", config.output.dir);
    match mode {
        RunMode::Continuous => info!(
            "  Metrics: http://0.0.0.0:{}/metrics",
            config.telemetry.port
        ),
        RunMode::OneShot => info!("  Metrics: disabled (one-shot)"),
    }
    info!("-------------------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_opts() -> RunOpts {
        RunOpts {
            config: None,
            one_shot: false,
            metrics_port: None,
            output_dir: None,
            watcher_cmd: None,
            queue_capacity: None,
        }
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let mut config = Config::default();
        let mut opts = run_opts();
        opts.one_shot = true;
        opts.metrics_port = Some(9300);
        opts.watcher_cmd = Some("fetcher --backend vault".into());
        opts.queue_capacity = Some(64);

        apply_overrides(&mut config, &opts);

        assert!(config.one_shot);
        assert_eq!(config.telemetry.port, 9300);
        assert_eq!(
            config.watcher.command.as_deref(),
            Some("fetcher --backend vault")
        );
        assert_eq!(config.fabric.queue_capacity, 64);
    }

    #[test]
    fn absent_overrides_keep_the_config() {
        let mut config = Config::default();
        config.telemetry.port = 9400;
        apply_overrides(&mut config, &run_opts());
        assert!(!config.one_shot);
        assert_eq!(config.telemetry.port, 9400);
    }
}
