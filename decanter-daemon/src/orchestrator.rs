//! Collector orchestration -- assembly, bus wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `decanter-daemon`.
//! It builds the in-process [`EventBus`], constructs the enabled collectors
//! from configuration, and manages their startup and shutdown.
//!
//! # Startup Order
//!
//! 1. Log socket listener (bind errors are fatal)
//! 2. Camel notifier loop (drains `notification_sender()`)
//! 3. EventAdmin loop (drains `bus_event_sender()`)
//! 4. Bus bridge (forwards non-excluded bus traffic to the EventAdmin loop)
//! 5. Debug event logger
//!
//! # Shutdown Order
//!
//! 1. Log socket listener (stop accepting, drain connections)
//! 2. Cancel every background loop and join it

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use decanter_collector::{
    BusEvent, CamelEventNotifier, EventAdminCollector, EventAdminCollectorConfig, HostIdentity,
    Notification, SocketCollector, SocketCollectorConfig,
};
use decanter_core::config::DecanterConfig;
use decanter_core::{EventBus, EventPublisher, Subscription, TopicFilter};

use crate::metrics_server;

/// Channel capacity constants.
const BUS_CAPACITY: usize = 1024;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;
const BUS_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum time to wait for each background loop during shutdown.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Topics logged by the debug event logger.
const COLLECTED_TOPICS: &str = "decanter/collect/*";

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: DecanterConfig,
    /// In-process event bus all collectors publish to.
    bus: EventBus,
    socket: Option<SocketCollector>,
    notifier: Option<Arc<CamelEventNotifier>>,
    notification_tx: Option<mpsc::Sender<Notification>>,
    notification_rx: Option<mpsc::Receiver<Notification>>,
    eventadmin: Option<Arc<EventAdminCollector>>,
    bus_event_tx: Option<mpsc::Sender<BusEvent>>,
    bus_event_rx: Option<mpsc::Receiver<BusEvent>>,
    /// Cancels every background loop.
    cancel: CancellationToken,
    /// Spawned background loops, joined on shutdown.
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    started: bool,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any enabled collector fails to build (e.g. invalid matcher regex)
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = DecanterConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: DecanterConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before any collector records
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let bus = EventBus::new(BUS_CAPACITY);
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());

        // Host lookup may block on DNS, keep it off the runtime workers
        let host = if config.socket.enabled || config.eventadmin.enabled {
            HostIdentity::local_async().await
        } else {
            HostIdentity::default()
        };

        let socket = if config.socket.enabled {
            tracing::info!(bind_addr = %config.socket.bind_addr, "initializing log socket collector");
            let socket_config = SocketCollectorConfig::from_core(&config.socket, &config.general)
                .map_err(|e| anyhow::anyhow!("failed to build log socket collector: {}", e))?;
            Some(SocketCollector::with_host(
                socket_config,
                Arc::clone(&publisher),
                host.clone(),
            ))
        } else {
            None
        };

        let (notifier, notification_tx, notification_rx) = if config.camel.enabled {
            tracing::info!("initializing camel event notifier");
            let notifier =
                CamelEventNotifier::from_core(&config.camel, &config.general, Arc::clone(&publisher))
                    .map_err(|e| anyhow::anyhow!("failed to build camel notifier: {}", e))?;
            let (tx, rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
            (Some(Arc::new(notifier)), Some(tx), Some(rx))
        } else {
            (None, None, None)
        };

        let (eventadmin, bus_event_tx, bus_event_rx) = if config.eventadmin.enabled {
            tracing::info!(
                excluded_topics = ?config.eventadmin.excluded_topics,
                "initializing eventadmin collector"
            );
            let collector_config =
                EventAdminCollectorConfig::from_core(&config.eventadmin, &config.general)
                    .map_err(|e| anyhow::anyhow!("failed to build eventadmin collector: {}", e))?;
            let collector =
                EventAdminCollector::with_host(collector_config, Arc::clone(&publisher), host);
            let (tx, rx) = mpsc::channel(BUS_EVENT_CHANNEL_CAPACITY);
            (Some(Arc::new(collector)), Some(tx), Some(rx))
        } else {
            (None, None, None)
        };

        let orchestrator = Self {
            config,
            bus,
            socket,
            notifier,
            notification_tx,
            notification_rx,
            eventadmin,
            bus_event_tx,
            bus_event_rx,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            start_time: Instant::now(),
            started: false,
        };

        tracing::info!(
            collectors = orchestrator.enabled_collectors(),
            "orchestrator initialized"
        );
        if orchestrator.config.metrics.enabled {
            record_daemon_metrics(orchestrator.enabled_collectors());
        }

        Ok(orchestrator)
    }

    /// Start the listener and spawn all background loops.
    ///
    /// # Errors
    ///
    /// Returns an error if the orchestrator was already started or the
    /// socket listener cannot bind.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(anyhow::anyhow!("orchestrator already started"));
        }

        if let Some(socket) = self.socket.as_mut() {
            socket
                .open()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start log socket collector: {}", e))?;
        }

        if let (Some(notifier), Some(rx)) = (&self.notifier, self.notification_rx.take()) {
            let notifier = Arc::clone(notifier);
            let cancel = self.cancel.clone();
            self.tasks.push((
                "camel-notifier",
                tokio::spawn(async move { notifier.run(rx, cancel).await }),
            ));
        }

        if let (Some(collector), Some(rx)) = (&self.eventadmin, self.bus_event_rx.take()) {
            let runner = Arc::clone(collector);
            let cancel = self.cancel.clone();
            self.tasks.push((
                "eventadmin-collector",
                tokio::spawn(async move { runner.run(rx, cancel).await }),
            ));

            if let Some(tx) = &self.bus_event_tx {
                self.tasks.push((
                    "bus-bridge",
                    spawn_bus_bridge(
                        self.bus.subscribe(TopicFilter::all()),
                        Arc::clone(collector),
                        tx.clone(),
                        self.cancel.clone(),
                    ),
                ));
            }
        }

        let collected = TopicFilter::new(COLLECTED_TOPICS)?;
        self.tasks.push((
            "event-logger",
            spawn_event_logger(self.bus.subscribe(collected), self.cancel.clone()),
        ));

        if self.config.metrics.enabled {
            self.tasks.push((
                "uptime-updater",
                spawn_uptime_updater(self.start_time, self.cancel.clone()),
            ));
        }

        self.started = true;
        tracing::info!(tasks = self.tasks.len(), "decanter-daemon started");
        Ok(())
    }

    /// Start, block until a shutdown signal is received, then shut down.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        tracing::info!("entering main event loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await;
        Ok(())
    }

    /// Close the listener, cancel every loop and wait for them to finish.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if let Some(socket) = self.socket.as_mut() {
            socket.close().await;
        }

        self.cancel.cancel();
        for (name, mut task) in self.tasks.drain(..) {
            match tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => tracing::debug!(task = name, "task stopped"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "task failed"),
                Err(_) => {
                    tracing::warn!(task = name, "task did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "decanter-daemon shut down"
        );
    }

    /// The in-process event bus. Subscribe here to consume collected events.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Sender for workflow-engine notifications (`None` when camel is disabled).
    pub fn notification_sender(&self) -> Option<mpsc::Sender<Notification>> {
        self.notification_tx.clone()
    }

    /// Sender for bus events (`None` when eventadmin is disabled).
    pub fn bus_event_sender(&self) -> Option<mpsc::Sender<BusEvent>> {
        self.bus_event_tx.clone()
    }

    /// The camel notifier, for runtime reconfiguration.
    pub fn notifier(&self) -> Option<&Arc<CamelEventNotifier>> {
        self.notifier.as_ref()
    }

    /// Address the log socket listener is bound to, once started.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(SocketCollector::local_addr)
    }

    /// Number of enabled collectors.
    pub fn enabled_collectors(&self) -> usize {
        usize::from(self.socket.is_some())
            + usize::from(self.notifier.is_some())
            + usize::from(self.eventadmin.is_some())
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &DecanterConfig {
        &self.config
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Forward bus traffic into the EventAdmin loop.
///
/// Excluded topics (by default everything under `decanter/`) are not
/// forwarded. The collector's own `decanter/collect/eventadmin/` output is
/// never forwarded, even with an empty exclusion list. A full channel
/// drops the event instead of blocking the bus.
fn spawn_bus_bridge(
    mut subscription: Subscription,
    collector: Arc<EventAdminCollector>,
    tx: mpsc::Sender<BusEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = subscription.recv() => match received {
                    Some(event) => {
                        if !collector.is_excluded(event.topic().as_str()) {
                            if let Err(e) = tx.try_send(BusEvent::from_event(&event)) {
                                tracing::warn!(
                                    topic = %event.topic(),
                                    error = %e,
                                    "bus event dropped before eventadmin collector"
                                );
                            }
                        }
                    }
                    None => {
                        tracing::debug!("event bus closed, exiting bus bridge");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    tracing::debug!("bus bridge shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn a background task that logs every collected event at debug level.
fn spawn_event_logger(mut subscription: Subscription, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = subscription.recv() => match received {
                    Some(event) => {
                        tracing::debug!(
                            topic = %event.topic(),
                            attributes = event.attributes().len(),
                            "event collected"
                        );
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    tracing::debug!("event logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Record daemon-level metrics (build info, enabled collectors).
fn record_daemon_metrics(collector_count: usize) {
    use decanter_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_COLLECTORS_ENABLED).set(collector_count as f64);

    tracing::debug!(
        collector_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    use decanter_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
