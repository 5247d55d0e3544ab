//! Background service lifecycle management.
//!
//! `BackgroundServices` owns every task and thread the sensor runs, starting
//! them in dependency order and tearing them down in the quit sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::capture::CaptureEngine;
use crate::config::{self, Settings};
use crate::core::{Engine, ReportPolicy, ReportScheduler};
use crate::error::SensorError;
use crate::sink::{SyslogForwarder, TelemetrySink};

/// Running sensor services.
///
/// Started in dependency order:
/// 1. Syslog forwarder (drains the telemetry queue)
/// 2. Report scheduler (stats line + sweep every tick)
/// 3. Capture engine (fills the tables)
pub struct BackgroundServices {
    sink: TelemetrySink,
    shutdown: watch::Sender<bool>,
    forwarder: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    capture: CaptureEngine,
}

impl BackgroundServices {
    /// Start all services. Any failure here is fatal to the process.
    pub async fn start(settings: &Settings, engine: Arc<Engine>) -> Result<Self, SensorError> {
        let (sink, queue) = TelemetrySink::channel(config::SINK_QUEUE_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);

        // 1. Syslog forwarder: resolve every destination before anything else runs.
        let forwarder = SyslogForwarder::connect(&settings.destinations()).await?;
        let names: Vec<String> = forwarder.destinations().map(str::to_string).collect();
        let forwarder = forwarder.spawn(queue, shutdown_rx.clone());
        for name in names {
            tracing::info!("start send syslog to {name}");
            sink.submit(format!("start send syslog to {name}")).await?;
        }

        // 2. Report scheduler.
        let policy = ReportPolicy {
            send_interval: settings.interval,
            retention: settings.retention,
        };
        let scheduler = Arc::new(ReportScheduler::new(
            Arc::clone(&engine),
            sink.clone(),
            policy,
        ));
        let scheduler = scheduler.start(shutdown_rx);

        // 3. Capture: opening the interface is the last startup check.
        let capture = match CaptureEngine::start(&settings.iface, engine) {
            Ok(capture) => capture,
            Err(e) => {
                let _ = shutdown.send(true);
                return Err(e);
            }
        };

        Ok(Self {
            sink,
            shutdown,
            forwarder,
            scheduler,
            capture,
        })
    }

    /// Quit sequence: announce, let the queue flush, then stop capture and
    /// the async services.
    pub async fn shutdown(self) {
        let Self {
            sink,
            shutdown,
            forwarder,
            scheduler,
            mut capture,
        } = self;

        if let Err(e) = sink.submit("quit by signal".into()).await {
            tracing::warn!("Could not queue quit notice: {e}");
        }
        tokio::time::sleep(Duration::from_secs(config::QUIT_FLUSH_SECS)).await;
        tracing::info!("quit by signal");

        if let Err(e) = tokio::task::spawn_blocking(move || capture.stop()).await {
            tracing::error!("Capture shutdown task failed: {e}");
        }
        let _ = shutdown.send(true);
        for (name, task) in [("forwarder", forwarder), ("scheduler", scheduler)] {
            if let Err(e) = task.await {
                tracing::error!("{name} task failed: {e}");
            }
        }
    }
}
