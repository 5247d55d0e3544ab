pub mod capture;
pub mod config;
pub mod core;
pub mod dissect;
pub mod error;
pub mod frame;
pub mod lookup;
pub mod profile;
pub mod services;
pub mod sink;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use crate::config::Settings;
use crate::core::Engine;
use crate::profile::{ProcessSample, ProfileOutputs};
use crate::services::BackgroundServices;

/// Process entry point: logging, settings, startup checks, then run until signalled.
pub fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in twpcap: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "twpcap=info,twpcap_lib=info".into()),
        )
        .init();

    let settings = Settings::parse();
    tracing::info!("version={}", env!("CARGO_PKG_VERSION"));

    if settings.list {
        let interfaces = capture::list_interfaces().context("cannot list interfaces")?;
        print!("{}", capture::render_interfaces(&interfaces));
        return Ok(());
    }

    settings.validate()?;
    let profiles = ProfileOutputs::open(
        settings.cpuprofile.as_deref(),
        settings.memprofile.as_deref(),
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    runtime.block_on(serve(settings, profiles))
}

async fn serve(settings: Settings, profiles: ProfileOutputs) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new());
    let services = match BackgroundServices::start(&settings, Arc::clone(&engine)).await {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(kind = e.kind(), "Sensor startup failed: {e}");
            return Err(anyhow::Error::new(e).context("sensor startup failed"));
        }
    };
    tracing::info!("twpcap monitoring {}", settings.iface);

    wait_for_signal().await?;
    services.shutdown().await;

    if !profiles.is_empty() {
        let packets = engine.packet_count();
        let sample = tokio::task::spawn_blocking(ProcessSample::current)
            .await
            .context("profile sampling task failed")??;
        profiles.write(&sample, packets)?;
    }
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
