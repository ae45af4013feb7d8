// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `linkmap serve`: assembles the full coordinator.
//!
//! Opens the store, registers the pipeline against the durable runtime,
//! starts the worker pool, the probe-event expiry sweep, and the admission
//! API, then runs until SIGTERM/SIGINT.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use linkmap_bridge::ProbeBridge;
use linkmap_config::model::{LinkmapConfig, LogConfig};
use linkmap_core::LinkmapError;
use linkmap_embed::EmbedClient;
use linkmap_gateway::{AppState, SessionAuth};
use linkmap_llm::AnthropicClient;
use linkmap_pipeline::{Pipeline, PipelineSettings, QUEUE};
use linkmap_runtime::{TaskRuntime, WorkerPool};
use linkmap_scrape::{OcrClient, ScraperClient};
use linkmap_storage::Store;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cadence of the probe-event expiry sweep.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Runs the `linkmap serve` command.
pub async fn run_serve(config: LinkmapConfig) -> Result<(), LinkmapError> {
    init_tracing(&config.log);
    info!("starting linkmap serve");

    // Store and execution engine.
    let store = Arc::new(Store::open(&config.storage.database_path).await?);
    let runtime = Arc::new(TaskRuntime::new(
        store.clone(),
        QUEUE,
        config.runtime.claim_timeout_secs,
    ));
    let bridge = Arc::new(ProbeBridge::new(store.clone()));

    // External collaborators.
    let api_key = config.anthropic.api_key.clone().ok_or_else(|| {
        eprintln!(
            "error: Anthropic API key required. Set anthropic.api_key or LINKMAP_ANTHROPIC_API_KEY."
        );
        LinkmapError::Config("anthropic API key missing".to_string())
    })?;
    let provider = Arc::new(AnthropicClient::new(&api_key, config.anthropic.model.clone())?);
    let embedder = Arc::new(EmbedClient::new(
        config.embeddings.endpoint.clone(),
        config.embeddings.api_key.clone(),
        config.embeddings.model.clone(),
        config.embeddings.dimensions,
    )?);
    let scraper = Arc::new(ScraperClient::new(
        config.scraper.endpoint.clone(),
        config.scraper.timeout_secs,
    )?);
    let ocr = Arc::new(OcrClient::new(config.scraper.endpoint.clone(), 60)?);

    // Pipeline registration.
    let pipeline = Pipeline::new(
        store.clone(),
        runtime.clone(),
        bridge.clone(),
        provider,
        embedder,
        scraper,
        ocr,
        PipelineSettings {
            similarity_threshold: config.pipeline.similarity_threshold,
            max_relations: config.pipeline.max_relations,
            vector_search_k: config.pipeline.vector_search_k,
        },
    );
    info!(
        workers = config.runtime.workers,
        threshold = config.pipeline.similarity_threshold,
        "pipeline registered"
    );

    // Admission API state.
    let session_secret = config.auth.session_secret.clone().ok_or_else(|| {
        eprintln!(
            "error: session signing secret required. Set auth.session_secret or LINKMAP_AUTH_SESSION_SECRET."
        );
        LinkmapError::Config("session secret missing".to_string())
    })?;
    let state = AppState {
        store: store.clone(),
        pipeline,
        bridge: bridge.clone(),
        session: SessionAuth::new(&session_secret),
        web_base_url: config.auth.web_base_url.clone(),
        start_time: Instant::now(),
    };

    let cancel = install_signal_handler();

    // Worker pool.
    let pool = WorkerPool::new(
        runtime.clone(),
        config.runtime.workers,
        Duration::from_millis(config.runtime.poll_interval_ms),
    );
    let worker_handles = pool.start(cancel.clone());

    // Probe-event expiry sweep: a probe that never answers must not leave
    // links stuck in waiting_probe forever.
    {
        let bridge = bridge.clone();
        let retention =
            Duration::from_secs(config.pipeline.probe_event_retention_hours * 3600);
        let sweep_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match bridge.expire_stale_events(retention).await {
                            Ok(0) => debug!("expiry sweep: nothing stale"),
                            Ok(expired) => warn!(expired, "expiry sweep: probe events timed out"),
                            Err(e) => warn!(error = %e, "expiry sweep failed"),
                        }
                    }
                    _ = sweep_cancel.cancelled() => {
                        info!("expiry sweep shutting down");
                        break;
                    }
                }
            }
        });
        info!(
            retention_hours = config.pipeline.probe_event_retention_hours,
            "probe-event expiry sweep started"
        );
    }

    // Serve until shutdown.
    linkmap_gateway::serve(&config.server.host, config.server.port, state, cancel.clone()).await?;

    // Drain workers and checkpoint the store.
    cancel.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }
    store.close().await?;

    info!("linkmap serve shutdown complete");
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    token_clone.cancel();
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber: stderr by default, a file when
/// `log.file` is configured.
fn init_tracing(log: &LogConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log.level.clone()));

    match &log.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path
                .file_name()
                .map(|f| f.to_os_string())
                .unwrap_or_else(|| "linkmap.log".into());
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(false)
                .init();
        }
    }
}
