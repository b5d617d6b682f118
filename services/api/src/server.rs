use crate::cli::ServeArgs;
use crate::infra::{build_stack, AppState, LogMailTransport};
use crate::routes::with_leasing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use homelet::config::AppConfig;
use homelet::error::AppError;
use homelet::leasing::{ExpiryPolicy, MailWorker};
use homelet::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MAIL_DRAIN_INTERVAL: Duration = Duration::from_secs(5);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let stack = build_stack(ExpiryPolicy {
        max_pending_days: config.sweeper.pending_expiry_days,
    });

    // Mail worker: drains the notification queue toward the transport on its
    // own cadence, decoupled from request handling.
    let worker = MailWorker::new(stack.queue.clone(), Arc::new(LogMailTransport));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAIL_DRAIN_INTERVAL);
        loop {
            ticker.tick().await;
            worker.drain();
        }
    });

    // Scheduler collaborator: invokes the idempotent sweep entry point on the
    // configured cadence.
    let sweeper = stack.sweeper.clone();
    let sweep_interval = Duration::from_secs(config.sweeper.interval_hours * 60 * 60);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        // The first tick fires immediately; skip it so a restart loop does not
        // hammer the store.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = sweeper.sweep(chrono::Utc::now()) {
                tracing::warn!(%err, "scheduled expiry sweep failed");
            }
        }
    });

    let app = with_leasing_routes(&stack)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "homelet rental marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
