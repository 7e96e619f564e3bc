use crate::cli::ServeArgs;
use crate::infra::{build_orchestrator, shutdown_signal, AppState};
use crate::routes::with_application_routes;
use crate::webhooks::WebhookRegistrar;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_underwriting::config::AppConfig;
use loan_underwriting::error::AppError;
use loan_underwriting::telemetry;
use loan_underwriting::workflows::underwriting::CodatClient;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let client = Arc::new(CodatClient::new(
        config.codat.base_url.clone(),
        config.codat.authorization()?,
        config.codat.timeout,
    )?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let orchestrator = Arc::new(build_orchestrator(
        client.clone(),
        config.underwriting.clone(),
        config.codat.timeout,
    ));

    let app = with_application_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let registrar = match (&config.webhooks.base_url, args.no_webhooks) {
        (Some(base_url), false) => {
            let registrar = WebhookRegistrar::new(
                client.clone(),
                base_url.clone(),
                PathBuf::from(&config.webhooks.rules_file),
            );
            registrar.register().await?;
            Some(registrar)
        }
        _ => {
            info!("WEBHOOK_BASE_URL not set or disabled, skipping codat webhook registration");
            None
        }
    };

    readiness_flag.store(true, Ordering::Release);
    info!(?config.environment, %addr, codat = %config.codat.base_url, "loan underwriting service ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    readiness_flag.store(false, Ordering::Release);

    if let Some(registrar) = registrar {
        if let Err(err) = registrar.teardown().await {
            warn!(error = %err, "codat webhook teardown failed");
        }
    }

    served?;
    Ok(())
}
