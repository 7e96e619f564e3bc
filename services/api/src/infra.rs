use loan_underwriting::workflows::underwriting::{
    AccountingPlatformCache, ApplicationOrchestrator, CodatClient, InMemoryApplicationStore,
    UnderwritingParameters,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type Orchestrator = ApplicationOrchestrator<InMemoryApplicationStore, CodatClient>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wires the in-memory store and a fresh platform-key cache around the Codat client.
pub(crate) fn build_orchestrator(
    client: Arc<CodatClient>,
    parameters: UnderwritingParameters,
    gateway_timeout: Duration,
) -> Orchestrator {
    ApplicationOrchestrator::new(
        Arc::new(InMemoryApplicationStore::new()),
        client,
        Arc::new(AccountingPlatformCache::new()),
        parameters,
    )
    .with_gateway_timeout(gateway_timeout)
}

/// Resolves once the process receives Ctrl-C.
pub(crate) async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
