use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::domain::{ApplicationForm, ApplicationId, DataRequirement, ValidationError};
use super::events::{AccountCategorisationAlert, DataConnectionStatusAlert, DataSyncCompleteAlert};
use super::gateway::FinancialDataGateway;
use super::service::{ApplicationError, ApplicationOrchestrator};
use super::store::{ApplicationStore, StoreError};

/// Router builder exposing the applicant endpoints and the Codat webhook receivers.
pub fn application_router<S, G>(orchestrator: Arc<ApplicationOrchestrator<S, G>>) -> Router
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    Router::new()
        .route("/applications/start", get(start_handler::<S, G>))
        .route("/applications/form", post(form_handler::<S, G>))
        .route("/applications/:application_id", get(status_handler::<S, G>))
        .route(
            "/webhooks/codat/data-connection-status",
            post(data_connection_webhook::<S, G>),
        )
        .route(
            "/webhooks/codat/datatype-sync-complete",
            post(data_sync_webhook::<S, G>),
        )
        .route(
            "/webhooks/codat/account-categorisation-update",
            post(categorisation_webhook::<S, G>),
        )
        .with_state(orchestrator)
}

/// Application form as posted by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormRequest {
    pub id: ApplicationId,
    pub company_name: String,
    pub full_name: String,
    pub loan_amount: Decimal,
    pub loan_term: u32,
    pub loan_purpose: String,
}

impl SubmitFormRequest {
    fn into_parts(self) -> (ApplicationId, ApplicationForm) {
        (
            self.id,
            ApplicationForm {
                company_name: self.company_name,
                full_name: self.full_name,
                loan_amount: self.loan_amount,
                loan_term: self.loan_term,
                loan_purpose: self.loan_purpose,
            },
        )
    }
}

pub(crate) async fn start_handler<S, G>(
    State(orchestrator): State<Arc<ApplicationOrchestrator<S, G>>>,
) -> Response
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    match orchestrator.create_application().await {
        Ok(application) => (StatusCode::OK, Json(application.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn form_handler<S, G>(
    State(orchestrator): State<Arc<ApplicationOrchestrator<S, G>>>,
    Json(request): Json<SubmitFormRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    let (id, form) = request.into_parts();
    if let Some(field) = form.missing_text_field() {
        return error_response(ValidationError::BlankField(field).into());
    }
    if let Err(error) = form.validate() {
        return error_response(error.into());
    }

    match orchestrator.get_application(id) {
        Ok(application) if application.has_fulfilled(DataRequirement::ApplicationDetails) => {
            return error_response(ValidationError::DetailsAlreadySubmitted.into());
        }
        Ok(_) => {}
        Err(error) => return error_response(error),
    }

    match orchestrator.submit_application_details(id, form).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<S, G>(
    State(orchestrator): State<Arc<ApplicationOrchestrator<S, G>>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    match orchestrator.get_application(ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, Json(application.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn data_connection_webhook<S, G>(
    State(orchestrator): State<Arc<ApplicationOrchestrator<S, G>>>,
    Json(alert): Json<DataConnectionStatusAlert>,
) -> Response
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    info!(company_id = %alert.envelope.company_id, status = %alert.data.new_status, "data-connection-status webhook");
    match orchestrator
        .on_data_connection_status_changed(alert.into())
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn data_sync_webhook<S, G>(
    State(orchestrator): State<Arc<ApplicationOrchestrator<S, G>>>,
    Json(alert): Json<DataSyncCompleteAlert>,
) -> Response
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    info!(company_id = %alert.envelope.company_id, data_type = %alert.data.data_type, "datatype-sync-complete webhook");
    match orchestrator.on_data_type_sync_completed(alert.into()).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn categorisation_webhook<S, G>(
    State(orchestrator): State<Arc<ApplicationOrchestrator<S, G>>>,
    Json(alert): Json<AccountCategorisationAlert>,
) -> Response
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    info!(company_id = %alert.envelope.company_id, "account-categorisation-update webhook");
    match orchestrator
        .on_account_categorization_updated(alert.into())
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: ApplicationError) -> Response {
    let status = match &error {
        ApplicationError::Validation(_) => StatusCode::BAD_REQUEST,
        ApplicationError::Store(StoreError::NotFound(_) | StoreError::CompanyNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        ApplicationError::Store(_) | ApplicationError::MissingAccountingConnection { .. } => {
            StatusCode::CONFLICT
        }
        ApplicationError::Gateway(gateway) if gateway.is_transient() => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ApplicationError::Gateway(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        warn!(error = %error, "request failed");
    }

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
