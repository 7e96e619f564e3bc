use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::domain::{
    Application, ApplicationForm, ApplicationId, ApplicationStatus, CompanyId, ConnectionId,
    DataRequirement, ValidationError,
};
use super::evaluation::{LoanUnderwriter, UnderwritingParameters};
use super::events::{AccountCategorizationUpdated, DataConnectionStatusChanged, DataTypeSyncCompleted};
use super::gateway::{
    report_anchor, within, AccountingPlatformCache, FinancialDataGateway, GatewayError,
};
use super::store::{ApplicationStore, StoreError};

/// Default bound on every call into the financial-data gateway.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Application lifecycle state machine.
///
/// Owns every transition of `status` and the fulfilled requirement set. Handlers may run
/// concurrently; the only suspension points are gateway calls.
pub struct ApplicationOrchestrator<S, G: ?Sized> {
    store: Arc<S>,
    gateway: Arc<G>,
    platforms: Arc<AccountingPlatformCache>,
    underwriter: Arc<LoanUnderwriter>,
    gateway_timeout: Duration,
}

impl<S, G> ApplicationOrchestrator<S, G>
where
    S: ApplicationStore + 'static,
    G: FinancialDataGateway + ?Sized + 'static,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        platforms: Arc<AccountingPlatformCache>,
        parameters: UnderwritingParameters,
    ) -> Self {
        Self {
            store,
            gateway,
            platforms,
            underwriter: Arc::new(LoanUnderwriter::new(parameters)),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Creates the provider company first; nothing is stored if that fails.
    pub async fn create_application(&self) -> Result<Application, ApplicationError> {
        let id = ApplicationId::generate();
        let company = within(
            self.gateway_timeout,
            "create_company",
            self.gateway.create_company(&id.to_string()),
        )
        .await?;

        let application = self.store.create(id, company.id)?;
        info!(application_id = %id, company_id = %company.id, "application started");
        Ok(application)
    }

    pub fn get_application(&self, id: ApplicationId) -> Result<Application, ApplicationError> {
        Ok(self.store.get(id)?)
    }

    pub async fn submit_application_details(
        &self,
        id: ApplicationId,
        form: ApplicationForm,
    ) -> Result<(), ApplicationError> {
        form.validate()?;

        let application = self.store.get(id)?;
        if application.status.is_final() {
            info!(application_id = %id, status = %application.status, "ignoring form for decided application");
            return Ok(());
        }

        self.store.set_form(id, form)?;
        self.store
            .add_fulfilled_requirement(id, DataRequirement::ApplicationDetails)?;
        self.enter_collecting_data(id)?;
        info!(application_id = %id, "application details received");

        self.try_underwrite(id).await
    }

    pub async fn on_data_connection_status_changed(
        &self,
        event: DataConnectionStatusChanged,
    ) -> Result<(), ApplicationError> {
        let is_accounting = self
            .platforms
            .is_accounting_platform(&*self.gateway, self.gateway_timeout, &event.platform_key)
            .await?;
        if !is_accounting {
            debug!(company_id = %event.company_id, platform_key = %event.platform_key, "ignoring non-accounting connection");
            return Ok(());
        }

        let application = self.store.get_by_company_id(event.company_id)?;
        if application.status.is_final() {
            info!(application_id = %application.id, status = %application.status, "ignoring connection change for decided application");
            return Ok(());
        }

        match self
            .store
            .set_accounting_connection(event.company_id, event.connection_id)
        {
            Ok(()) => {}
            Err(StoreError::ConnectionConflict { existing, .. }) => {
                warn!(
                    application_id = %application.id,
                    %existing,
                    received = %event.connection_id,
                    "accounting connection already recorded, ignoring new connection"
                );
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        }
        info!(application_id = %application.id, connection_id = %event.connection_id, status = %event.new_status, "accounting connection recorded");

        if event.is_linked() {
            self.enter_collecting_data(application.id)?;
        }
        Ok(())
    }

    pub async fn on_data_type_sync_completed(
        &self,
        event: DataTypeSyncCompleted,
    ) -> Result<(), ApplicationError> {
        let application = self.store.get_by_company_id(event.company_id)?;

        let Some(recorded) = application.accounting_connection else {
            return Err(ApplicationError::MissingAccountingConnection {
                company_id: event.company_id,
                connection_id: event.connection_id,
            });
        };
        if recorded != event.connection_id {
            debug!(application_id = %application.id, %recorded, received = %event.connection_id, "ignoring sync for another connection");
            return Ok(());
        }

        let Some(requirement) = DataRequirement::from_data_type(&event.data_type) else {
            debug!(application_id = %application.id, data_type = %event.data_type, "ignoring unrequired data type");
            return Ok(());
        };
        if application.status.is_final() {
            info!(application_id = %application.id, status = %application.status, "ignoring sync for decided application");
            return Ok(());
        }

        self.fulfil(application.id, requirement)?;
        self.try_underwrite(application.id).await
    }

    /// Marks accounts classified on receipt, without re-checking categorization metrics.
    pub async fn on_account_categorization_updated(
        &self,
        event: AccountCategorizationUpdated,
    ) -> Result<(), ApplicationError> {
        let application = self.store.get_by_company_id(event.company_id)?;
        if application.status.is_final() {
            info!(application_id = %application.id, status = %application.status, "ignoring categorization for decided application");
            return Ok(());
        }

        self.fulfil(application.id, DataRequirement::AccountsClassified)?;
        self.try_underwrite(application.id).await
    }

    fn fulfil(&self, id: ApplicationId, requirement: DataRequirement) -> Result<(), ApplicationError> {
        self.store.add_fulfilled_requirement(id, requirement)?;
        debug!(application_id = %id, requirement = requirement.label(), "requirement fulfilled");
        Ok(())
    }

    /// Moves a started or failed application back to `CollectingData`.
    fn enter_collecting_data(&self, id: ApplicationId) -> Result<(), ApplicationError> {
        loop {
            let current = self.store.get(id)?.status;
            if !current.is_idle()
                || matches!(
                    current,
                    ApplicationStatus::CollectingData | ApplicationStatus::DataCollectionComplete
                )
            {
                return Ok(());
            }
            if self
                .store
                .compare_and_set_status(id, current, ApplicationStatus::CollectingData)?
            {
                return Ok(());
            }
        }
    }

    /// Requirement-completion check, followed by an underwriting attempt once data is complete.
    async fn try_underwrite(&self, id: ApplicationId) -> Result<(), ApplicationError> {
        loop {
            let application = self.store.get(id)?;
            let current = application.status;
            if !current.is_idle() {
                debug!(application_id = %id, status = %current, "skipping requirement check");
                return Ok(());
            }

            let target = if application.requirements_met() {
                ApplicationStatus::DataCollectionComplete
            } else {
                ApplicationStatus::CollectingData
            };
            if !self.store.compare_and_set_status(id, current, target)? {
                continue;
            }
            if target == ApplicationStatus::CollectingData {
                debug!(
                    application_id = %id,
                    outstanding = ?application.outstanding_requirements(),
                    "awaiting requirements"
                );
                return Ok(());
            }
            break;
        }

        if !self.store.compare_and_set_status(
            id,
            ApplicationStatus::DataCollectionComplete,
            ApplicationStatus::Underwriting,
        )? {
            debug!(application_id = %id, "underwriting already claimed by another handler");
            return Ok(());
        }
        info!(application_id = %id, "data collection complete, underwriting");

        let claim = UnderwritingClaim::new(self.store.as_ref(), id);
        let result = self.underwrite(id).await;
        claim.settle();
        result
    }

    async fn underwrite(&self, id: ApplicationId) -> Result<(), ApplicationError> {
        let application = self.store.get(id)?;
        let (Some(form), Some(connection_id)) =
            (application.form.as_ref(), application.accounting_connection)
        else {
            warn!(application_id = %id, "underwriting without form or accounting connection");
            self.store
                .update_status(id, ApplicationStatus::UnderwritingFailure)?;
            return Ok(());
        };

        let report_date = report_anchor(application.date_created);
        let statements = tokio::try_join!(
            within(
                self.gateway_timeout,
                "profit_and_loss",
                self.gateway
                    .profit_and_loss(application.company_id, connection_id, report_date),
            ),
            within(
                self.gateway_timeout,
                "balance_sheet",
                self.gateway
                    .balance_sheet(application.company_id, connection_id, report_date),
            ),
        );
        let (profit_and_loss, balance_sheet) = match statements {
            Ok(statements) => statements,
            Err(err) => {
                warn!(application_id = %id, error = %err, transient = err.is_transient(), "statement retrieval failed");
                self.store
                    .update_status(id, ApplicationStatus::UnderwritingFailure)?;
                return Err(err.into());
            }
        };

        let status = match self.underwriter.process(
            form.loan_amount,
            form.loan_term,
            &profit_and_loss,
            &balance_sheet,
        ) {
            Ok(outcome) => {
                for check in &outcome.checks {
                    debug!(application_id = %id, rule = check.rule.label(), passed = check.passed, notes = %check.notes, "underwriting check");
                }
                info!(application_id = %id, decision = %outcome.decision.summary(), "underwriting decided");
                outcome.status()
            }
            Err(err) => {
                warn!(application_id = %id, error = %err, "statements could not be evaluated");
                ApplicationStatus::UnderwritingFailure
            }
        };

        self.store.update_status(id, status)?;
        Ok(())
    }
}

/// Held while an application is claimed as `Underwriting`.
///
/// If the attempt is dropped before it records an outcome, the claim is released to
/// `UnderwritingFailure` so a redelivered event can try again.
struct UnderwritingClaim<'a, S: ApplicationStore> {
    store: &'a S,
    id: ApplicationId,
    settled: bool,
}

impl<'a, S: ApplicationStore> UnderwritingClaim<'a, S> {
    fn new(store: &'a S, id: ApplicationId) -> Self {
        Self {
            store,
            id,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl<S: ApplicationStore> Drop for UnderwritingClaim<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.store.compare_and_set_status(
            self.id,
            ApplicationStatus::Underwriting,
            ApplicationStatus::UnderwritingFailure,
        ) {
            Ok(true) => {
                warn!(application_id = %self.id, "underwriting attempt abandoned, marked as failed")
            }
            Ok(false) => {}
            Err(err) => {
                warn!(application_id = %self.id, error = %err, "could not release abandoned underwriting claim")
            }
        }
    }
}

/// Error raised by the orchestrator to the caller of an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(
        "cannot update data type sync status for company {company_id}: no accounting data connection exists (received {connection_id})"
    )]
    MissingAccountingConnection {
        company_id: CompanyId,
        connection_id: ConnectionId,
    },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApplicationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApplicationError::Store(err) if err.is_not_found())
    }
}
