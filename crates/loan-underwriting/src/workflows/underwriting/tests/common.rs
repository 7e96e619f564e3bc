use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::workflows::underwriting::domain::{
    ApplicationForm, CompanyId, ConnectionId, FinancialStatement, StatementKind, StatementLine,
};
use crate::workflows::underwriting::events::{
    AccountCategorizationUpdated, DataConnectionStatusChanged, DataTypeSyncCompleted,
};
use crate::workflows::underwriting::gateway::{
    AccountingPlatformCache, Company, FinancialDataGateway, GatewayError,
};
use crate::workflows::underwriting::{
    application_router, ApplicationOrchestrator, InMemoryApplicationStore, UnderwritingParameters,
};

pub(super) type Orchestrator = ApplicationOrchestrator<InMemoryApplicationStore, FakeGateway>;

pub(super) const ACCOUNTING_KEY: &str = "gbol";
pub(super) const BANKING_KEY: &str = "ztdp";

pub(super) fn period_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 1).expect("valid date")
}

pub(super) fn statement(kind: StatementKind, lines: &[(&str, i64)]) -> FinancialStatement {
    FinancialStatement::new(
        kind,
        lines
            .iter()
            .map(|(category, balance)| StatementLine {
                account_category: category.to_string(),
                date: period_end(),
                balance: Decimal::new(*balance, 0),
            })
            .collect(),
    )
}

/// Margin 0.75 and monthly revenue of 10,000.
pub(super) fn healthy_profit_and_loss() -> FinancialStatement {
    statement(
        StatementKind::ProfitAndLoss,
        &[
            ("Income.Operating.Sales", 100_000),
            ("Income.Operating.Services", 20_000),
            ("Income.Other.Interest", 4_000),
            ("Expense.CostOfSales.Materials", 30_000),
            ("Expense.Operating.Rent", 12_000),
        ],
    )
}

/// Gearing 0.2.
pub(super) fn healthy_balance_sheet() -> FinancialStatement {
    statement(
        StatementKind::BalanceSheet,
        &[
            ("Asset.Current.Cash", 60_000),
            ("Asset.NonCurrent.Equipment", 40_000),
            ("Liability.NonCurrent.LoansPayable.BankLoan", 20_000),
            ("Liability.Current.AccountsPayable", 15_000),
        ],
    )
}

/// Margin 0.1, well under any sensible minimum.
pub(super) fn thin_margin_profit_and_loss() -> FinancialStatement {
    statement(
        StatementKind::ProfitAndLoss,
        &[
            ("Income.Operating.Sales", 120_000),
            ("Expense.CostOfSales.Materials", 108_000),
        ],
    )
}

pub(super) fn form() -> ApplicationForm {
    ApplicationForm {
        company_name: "Toft stores".to_string(),
        full_name: "Jane Doe".to_string(),
        loan_amount: Decimal::new(25_000, 0),
        loan_term: 24,
        loan_purpose: "Stock for the winter season".to_string(),
    }
}

/// In-process stand-in for the financial-data provider.
pub(super) struct FakeGateway {
    accounting_keys: HashSet<String>,
    profit_and_loss: Mutex<FinancialStatement>,
    balance_sheet: Mutex<FinancialStatement>,
    create_failure: Mutex<Option<GatewayError>>,
    statement_failure: Mutex<Option<GatewayError>>,
    statement_delay: Mutex<Option<Duration>>,
    pub(super) create_calls: AtomicUsize,
    pub(super) platform_calls: AtomicUsize,
    pub(super) statement_calls: AtomicUsize,
    pub(super) report_dates: Mutex<Vec<NaiveDate>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            accounting_keys: [ACCOUNTING_KEY, "qudb", "pqsw"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            profit_and_loss: Mutex::new(healthy_profit_and_loss()),
            balance_sheet: Mutex::new(healthy_balance_sheet()),
            create_failure: Mutex::new(None),
            statement_failure: Mutex::new(None),
            statement_delay: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
            platform_calls: AtomicUsize::new(0),
            statement_calls: AtomicUsize::new(0),
            report_dates: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub(super) fn with_statements(
        profit_and_loss: FinancialStatement,
        balance_sheet: FinancialStatement,
    ) -> Self {
        Self {
            profit_and_loss: Mutex::new(profit_and_loss),
            balance_sheet: Mutex::new(balance_sheet),
            ..Self::default()
        }
    }

    pub(super) fn fail_company_creation(&self, error: GatewayError) {
        *self.create_failure.lock().expect("gateway mutex poisoned") = Some(error);
    }

    pub(super) fn fail_statements(&self, error: Option<GatewayError>) {
        *self.statement_failure.lock().expect("gateway mutex poisoned") = error;
    }

    pub(super) fn delay_statements(&self, delay: Duration) {
        *self.statement_delay.lock().expect("gateway mutex poisoned") = Some(delay);
    }

    pub(super) fn statement_calls(&self) -> usize {
        self.statement_calls.load(Ordering::SeqCst)
    }

    pub(super) fn platform_calls(&self) -> usize {
        self.platform_calls.load(Ordering::SeqCst)
    }

    async fn statement(
        &self,
        source: &Mutex<FinancialStatement>,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError> {
        self.statement_calls.fetch_add(1, Ordering::SeqCst);
        self.report_dates
            .lock()
            .expect("gateway mutex poisoned")
            .push(report_date);

        let delay = *self.statement_delay.lock().expect("gateway mutex poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .statement_failure
            .lock()
            .expect("gateway mutex poisoned")
            .clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(source.lock().expect("gateway mutex poisoned").clone()),
        }
    }
}

#[async_trait]
impl FinancialDataGateway for FakeGateway {
    async fn create_company(&self, name: &str) -> Result<Company, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .create_failure
            .lock()
            .expect("gateway mutex poisoned")
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(Company {
            id: CompanyId(Uuid::new_v4()),
            name: name.to_string(),
        })
    }

    async fn accounting_platform_keys(&self) -> Result<HashSet<String>, GatewayError> {
        self.platform_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounting_keys.clone())
    }

    async fn profit_and_loss(
        &self,
        _company_id: CompanyId,
        _connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError> {
        self.statement(&self.profit_and_loss, report_date).await
    }

    async fn balance_sheet(
        &self,
        _company_id: CompanyId,
        _connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError> {
        self.statement(&self.balance_sheet, report_date).await
    }
}

pub(super) fn build_orchestrator(
    gateway: FakeGateway,
) -> (Orchestrator, Arc<InMemoryApplicationStore>, Arc<FakeGateway>) {
    let store = Arc::new(InMemoryApplicationStore::new());
    let gateway = Arc::new(gateway);
    let orchestrator = ApplicationOrchestrator::new(
        store.clone(),
        gateway.clone(),
        Arc::new(AccountingPlatformCache::new()),
        UnderwritingParameters::default(),
    );
    (orchestrator, store, gateway)
}

pub(super) fn linked(company_id: CompanyId, connection_id: ConnectionId) -> DataConnectionStatusChanged {
    DataConnectionStatusChanged {
        company_id,
        connection_id,
        new_status: "Linked".to_string(),
        platform_key: ACCOUNTING_KEY.to_string(),
    }
}

pub(super) fn synced(
    company_id: CompanyId,
    connection_id: ConnectionId,
    data_type: &str,
) -> DataTypeSyncCompleted {
    DataTypeSyncCompleted {
        company_id,
        connection_id,
        data_type: data_type.to_string(),
    }
}

pub(super) fn categorised(company_id: CompanyId) -> AccountCategorizationUpdated {
    AccountCategorizationUpdated { company_id }
}

/// Drives an application through every requirement except accounts classification.
pub(super) async fn collect_all_but_categorisation(
    orchestrator: &Orchestrator,
) -> (CompanyId, ConnectionId, crate::workflows::underwriting::ApplicationId) {
    let application = orchestrator
        .create_application()
        .await
        .expect("application created");
    let connection = ConnectionId(Uuid::new_v4());

    orchestrator
        .submit_application_details(application.id, form())
        .await
        .expect("form accepted");
    orchestrator
        .on_data_connection_status_changed(linked(application.company_id, connection))
        .await
        .expect("connection recorded");
    for data_type in ["chartOfAccounts", "balanceSheet", "profitAndLoss"] {
        orchestrator
            .on_data_type_sync_completed(synced(application.company_id, connection, data_type))
            .await
            .expect("sync recorded");
    }

    (application.company_id, connection, application.id)
}

pub(super) fn router_for(orchestrator: Orchestrator) -> axum::Router {
    application_router(Arc::new(orchestrator))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
