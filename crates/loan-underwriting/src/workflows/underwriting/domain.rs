use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum loan duration accepted at intake, in months.
pub const MINIMUM_LOAN_TERM_MONTHS: u32 = 12;

const LINK_BASE_URL: &str = "https://link.codat.io/company";

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Company record held by the financial-data provider for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Linked accounting-platform connection of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle position of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Started,
    CollectingData,
    DataCollectionComplete,
    Underwriting,
    UnderwritingFailure,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Started => "started",
            ApplicationStatus::CollectingData => "collecting_data",
            ApplicationStatus::DataCollectionComplete => "data_collection_complete",
            ApplicationStatus::Underwriting => "underwriting",
            ApplicationStatus::UnderwritingFailure => "underwriting_failure",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// A business decision has been made; no later event changes it.
    pub const fn is_final(self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }

    /// Neither decided nor in the middle of an underwriting attempt.
    pub const fn is_idle(self) -> bool {
        !self.is_final() && !matches!(self, ApplicationStatus::Underwriting)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prerequisite data items gathered before underwriting can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataRequirement {
    ApplicationDetails,
    ChartOfAccounts,
    BalanceSheet,
    ProfitAndLoss,
    AccountsClassified,
}

impl DataRequirement {
    pub const ALL: [DataRequirement; 5] = [
        DataRequirement::ApplicationDetails,
        DataRequirement::ChartOfAccounts,
        DataRequirement::BalanceSheet,
        DataRequirement::ProfitAndLoss,
        DataRequirement::AccountsClassified,
    ];

    /// Maps a synchronized Codat data type onto the requirement it satisfies.
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        match data_type {
            "chartOfAccounts" => Some(DataRequirement::ChartOfAccounts),
            "balanceSheet" => Some(DataRequirement::BalanceSheet),
            "profitAndLoss" => Some(DataRequirement::ProfitAndLoss),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DataRequirement::ApplicationDetails => "application_details",
            DataRequirement::ChartOfAccounts => "chart_of_accounts",
            DataRequirement::BalanceSheet => "balance_sheet",
            DataRequirement::ProfitAndLoss => "profit_and_loss",
            DataRequirement::AccountsClassified => "accounts_classified",
        }
    }
}

/// Applicant supplied loan details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    pub company_name: String,
    pub full_name: String,
    pub loan_amount: Decimal,
    pub loan_term: u32,
    pub loan_purpose: String,
}

impl ApplicationForm {
    /// Checks the numeric loan terms underwriting depends on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.loan_amount <= Decimal::ZERO || self.loan_term < MINIMUM_LOAN_TERM_MONTHS {
            return Err(ValidationError::InvalidLoanTerms {
                loan_amount: self.loan_amount,
                loan_term: self.loan_term,
            });
        }
        Ok(())
    }

    /// Returns the first descriptive field left blank, if any.
    pub fn missing_text_field(&self) -> Option<&'static str> {
        [
            ("companyName", &self.company_name),
            ("fullName", &self.full_name),
            ("loanPurpose", &self.loan_purpose),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}

/// Input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "loan amount and/or term is invalid (amount {loan_amount}, term {loan_term}): amount must be a positive, non-zero value and term must be at least 12 months"
    )]
    InvalidLoanTerms { loan_amount: Decimal, loan_term: u32 },
    #[error("{0} must not be blank")]
    BlankField(&'static str),
    #[error("application details have already been received")]
    DetailsAlreadySubmitted,
}

/// A loan application and its accumulated lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub company_id: CompanyId,
    pub status: ApplicationStatus,
    pub form: Option<ApplicationForm>,
    pub accounting_connection: Option<ConnectionId>,
    pub date_created: NaiveDate,
    pub requirements: BTreeSet<DataRequirement>,
}

impl Application {
    pub fn new(id: ApplicationId, company_id: CompanyId, date_created: NaiveDate) -> Self {
        Self {
            id,
            company_id,
            status: ApplicationStatus::Started,
            form: None,
            accounting_connection: None,
            date_created,
            requirements: BTreeSet::new(),
        }
    }

    pub fn has_fulfilled(&self, requirement: DataRequirement) -> bool {
        self.requirements.contains(&requirement)
    }

    pub fn requirements_met(&self) -> bool {
        DataRequirement::ALL
            .iter()
            .all(|requirement| self.requirements.contains(requirement))
    }

    pub fn outstanding_requirements(&self) -> Vec<DataRequirement> {
        DataRequirement::ALL
            .into_iter()
            .filter(|requirement| !self.requirements.contains(requirement))
            .collect()
    }

    /// Hosted page where the applicant links their accounting platform.
    pub fn link_url(&self) -> String {
        format!("{LINK_BASE_URL}/{}", self.company_id)
    }

    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            id: self.id,
            status: self.status,
            codat_company_id: self.company_id,
            link_url: self.link_url(),
            form: self.form.clone(),
        }
    }
}

/// Externally visible projection of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    pub codat_company_id: CompanyId,
    pub link_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<ApplicationForm>,
}

/// Which financial statement a set of lines belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    ProfitAndLoss,
    BalanceSheet,
}

impl StatementKind {
    pub const fn label(self) -> &'static str {
        match self {
            StatementKind::ProfitAndLoss => "profit_and_loss",
            StatementKind::BalanceSheet => "balance_sheet",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One categorized balance, e.g. `Income.Operating.Sales`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub account_category: String,
    pub date: NaiveDate,
    pub balance: Decimal,
}

/// Categorized statement retrieved for a single underwriting attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStatement {
    pub kind: StatementKind,
    pub lines: Vec<StatementLine>,
}

impl FinancialStatement {
    pub fn new(kind: StatementKind, lines: Vec<StatementLine>) -> Self {
        Self { kind, lines }
    }

    pub fn lines_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a StatementLine> {
        self.lines
            .iter()
            .filter(move |line| line.account_category.starts_with(prefix))
    }
}
