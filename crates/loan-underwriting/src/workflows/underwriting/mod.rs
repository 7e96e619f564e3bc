//! Loan application lifecycle, underwriting engine and the Codat integration feeding them.

pub mod domain;
pub(crate) mod evaluation;
pub mod events;
pub mod gateway;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationForm, ApplicationId, ApplicationStatus, ApplicationView, CompanyId,
    ConnectionId, DataRequirement, FinancialStatement, StatementKind, StatementLine,
    ValidationError,
};
pub use evaluation::{
    LoanUnderwriter, RuleCheck, StatementError, UnderwritingDecision, UnderwritingOutcome,
    UnderwritingParameters, UnderwritingRule,
};
pub use events::{AccountCategorizationUpdated, DataConnectionStatusChanged, DataTypeSyncCompleted};
pub use gateway::{
    AccountingPlatformCache, CodatClient, FinancialDataGateway, GatewayError, WebhookNotifiers,
    WebhookRule, WebhookRules,
};
pub use router::application_router;
pub use service::{ApplicationError, ApplicationOrchestrator};
pub use store::{ApplicationStore, InMemoryApplicationStore, StoreError};
