//! Boundary to the financial-data provider.
//!
//! The orchestrator only depends on [`FinancialDataGateway`]; [`CodatClient`] is the HTTP
//! implementation and [`AccountingPlatformCache`] memoizes the accounting integration keys.

mod codat;
mod platforms;

pub use codat::{CodatClient, WebhookRule, WebhookNotifiers};
pub use platforms::AccountingPlatformCache;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{CompanyId, ConnectionId, FinancialStatement};

/// Months covered by the single reporting period requested for underwriting.
pub const REPORT_PERIOD_MONTHS: u32 = 12;

/// Company created by the provider on behalf of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

/// Operations the lifecycle consumes from the provider.
#[async_trait]
pub trait FinancialDataGateway: Send + Sync {
    async fn create_company(&self, name: &str) -> Result<Company, GatewayError>;

    /// Keys of every integration whose source type is accounting.
    async fn accounting_platform_keys(&self) -> Result<HashSet<String>, GatewayError>;

    async fn profit_and_loss(
        &self,
        company_id: CompanyId,
        connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError>;

    async fn balance_sheet(
        &self,
        company_id: CompanyId,
        connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError>;
}

/// Webhook rule management, used only while the server starts and stops.
#[async_trait]
pub trait WebhookRules: Send + Sync {
    async fn create_rule(&self, rule_type: &str, webhook_url: &str)
        -> Result<WebhookRule, GatewayError>;

    /// Deleting a rule that no longer exists succeeds.
    async fn delete_rule(&self, id: Uuid) -> Result<(), GatewayError>;
}

/// Failure talking to the provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway call {operation} timed out")]
    Timeout { operation: &'static str },
    #[error("gateway call {operation} failed with status code {status}")]
    Status { operation: &'static str, status: u16 },
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway returned an unreadable payload: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether repeating the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout { .. } | GatewayError::Transport(_) => true,
            GatewayError::Status { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Decode(_) => false,
        }
    }
}

/// Bounds a gateway call by `limit`, turning expiry into [`GatewayError::Timeout`].
pub async fn within<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout { operation }),
    }
}

/// First day of the month preceding `date_created`; statements are requested up to this date.
pub fn report_anchor(date_created: NaiveDate) -> NaiveDate {
    let first_of_month = date_created.with_day(1).unwrap_or(date_created);
    first_of_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(first_of_month)
}
