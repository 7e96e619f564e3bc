use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{Company, FinancialDataGateway, GatewayError, WebhookRules, REPORT_PERIOD_MONTHS};
use crate::workflows::underwriting::domain::{
    CompanyId, ConnectionId, FinancialStatement, StatementKind, StatementLine,
};

const INTEGRATIONS_QUERY: &str = "/integrations?page=1&pageSize=2000&query=sourceType%3DAccounting";

/// Codat API client.
#[derive(Debug, Clone)]
pub struct CodatClient {
    http: reqwest::Client,
    base_url: String,
}

impl CodatClient {
    /// `authorization` is the complete header value issued by the Codat portal (`Basic ...`).
    pub fn new(
        base_url: impl Into<String>,
        authorization: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut auth = HeaderValue::from_str(authorization)
            .map_err(|err| GatewayError::Transport(format!("invalid authorization header: {err}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|err| transport_error(operation, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, GatewayError> {
        response
            .json::<T>()
            .await
            .map_err(|err| transport_error(operation, err))
    }

    async fn statement(
        &self,
        operation: &'static str,
        kind: StatementKind,
        company_id: CompanyId,
        connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError> {
        let endpoint = match kind {
            StatementKind::ProfitAndLoss => "enhancedProfitAndLoss",
            StatementKind::BalanceSheet => "enhancedBalanceSheet",
        };
        let url = self.url(&format!(
            "{}/{endpoint}?{}&includeDisplayNames=true",
            assess_path(company_id, connection_id),
            assess_query(report_date)
        ));
        debug!(%company_id, %connection_id, %report_date, endpoint, "requesting statement");

        let response = self.send(operation, self.http.get(url)).await?;
        let report: EnhancedReport = Self::read_json(operation, response).await?;
        Ok(flatten_report(&report, kind, report_date))
    }
}

#[async_trait]
impl FinancialDataGateway for CodatClient {
    async fn create_company(&self, name: &str) -> Result<Company, GatewayError> {
        const OPERATION: &str = "create_company";
        let request = self
            .http
            .post(self.url("/companies"))
            .json(&NewCompany { name });
        let response = self.send(OPERATION, request).await?;
        Self::read_json(OPERATION, response).await
    }

    async fn accounting_platform_keys(&self) -> Result<HashSet<String>, GatewayError> {
        const OPERATION: &str = "list_accounting_platforms";
        let response = self
            .send(OPERATION, self.http.get(self.url(INTEGRATIONS_QUERY)))
            .await?;
        let page: Paginated<Integration> = Self::read_json(OPERATION, response).await?;
        Ok(page
            .results
            .into_iter()
            .map(|integration| integration.key)
            .collect())
    }

    async fn profit_and_loss(
        &self,
        company_id: CompanyId,
        connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError> {
        self.statement(
            "profit_and_loss",
            StatementKind::ProfitAndLoss,
            company_id,
            connection_id,
            report_date,
        )
        .await
    }

    async fn balance_sheet(
        &self,
        company_id: CompanyId,
        connection_id: ConnectionId,
        report_date: NaiveDate,
    ) -> Result<FinancialStatement, GatewayError> {
        self.statement(
            "balance_sheet",
            StatementKind::BalanceSheet,
            company_id,
            connection_id,
            report_date,
        )
        .await
    }
}

#[async_trait]
impl WebhookRules for CodatClient {
    async fn create_rule(
        &self,
        rule_type: &str,
        webhook_url: &str,
    ) -> Result<WebhookRule, GatewayError> {
        const OPERATION: &str = "create_rule";
        let rule = WebhookRule {
            id: None,
            rule_type: rule_type.to_string(),
            notifiers: WebhookNotifiers {
                webhook: webhook_url.to_string(),
            },
        };
        let request = self.http.post(self.url("/rules")).json(&rule);
        let response = self.send(OPERATION, request).await?;
        Self::read_json(OPERATION, response).await
    }

    async fn delete_rule(&self, id: Uuid) -> Result<(), GatewayError> {
        let response = self
            .http
            .delete(self.url(&format!("/rules/{id}")))
            .send()
            .await
            .map_err(|err| transport_error("delete_rule", err))?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(GatewayError::Status {
                operation: "delete_rule",
                status: status.as_u16(),
            }),
        }
    }
}

/// Alert rule pointing Codat at one of our webhook endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub notifiers: WebhookNotifiers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotifiers {
    pub webhook: String,
}

#[derive(Serialize)]
struct NewCompany<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct Paginated<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct Integration {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhancedReport {
    #[serde(default)]
    report_data: Vec<ReportComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportComponent {
    item_display_name: String,
    #[serde(default)]
    components: Vec<ReportComponent>,
    #[serde(default)]
    measures: Vec<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: Decimal,
}

fn transport_error(operation: &'static str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout { operation }
    } else if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else {
        GatewayError::Transport(err.to_string())
    }
}

fn assess_path(company_id: CompanyId, connection_id: ConnectionId) -> String {
    format!("/data/companies/{company_id}/connections/{connection_id}/assess")
}

fn assess_query(report_date: NaiveDate) -> String {
    format!(
        "reportDate={}&periodLength={REPORT_PERIOD_MONTHS}&numberOfPeriods=1",
        report_date.format("%d-%m-%Y")
    )
}

/// Leaf components become lines; every measure is one period counted back from `report_date`.
fn flatten_report(
    report: &EnhancedReport,
    kind: StatementKind,
    report_date: NaiveDate,
) -> FinancialStatement {
    let mut lines = Vec::new();
    for component in &report.report_data {
        collect_lines(component, None, report_date, &mut lines);
    }
    FinancialStatement::new(kind, lines)
}

fn collect_lines(
    component: &ReportComponent,
    parent: Option<&str>,
    report_date: NaiveDate,
    lines: &mut Vec<StatementLine>,
) {
    let segment = category_segment(&component.item_display_name);
    let path = match parent {
        Some(parent) => format!("{parent}.{segment}"),
        None => segment,
    };

    if component.components.is_empty() {
        for (period, measure) in component.measures.iter().enumerate() {
            lines.push(StatementLine {
                account_category: path.clone(),
                date: period_end(report_date, period),
                balance: measure.value,
            });
        }
        return;
    }

    for child in &component.components {
        collect_lines(child, Some(&path), report_date, lines);
    }
}

/// `"Cost of sales"` -> `"CostOfSales"`, `"Non-current"` -> `"NonCurrent"`.
fn category_segment(display_name: &str) -> String {
    display_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn period_end(report_date: NaiveDate, period: usize) -> NaiveDate {
    let months = u32::try_from(period)
        .ok()
        .and_then(|period| period.checked_mul(REPORT_PERIOD_MONTHS))
        .unwrap_or(0);
    report_date
        .checked_sub_months(Months::new(months))
        .unwrap_or(report_date)
}
