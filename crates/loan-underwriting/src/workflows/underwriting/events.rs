//! Inbound lifecycle events and the Codat alert payloads that carry them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{CompanyId, ConnectionId};

/// Connection status reported for the accounting connection linked through the hosted link.
pub const LINKED_STATUS: &str = "Linked";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConnectionStatusChanged {
    pub company_id: CompanyId,
    pub connection_id: ConnectionId,
    pub new_status: String,
    pub platform_key: String,
}

impl DataConnectionStatusChanged {
    pub fn is_linked(&self) -> bool {
        self.new_status == LINKED_STATUS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeSyncCompleted {
    pub company_id: CompanyId,
    pub connection_id: ConnectionId,
    pub data_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountCategorizationUpdated {
    pub company_id: CompanyId,
}

/// Fields shared by every Codat alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEnvelope {
    pub company_id: CompanyId,
    #[serde(default)]
    pub rule_id: Option<Uuid>,
    #[serde(default)]
    pub alert_id: Option<Uuid>,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the "DataConnectionStatusChanged" rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConnectionStatusAlert {
    #[serde(flatten)]
    pub envelope: AlertEnvelope,
    pub data: DataConnectionStatusData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConnectionStatusData {
    pub data_connection_id: ConnectionId,
    pub new_status: String,
    pub platform_key: String,
}

/// Body of the "Data sync completed" rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSyncCompleteAlert {
    #[serde(flatten)]
    pub envelope: AlertEnvelope,
    pub data_connection_id: ConnectionId,
    pub data: DataSyncCompleteData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSyncCompleteData {
    #[serde(default)]
    pub dataset_id: Option<Uuid>,
    pub data_type: String,
}

/// Body of the "account-categories-updated" rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCategorisationAlert {
    #[serde(flatten)]
    pub envelope: AlertEnvelope,
}

impl From<DataConnectionStatusAlert> for DataConnectionStatusChanged {
    fn from(alert: DataConnectionStatusAlert) -> Self {
        Self {
            company_id: alert.envelope.company_id,
            connection_id: alert.data.data_connection_id,
            new_status: alert.data.new_status,
            platform_key: alert.data.platform_key,
        }
    }
}

impl From<DataSyncCompleteAlert> for DataTypeSyncCompleted {
    fn from(alert: DataSyncCompleteAlert) -> Self {
        Self {
            company_id: alert.envelope.company_id,
            connection_id: alert.data_connection_id,
            data_type: alert.data.data_type,
        }
    }
}

impl From<AccountCategorisationAlert> for AccountCategorizationUpdated {
    fn from(alert: AccountCategorisationAlert) -> Self {
        Self {
            company_id: alert.envelope.company_id,
        }
    }
}
