use loan_underwriting::error::AppError;
use loan_underwriting::workflows::underwriting::{WebhookRule, WebhookRules};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Codat rule types and the routes that receive them.
pub(crate) const WEBHOOK_ENDPOINTS: [(&str, &str); 3] = [
    (
        "DataConnectionStatusChanged",
        "/webhooks/codat/data-connection-status",
    ),
    (
        "Data sync completed",
        "/webhooks/codat/datatype-sync-complete",
    ),
    (
        "account-categories-updated",
        "/webhooks/codat/account-categorisation-update",
    ),
];

/// Registers this service's alert rules with Codat and removes them again on shutdown.
///
/// Created rules are remembered in `rules_file` so that rules left behind by a run that did
/// not shut down cleanly are removed the next time the service starts.
pub(crate) struct WebhookRegistrar<W: ?Sized> {
    rules: Arc<W>,
    base_url: String,
    rules_file: PathBuf,
}

impl<W> WebhookRegistrar<W>
where
    W: WebhookRules + ?Sized,
{
    pub(crate) fn new(rules: Arc<W>, base_url: impl Into<String>, rules_file: PathBuf) -> Self {
        Self {
            rules,
            base_url: base_url.into(),
            rules_file,
        }
    }

    pub(crate) async fn register(&self) -> Result<Vec<WebhookRule>, AppError> {
        let stale = self.stored_rules().await?;

        let mut created = Vec::with_capacity(WEBHOOK_ENDPOINTS.len());
        for (rule_type, path) in WEBHOOK_ENDPOINTS {
            let url = format!("{}{}", self.base_url, path);
            let rule = self.rules.create_rule(rule_type, &url).await?;
            info!(rule_type, %url, rule_id = ?rule.id, "registered codat webhook rule");
            created.push(rule);
        }

        let kept = self.remove(&stale).await;
        if !stale.is_empty() {
            info!(
                removed = stale.len() - kept.len(),
                kept = kept.len(),
                "removed webhook rules from a previous run"
            );
        }

        let mut remembered = created.clone();
        remembered.extend(kept);
        self.write_rules(&remembered).await?;
        Ok(created)
    }

    /// Deletes every remembered rule; rules that could not be deleted stay in the file.
    pub(crate) async fn teardown(&self) -> Result<usize, AppError> {
        let stored = self.stored_rules().await?;
        let kept = self.remove(&stored).await;
        let removed = stored.iter().filter(|rule| rule.id.is_some()).count() - kept.len();

        if !kept.is_empty() {
            self.write_rules(&kept).await?;
        } else if tokio::fs::try_exists(&self.rules_file).await? {
            tokio::fs::remove_file(&self.rules_file).await?;
        }
        info!(removed, kept = kept.len(), "codat webhook rules removed");
        Ok(removed)
    }

    async fn write_rules(&self, rules: &[WebhookRule]) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(rules)
            .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
        tokio::fs::write(&self.rules_file, json).await?;
        Ok(())
    }

    async fn stored_rules(&self) -> Result<Vec<WebhookRule>, AppError> {
        let raw = match tokio::fs::read(&self.rules_file).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(rules) => Ok(rules),
            Err(err) => {
                warn!(file = %self.rules_file.display(), error = %err, "ignoring unreadable webhook rule file");
                Ok(Vec::new())
            }
        }
    }

    /// Returns the rules whose deletion failed.
    async fn remove(&self, rules: &[WebhookRule]) -> Vec<WebhookRule> {
        let mut kept = Vec::new();
        for rule in rules {
            let Some(id) = rule.id else {
                continue;
            };
            if let Err(err) = self.rules.delete_rule(id).await {
                warn!(rule_id = %id, error = %err, "failed to delete codat webhook rule");
                kept.push(rule.clone());
            }
        }
        kept
    }
}
