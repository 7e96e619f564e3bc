use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::debug;

use super::{within, FinancialDataGateway, GatewayError};

/// Read-through cache of accounting integration keys.
///
/// The key set is fetched on first use and kept for the life of the cache. Concurrent first
/// lookups wait on a single fetch; a failed fetch leaves the cache empty for the next caller.
#[derive(Debug, Default)]
pub struct AccountingPlatformCache {
    keys: OnceCell<HashSet<String>>,
}

impl AccountingPlatformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated cache; the gateway is never consulted.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        Self {
            keys: OnceCell::new_with(Some(keys)),
        }
    }

    pub async fn is_accounting_platform<G>(
        &self,
        gateway: &G,
        limit: Duration,
        platform_key: &str,
    ) -> Result<bool, GatewayError>
    where
        G: FinancialDataGateway + ?Sized,
    {
        let keys = self
            .keys
            .get_or_try_init(|| async {
                let keys = within(
                    limit,
                    "list_accounting_platforms",
                    gateway.accounting_platform_keys(),
                )
                .await?;
                debug!(count = keys.len(), "cached accounting platform keys");
                Ok::<_, GatewayError>(keys)
            })
            .await?;
        Ok(keys.contains(platform_key))
    }
}
