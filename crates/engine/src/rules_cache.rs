// In crates/engine/src/rules_cache.rs

use anyhow::{Context, Result};
use database::Store;
use risk::RuleTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-process snapshot of the group rule table, refreshed after `ttl`.
pub struct RulesCache {
    store: Arc<dyn Store>,
    ttl: Duration,
    state: RwLock<Option<(Instant, Arc<RuleTable>)>>,
}

impl RulesCache {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: RwLock::new(None),
        }
    }

    /// Returns the current table, reloading it when stale.
    ///
    /// A failed reload keeps serving the previous snapshot. Only when no
    /// snapshot has ever been loaded is the error returned.
    pub async fn snapshot(&self) -> Result<Arc<RuleTable>> {
        if let Some((loaded_at, table)) = self.state.read().await.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(table.clone());
            }
        }

        let mut state = self.state.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some((loaded_at, table)) = state.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(table.clone());
            }
        }

        match self.store.load_rule_table().await {
            Ok(rows) => {
                let table = Arc::new(RuleTable::new(rows));
                tracing::debug!(groups = table.len(), "Risk group table refreshed.");
                *state = Some((Instant::now(), table.clone()));
                Ok(table)
            }
            Err(e) => match state.as_ref() {
                Some((_, previous)) => {
                    tracing::warn!(error = %e, "Risk group refresh failed. Using previous snapshot.");
                    Ok(previous.clone())
                }
                None => Err(e).context("loading risk group table"),
            },
        }
    }
}
