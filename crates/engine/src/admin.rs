// In crates/engine/src/admin.rs

use anyhow::{Context, Result};
use api_client::VenueBridge;
use core_types::{Account, Login};
use database::{AuditEntry, Store};
use serde_json::json;
use std::sync::Arc;

/// Operator actions that bypass the evaluation pipeline.
pub struct AdminActions {
    store: Arc<dyn Store>,
    bridge: Arc<dyn VenueBridge>,
}

impl AdminActions {
    pub fn new(store: Arc<dyn Store>, bridge: Arc<dyn VenueBridge>) -> Self {
        Self { store, bridge }
    }

    async fn account(&self, login: Login) -> Result<Account> {
        self.store
            .get_account_by_login(login)
            .await?
            .with_context(|| format!("no account with login {login}"))
    }

    async fn audit(&self, message: String, details: serde_json::Value) {
        let entry = AuditEntry {
            source: "admin".to_string(),
            level: "info".to_string(),
            message,
            details,
        };
        if let Err(e) = self.store.insert_audit_log(&entry).await {
            tracing::warn!(error = %e, "Failed to write audit entry.");
        }
    }

    /// Reverses a breach or disable: the account is active again locally and
    /// re-enabled on the bridge. Returns `false` when it was not breached or disabled.
    pub async fn reinstate(&self, login: Login) -> Result<bool> {
        let account = self.account(login).await?;
        if !self.store.reinstate(account.id).await? {
            tracing::warn!(%login, status = account.status.as_str(), "Account is not breached or disabled. Nothing to reinstate.");
            return Ok(false);
        }
        self.bridge
            .enable_account(login)
            .await
            .context("account reinstated locally but enabling it on the bridge failed")?;

        tracing::info!(%login, "Account reinstated.");
        self.audit(
            format!("Account {login} reinstated"),
            json!({ "login": login, "previous_status": account.status.as_str() }),
        )
        .await;
        Ok(true)
    }

    pub async fn adjust_balance(&self, login: Login, amount: f64) -> Result<()> {
        self.account(login).await?;
        self.bridge
            .adjust_balance(login, amount, "admin adjustment")
            .await?;
        tracing::info!(%login, amount, "Balance adjusted.");
        self.audit(
            format!("Balance of {login} adjusted by {amount}"),
            json!({ "login": login, "amount": amount }),
        )
        .await;
        Ok(())
    }

    pub async fn set_leverage(&self, login: Login, leverage: u32) -> Result<()> {
        self.account(login).await?;
        self.bridge.change_leverage(login, leverage).await?;
        tracing::info!(%login, leverage, "Leverage changed.");
        self.audit(
            format!("Leverage of {login} set to 1:{leverage}"),
            json!({ "login": login, "leverage": leverage }),
        )
        .await;
        Ok(())
    }
}
