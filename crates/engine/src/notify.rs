// In crates/engine/src/notify.rs

use anyhow::Result;
use async_trait::async_trait;
use core_types::Login;
use database::{AuditEntry, Store};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

/// Events the platform tells people about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    AccountBreached {
        login: Login,
        reason: String,
        equity: Option<Decimal>,
    },
    AccountPassed {
        login: Login,
        equity: Option<Decimal>,
    },
    ProfitTargetReached {
        login: Login,
        profit: Decimal,
        target: Decimal,
    },
}

impl Notification {
    pub fn login(&self) -> Login {
        match self {
            Notification::AccountBreached { login, .. }
            | Notification::AccountPassed { login, .. }
            | Notification::ProfitTargetReached { login, .. } => *login,
        }
    }

    fn level(&self) -> &'static str {
        match self {
            Notification::AccountBreached { .. } => "warning",
            _ => "info",
        }
    }

    fn message(&self) -> String {
        match self {
            Notification::AccountBreached { login, reason, .. } => {
                format!("Account {login} breached: {reason}")
            }
            Notification::AccountPassed { login, .. } => format!("Account {login} passed"),
            Notification::ProfitTargetReached { login, profit, target } => {
                format!("Account {login} reached its profit target ({profit} of {target})")
            }
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            Notification::AccountBreached { login, reason, equity } => {
                json!({ "kind": "account_breached", "login": login, "reason": reason, "equity": equity })
            }
            Notification::AccountPassed { login, equity } => {
                json!({ "kind": "account_passed", "login": login, "equity": equity })
            }
            Notification::ProfitTargetReached { login, profit, target } => {
                json!({ "kind": "profit_target_reached", "login": login, "profit": profit, "target": target })
            }
        }
    }
}

/// Fire-and-forget delivery. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the `system_logs` audit table, where the mailer
/// picks them up.
pub struct AuditLogNotifier {
    store: Arc<dyn Store>,
}

impl AuditLogNotifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Notifier for AuditLogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let entry = AuditEntry {
            source: "risk_engine".to_string(),
            level: notification.level().to_string(),
            message: notification.message(),
            details: notification.details(),
        };
        self.store.insert_audit_log(&entry).await?;
        Ok(())
    }
}
