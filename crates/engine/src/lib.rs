// In crates/engine/src/lib.rs

pub mod admin;
pub mod daily_reset;
pub mod job;
pub mod notify;
pub mod reconciler;
pub mod rules_cache;
pub mod sweep;
pub mod worker;

use crate::daily_reset::{DailyReset, DailyResetConfig};
use crate::notify::{AuditLogNotifier, Notifier};
use crate::rules_cache::RulesCache;
use crate::sweep::{DrawdownSweep, SweepConfig};
use crate::worker::{EventWorker, WorkerConfig};
use anyhow::Result;
use api_client::VenueBridge;
use app_config::Settings;
use database::Store;
use events::EventSubscriber;
use std::sync::Arc;
use std::time::Duration;

pub use admin::AdminActions;
pub use daily_reset::ResetReport;
pub use sweep::SweepReport;
pub use worker::EventOutcome;

/// Wires the event worker and the two scheduled jobs around one store and
/// one bridge client.
pub struct Engine {
    settings: Settings,
    store: Arc<dyn Store>,
    bridge: Arc<dyn VenueBridge>,
    rules: Arc<RulesCache>,
}

impl Engine {
    pub fn new(settings: Settings, store: Arc<dyn Store>, bridge: Arc<dyn VenueBridge>) -> Self {
        let rules = Arc::new(RulesCache::new(
            store.clone(),
            Duration::from_secs(settings.risk.rule_cache_ttl_secs),
        ));
        Self {
            settings,
            store,
            bridge,
            rules,
        }
    }

    pub fn worker(&self) -> Result<EventWorker> {
        let notifier: Arc<dyn Notifier> = Arc::new(AuditLogNotifier::new(self.store.clone()));
        Ok(EventWorker::new(
            self.store.clone(),
            self.bridge.clone(),
            notifier,
            self.rules.clone(),
            WorkerConfig::from_settings(&self.settings)?,
        ))
    }

    pub fn sweep(&self) -> Result<DrawdownSweep> {
        Ok(DrawdownSweep::new(
            self.store.clone(),
            self.bridge.clone(),
            self.rules.clone(),
            SweepConfig::from_settings(&self.settings)?,
        ))
    }

    pub fn daily_reset(&self) -> DailyReset {
        DailyReset::new(
            self.store.clone(),
            self.bridge.clone(),
            DailyResetConfig::from_settings(&self.settings),
        )
    }

    pub fn admin(&self) -> AdminActions {
        AdminActions::new(self.store.clone(), self.bridge.clone())
    }

    /// Runs the subscriber, the drawdown sweep and the daily reset until one
    /// of them stops.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(environment = %self.settings.app.environment, "Starting risk engine...");

        let worker = Arc::new(self.worker()?);
        let sweep = Arc::new(self.sweep()?);
        let reset = Arc::new(self.daily_reset());

        let events = EventSubscriber::new(&self.settings.events).subscribe();
        let sweep_every = Duration::from_secs(self.settings.scheduler.sweep_interval_secs.max(1));

        let worker_task = tokio::spawn(worker.run(events));
        let sweep_task = tokio::spawn(sweep.run(sweep_every));
        let reset_task = tokio::spawn(reset.run());

        tracing::info!("Event worker, drawdown sweep and daily reset are running.");

        // None of these return in a healthy process.
        tokio::select! {
            res = worker_task => tracing::error!(?res, "Event worker terminated."),
            res = sweep_task => tracing::error!(?res, "Drawdown sweep terminated."),
            res = reset_task => tracing::error!(?res, "Daily reset terminated."),
        }

        anyhow::bail!("A core task terminated unexpectedly. Shutting down.")
    }
}
