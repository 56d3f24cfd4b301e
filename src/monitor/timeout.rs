//! Timeout monitor: discovers expired pending interactions and drives them
//! through the same resume path as a real response.
//!
//! Multiple instances may scan concurrently (horizontal scale-out); the
//! store-level conditional transitions resolve duplicate expiry attempts,
//! so no external lock is involved. The poll interval carries jitter so
//! instances started together do not scan in lockstep.

use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::channel::ChannelDispatcher;
use crate::core::event_bus::HilEvent;
use crate::core::runtime_context::RuntimeContext;
use crate::domain::interaction::{Interaction, InteractionStatus};
use crate::resume::{ResumeCoordinator, ResumeOutcome, ResumeSource};
use crate::store::InteractionStore;

#[derive(Debug, Clone)]
pub struct TimeoutMonitorConfig {
    /// Base scan interval; effective interval is jittered around this.
    pub poll_interval: Duration,
    /// How far ahead of the deadline the one-shot warning is sent.
    pub warning_window: Duration,
}

impl Default for TimeoutMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            warning_window: Duration::from_secs(600),
        }
    }
}

/// Summary of one scan pass, mainly for tests and operational logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub warnings_sent: usize,
    pub expired: usize,
    pub resumed: usize,
}

pub struct TimeoutMonitor {
    interactions: Arc<dyn InteractionStore>,
    coordinator: Arc<ResumeCoordinator>,
    dispatcher: Arc<ChannelDispatcher>,
    config: TimeoutMonitorConfig,
    context: RuntimeContext,
}

impl TimeoutMonitor {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        coordinator: Arc<ResumeCoordinator>,
        dispatcher: Arc<ChannelDispatcher>,
        config: TimeoutMonitorConfig,
        context: RuntimeContext,
    ) -> Self {
        Self {
            interactions,
            coordinator,
            dispatcher,
            config,
            context,
        }
    }

    /// Scan loop. Exits when the shutdown signal flips or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let sleep_for = jittered(self.config.poll_interval);
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    let report = self.scan_once().await;
                    if report != ScanReport::default() {
                        tracing::info!(
                            warnings = report.warnings_sent,
                            expired = report.expired,
                            resumed = report.resumed,
                            "timeout scan pass"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One scan pass: warning dispatch, then expiry.
    pub async fn scan_once(&self) -> ScanReport {
        let now = self.context.now();
        let mut report = ScanReport {
            warnings_sent: self.warning_pass(now).await,
            ..ScanReport::default()
        };

        let expired = match self.interactions.list_expired(now).await {
            Ok(expired) => expired,
            Err(e) => {
                tracing::error!("expiry query failed: {}", e);
                return report;
            }
        };
        for interaction in expired {
            match self.expire_one(&interaction, now).await {
                Ok(resumed) => {
                    report.expired += 1;
                    if resumed {
                        report.resumed += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        interaction_id = %interaction.id,
                        "expiry handling failed: {}",
                        e
                    );
                }
            }
        }
        report
    }

    async fn warning_pass(&self, now: i64) -> usize {
        let window_secs = self.config.warning_window.as_secs() as i64;
        let expiring = match self
            .interactions
            .list_expiring_within(now, window_secs)
            .await
        {
            Ok(expiring) => expiring,
            Err(e) => {
                tracing::error!("warning query failed: {}", e);
                return 0;
            }
        };

        let mut claimed = Vec::new();
        for interaction in expiring {
            if interaction.warning_sent {
                continue;
            }
            // The flag claim decides which instance sends; at most one
            // warning per interaction, ever.
            match self.interactions.mark_warning_sent(&interaction.id).await {
                Ok(true) => claimed.push(interaction),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        interaction_id = %interaction.id,
                        "warning flag update failed: {}",
                        e
                    );
                }
            }
        }

        let sends = claimed.iter().map(|interaction| async move {
            let remaining = interaction.remaining_secs(now);
            let delivered = self
                .dispatcher
                .dispatch_warning(interaction, remaining)
                .await;
            if !delivered {
                tracing::warn!(
                    interaction_id = %interaction.id,
                    "timeout warning could not be delivered"
                );
            }
            self.context.emit(HilEvent::TimeoutWarningSent {
                interaction_id: interaction.id.clone(),
                remaining_secs: remaining,
                timestamp: Utc::now(),
            });
        });
        let count = claimed.len();
        join_all(sends).await;
        count
    }

    /// Expire one interaction: the pending-guarded transition first, then
    /// the shared resume path. Returns whether the execution advanced.
    async fn expire_one(
        &self,
        interaction: &Interaction,
        now: i64,
    ) -> Result<bool, crate::error::HilError> {
        let won = self
            .interactions
            .resolve_if_pending(&interaction.id, InteractionStatus::Timeout, None, now)
            .await?;
        if won.is_none() {
            // A response (or another monitor instance) got there first.
            return Ok(false);
        }
        self.context.emit(HilEvent::InteractionExpired {
            interaction_id: interaction.id.clone(),
            timestamp: Utc::now(),
        });

        let outcome = self
            .coordinator
            .resume(
                &interaction.execution_id,
                &interaction.node_id,
                Value::Null,
                ResumeSource::Timeout,
            )
            .await?;
        Ok(matches!(outcome, ResumeOutcome::Resumed(_)))
    }
}

fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis().max(1) as u64;
    let spread = (base_ms / 10).max(1);
    let offset = rand::thread_rng().gen_range(0..=spread);
    Duration::from_millis(base_ms - spread / 2 + offset)
}
