//! Background sweeper
//!
//! Periodically drops expired counters and challenges so memory stays
//! bounded by live traffic.

use std::sync::Arc;
use std::time::Duration;

use platform::rate_limit::RateLimitStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::guard::AbuseGuard;
use crate::domain::repository::CaptchaRepository;

/// Spawn the sweep loop. Abort the handle to stop it.
pub fn spawn_sweeper<C, L>(guard: Arc<AbuseGuard<C, L>>, interval: Duration) -> JoinHandle<()>
where
    C: CaptchaRepository + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match guard.sweep_expired().await {
                Ok(report) if report.total() > 0 => {
                    tracing::debug!(
                        rate_limits = report.rate_limits,
                        captchas = report.captchas,
                        registrations = report.registrations,
                        "Swept expired guard entries"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Guard sweep failed");
                }
            }
        }
    })
}
