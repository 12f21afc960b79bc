use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::use_cases::subscriptions::SubscriptionUseCases;

/// Periodically move ended subscriptions into grace and then to expired.
pub async fn run_lifecycle_loop(subscriptions: Arc<SubscriptionUseCases>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let policy = subscriptions.policy();
    info!(
        grace_period_days = policy.grace_period_days,
        "Subscription lifecycle sweeper started (every {}s)",
        every.as_secs()
    );

    loop {
        ticker.tick().await;

        match subscriptions.sweep(Utc::now()).await {
            Ok(report) => {
                if report.failed > 0 {
                    warn!(?report, "Lifecycle sweep finished with failures");
                } else if report.moved_to_grace > 0 || report.expired > 0 {
                    info!(
                        moved_to_grace = report.moved_to_grace,
                        expired = report.expired,
                        skipped = report.skipped,
                        "Lifecycle sweep applied transitions"
                    );
                }
            }
            Err(e) => {
                error!(error = ?e, "Failed to run lifecycle sweep");
            }
        }
    }
}
