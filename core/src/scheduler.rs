use std::{sync::Arc, time::Duration};

use common::env_config::SweeperConfig;
use quota::{QuotaEngine, dtos::admin::SweepKind};
use tokio::time::MissedTickBehavior;

/// Starts one ticking task per sweeper on the current runtime. Each sweep
/// also runs once right away, so work left over from downtime is picked up
/// on startup.
pub fn start(engine: Arc<QuotaEngine>, config: &SweeperConfig) {
    if !config.enabled {
        log::info!("Sweepers disabled; run them through /api/admin/sweeps");
        return;
    }

    let schedule = [
        (SweepKind::Cooling, config.cooling_interval_secs),
        (SweepKind::Monthly, config.monthly_interval_secs),
        (SweepKind::Stale, config.stale_interval_secs),
        (SweepKind::Trial, config.trial_interval_secs),
    ];
    for (sweep, interval_secs) in schedule {
        spawn_every(engine.clone(), sweep, Duration::from_secs(interval_secs.max(1)));
    }
}

fn spawn_every(engine: Arc<QuotaEngine>, sweep: SweepKind, period: Duration) {
    log::info!("Scheduling {} sweep every {}s", sweep, period.as_secs());

    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // a sweep that overruns its period must not be followed by a burst
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match engine.run_sweep(sweep).await {
                Ok(report) => log::debug!("{} sweep touched {} accounts", sweep, report.affected),
                Err(err) => log::error!("{} sweep failed: {}", sweep, err),
            }
        }
    });
}
