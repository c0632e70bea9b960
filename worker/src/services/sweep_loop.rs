use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::{
    config::config_model::Sweep, services::shutdown,
    usecases::expire_subscriptions::ExpirySweepUseCase,
};

/// Runs the sweep on a fixed cadence until shutdown. A batch in progress is
/// allowed to finish.
pub async fn run(
    usecase: Arc<ExpirySweepUseCase>,
    config: Sweep,
    stop: watch::Receiver<bool>,
) -> Result<()> {
    info!(
        interval_secs = config.interval.as_secs(),
        run_on_start = config.run_on_start,
        "expiry_sweep: starting sweep loop"
    );

    let start = if config.run_on_start {
        Instant::now()
    } else {
        Instant::now() + config.interval
    };
    let mut ticker = tokio::time::interval_at(start, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stopped = shutdown::stopped(stop);
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            _ = &mut stopped => {
                info!("expiry_sweep: sweep loop stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        match usecase.run(Utc::now()).await {
            Ok(report) if report.errors.is_empty() => {}
            Ok(report) => {
                warn!(
                    processed_count = report.processed_count,
                    failed = report.errors.len(),
                    "expiry_sweep: sweep finished with failed rows"
                );
            }
            Err(e) => {
                error!(error = ?e, "expiry_sweep: sweep run failed");
            }
        }
    }
}
