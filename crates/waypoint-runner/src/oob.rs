use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use waypoint_core::{OutOfBandRunner, OutOfBandStore};

use crate::error::ExecutorError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct OutOfBandOptions<'a> {
    /// Migrations to wait for. Empty means every registered migration.
    pub ids: &'a [i32],
    pub up: bool,
    pub dry_run: bool,
    pub poll_interval: Duration,
}

/// Stops the background engine however the loop exits.
struct StopOnDrop<'a>(&'a dyn OutOfBandRunner);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Point the selected out-of-band migrations in the direction of travel,
/// start the engine on exactly those, and wait until each one is complete or
/// may be left partially reversed.
pub async fn run_out_of_band_migrations(
    store: &dyn OutOfBandStore,
    runner: &dyn OutOfBandRunner,
    options: OutOfBandOptions<'_>,
    cancel: &CancellationToken,
) -> Result<(), ExecutorError> {
    let ids: Vec<i32> = if options.ids.is_empty() {
        store
            .list()
            .await
            .map_err(ExecutorError::OutOfBand)?
            .into_iter()
            .map(|m| m.id)
            .collect()
    } else {
        options.ids.to_vec()
    };

    if ids.is_empty() {
        tracing::info!("no out-of-band migrations to run");
        return Ok(());
    }
    if options.dry_run {
        tracing::info!(?ids, up = options.up, "dry run: not running out-of-band migrations");
        return Ok(());
    }

    store
        .update_direction(&ids, !options.up)
        .await
        .map_err(ExecutorError::OutOfBand)?;
    runner.start_partial(&ids);
    let _stop = StopOnDrop(runner);

    let result = wait_until_acceptable(store, runner, &ids, options.poll_interval, cancel).await;
    match &result {
        Ok(()) => tracing::info!(?ids, "out-of-band migrations finished"),
        Err(err) => tracing::warn!(?ids, error = %err, "out-of-band migrations did not finish"),
    }
    result
}

async fn wait_until_acceptable(
    store: &dyn OutOfBandStore,
    runner: &dyn OutOfBandRunner,
    ids: &[i32],
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), ExecutorError> {
    let notifier = runner.progress_notifier();
    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let migrations = store.get_by_ids(ids).await.map_err(ExecutorError::OutOfBand)?;
        let pending: Vec<_> = migrations.iter().filter(|m| !m.acceptable()).collect();
        if pending.is_empty() {
            return Ok(());
        }
        for migration in &pending {
            tracing::info!(
                id = migration.id,
                progress = migration.progress,
                reverse = migration.apply_reverse,
                "waiting for out-of-band migration"
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            _ = ticker.tick() => {}
            _ = notified(notifier.as_deref()) => {}
        }
    }
}

async fn notified(notify: Option<&Notify>) {
    match notify {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}
