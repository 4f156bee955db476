//! Notification reactor: one task per instance listening to the expiry feed.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::Scheduler;
use crate::error::SchedulerError;
use crate::store::{CoordinationStore, ExpirySubscription};

/// Handle to stop and join a running scheduler.
///
/// Dropping the handle detaches the scheduler; it keeps running until its
/// expiry feed closes.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    join: JoinHandle<Result<(), SchedulerError>>,
}

impl SchedulerHandle {
    /// Stop listening for notifications and wait for the reactor to exit.
    ///
    /// Runs already in progress finish in the background and release their
    /// locks.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        let _ = self.shutdown.send(()).await;
        self.join().await
    }

    /// Wait for the reactor to exit on its own (feed closed).
    pub async fn join(self) -> Result<(), SchedulerError> {
        let Self { join, .. } = self;
        match join.await {
            Ok(result) => result,
            Err(e) => Err(SchedulerError::Task(e.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl<S: CoordinationStore> Scheduler<S> {
    /// Subscribe to the store's expiry feed and start reacting to it.
    ///
    /// Start before registering jobs with very short intervals, or their
    /// first expiry may be missed.
    pub async fn start(&self) -> Result<SchedulerHandle, SchedulerError> {
        let store = self.store();

        if self.inner.enable_expiry_events {
            if let Err(e) = store.enable_expiry_events().await {
                warn!(error = %e, "could not enable keyspace expiry events; relying on server configuration");
            }
        }

        let subscription = store.subscribe_expired().await?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let join = tokio::spawn(run_loop(self.clone(), subscription, shutdown_rx));

        Ok(SchedulerHandle {
            shutdown: shutdown_tx,
            join,
        })
    }
}

async fn run_loop<S: CoordinationStore>(
    scheduler: Scheduler<S>,
    mut subscription: ExpirySubscription,
    mut shutdown: mpsc::Receiver<()>,
) -> Result<(), SchedulerError> {
    info!(
        prefix = scheduler.keys().prefix(),
        jobs = scheduler.registry().len(),
        "scheduler listening for expiry notifications"
    );

    loop {
        tokio::select! {
            Some(()) = shutdown.recv() => {
                info!("scheduler stopping");
                return Ok(());
            }

            key = subscription.recv() => match key {
                Some(key) => {
                    // Each notification gets its own task so a slow lock round
                    // trip for one job never delays another.
                    let scheduler = scheduler.clone();
                    tokio::spawn(async move {
                        scheduler.handle_expired_key(&key).await;
                    });
                }
                None => {
                    error!("expiry notification feed closed");
                    return Err(SchedulerError::FeedClosed);
                }
            },
        }
    }
}
