//! Delivery service lifecycle and worker loop
//!
//! One background task drains the upload queue and performs strictly
//! serialized delivery attempts. Producers only ever call [`DeliveryService::submit`]
//! or read [`DeliveryService::stats`]; delivery never blocks or fails the
//! detection path.
//!
//! # Example
//!
//! ```no_run
//! use roadwatch_core::DeliveryService;
//! use roadwatch_domain::DeliveryConfig;
//!
//! # async fn example() -> roadwatch_domain::Result<()> {
//! # let (gateway, auth, store) = todo!();
//! let mut service = DeliveryService::new(gateway, auth, store, DeliveryConfig::default());
//!
//! service.start().await?;
//! // ... producers call service.submit(event) ...
//! service.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, RwLock};
use std::time::Duration;

use roadwatch_domain::constants::WORKER_JOIN_TIMEOUT_SECS;
use roadwatch_domain::{DeliveryConfig, DeliveryStats, DetectionEvent, DeviceError, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::policy::{classify, DeliveryDecision};
use super::ports::{AuthSession, DetectionGateway, DetectionReceipt, OfflineStore};
use super::queue::{UploadQueue, UploadTask};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Shared handles for the worker loop
struct WorkerContext {
    queue: Arc<UploadQueue>,
    gateway: Arc<dyn DetectionGateway>,
    auth: Arc<dyn AuthSession>,
    store: Arc<dyn OfflineStore>,
    stats: Arc<RwLock<DeliveryStats>>,
}

/// Reliable delivery subsystem: queue, worker, and offline spill-over
pub struct DeliveryService {
    queue: Arc<UploadQueue>,
    gateway: Arc<dyn DetectionGateway>,
    auth: Arc<dyn AuthSession>,
    store: Arc<dyn OfflineStore>,
    stats: Arc<RwLock<DeliveryStats>>,
    config: DeliveryConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl DeliveryService {
    /// Create a new delivery service
    ///
    /// # Arguments
    ///
    /// * `gateway` - Remote detection API adapter
    /// * `auth` - Credential manager handle for the forced re-login path
    /// * `store` - Durable offline store
    /// * `config` - Worker configuration
    pub fn new(
        gateway: Arc<dyn DetectionGateway>,
        auth: Arc<dyn AuthSession>,
        store: Arc<dyn OfflineStore>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            queue: Arc::new(UploadQueue::new()),
            gateway,
            auth,
            store,
            stats: Arc::new(RwLock::new(DeliveryStats::default())),
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Submit a detection event for delivery (fire-and-forget)
    ///
    /// Never blocks on the network and never fails for a well-formed event.
    /// If the queue itself is unavailable the event is archived directly to
    /// the offline store as a last resort.
    pub async fn submit(&self, event: DetectionEvent) {
        if let Err(e) = self.queue.push(UploadTask::new(event.clone())) {
            warn!(error = %e, "Upload queue rejected event; archiving directly");
            if let Err(persist_err) = self.store.archive(&event).await {
                error!(error = %persist_err, "Failed to archive rejected event; it may be lost");
            }
        }
    }

    /// Start the delivery worker
    ///
    /// Drains the offline store back into the queue first, so previously
    /// failed events are retried ahead of new submissions, then spawns the
    /// single worker task.
    ///
    /// # Errors
    ///
    /// Returns error if the worker is already running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(DeviceError::Internal("delivery worker already running".to_string()));
        }

        info!("Starting delivery worker");

        // Create a new cancellation token (supports restart after stop)
        self.cancellation_token = CancellationToken::new();

        let requeued = Self::drain_offline(&self.store, &self.queue).await;
        if requeued > 0 {
            info!(requeued, "Requeued offline records at startup");
        }

        let context = WorkerContext {
            queue: Arc::clone(&self.queue),
            gateway: Arc::clone(&self.gateway),
            auth: Arc::clone(&self.auth),
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
        };
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::worker_loop(context, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Delivery worker started");
        Ok(())
    }

    /// Stop the delivery worker gracefully
    ///
    /// Cancels the worker, joins it with a bounded timeout, and (when
    /// `flush_on_shutdown` is set) archives any still-queued tasks to the
    /// offline store so accepted events survive the restart.
    ///
    /// # Errors
    ///
    /// Returns error if the worker is not running or does not stop within
    /// the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(DeviceError::Internal("delivery worker not running".to_string()));
        }

        info!("Stopping delivery worker");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = Duration::from_secs(WORKER_JOIN_TIMEOUT_SECS);
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| {
                    DeviceError::Internal(format!(
                        "delivery worker did not stop within {join_timeout:?}"
                    ))
                })?
                .map_err(|e| DeviceError::Internal(format!("delivery worker panicked: {e}")))?;
        }

        if self.config.flush_on_shutdown {
            self.flush_queue().await;
        }

        info!("Delivery worker stopped");
        Ok(())
    }

    /// Check if the worker is running
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Snapshot of delivery statistics, including live queue depth and
    /// offline record count
    pub async fn stats(&self) -> DeliveryStats {
        let mut snapshot = match self.stats.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        snapshot.queue_depth = self.queue.len();
        match self.store.count().await {
            Ok(count) => snapshot.offline_records = count,
            Err(e) => warn!(error = %e, "Failed to count offline records"),
        }

        snapshot
    }

    /// Archive all still-queued tasks before shutdown completes
    async fn flush_queue(&self) {
        let tasks = match self.queue.drain_all() {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Failed to drain queue for shutdown flush");
                return;
            }
        };

        if tasks.is_empty() {
            return;
        }

        info!(count = tasks.len(), "Flushing queued events to offline store");
        for task in tasks {
            if let Err(e) = self.store.archive(&task.event).await {
                error!(error = %e, "Failed to archive queued event at shutdown; it may be lost");
            }
        }
    }

    /// Background worker loop
    async fn worker_loop(
        context: WorkerContext,
        config: DeliveryConfig,
        cancel: CancellationToken,
    ) {
        let wait = config.queue_wait();
        let mut redrain = config.redrain_interval().map(|period| {
            tokio::time::interval_at(tokio::time::Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Delivery loop cancelled");
                    break;
                }
                _ = Self::redrain_tick(redrain.as_mut()) => {
                    let requeued = Self::drain_offline(&context.store, &context.queue).await;
                    if requeued > 0 {
                        info!(requeued, "Re-drained offline records");
                    }
                }
                next = context.queue.pop_wait(wait) => match next {
                    Ok(Some(task)) => Self::process_task(&context, task).await,
                    Ok(None) => {}
                    Err(e) => {
                        error!(error = %e, "Upload queue unavailable");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }

    /// Wait for the next periodic re-drain, or forever when disabled
    async fn redrain_tick(interval: Option<&mut tokio::time::Interval>) {
        match interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Move archived records back into the upload queue
    ///
    /// Records are requeued in directory order; each is deleted only after
    /// it has been pushed. A record that fails to parse is quarantined and
    /// skipped so a poison record cannot wedge the drain.
    async fn drain_offline(store: &Arc<dyn OfflineStore>, queue: &Arc<UploadQueue>) -> usize {
        let paths = match store.list().await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "Failed to list offline records");
                return 0;
            }
        };

        let mut requeued = 0;
        for path in paths {
            match store.load(&path).await {
                Ok(event) => {
                    if let Err(e) = queue.push(UploadTask::new(event)) {
                        error!(path = %path.display(), error = %e, "Failed to requeue offline record");
                        continue;
                    }
                    requeued += 1;

                    // Deleting after the push keeps the no-loss invariant; a
                    // failed delete means at worst a duplicate delivery.
                    if let Err(e) = store.remove(&path).await {
                        warn!(path = %path.display(), error = %e, "Failed to delete requeued record");
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable offline record");
                    if let Err(qe) = store.quarantine(&path).await {
                        warn!(path = %path.display(), error = %qe, "Failed to quarantine record");
                    }
                }
            }
        }

        requeued
    }

    /// Perform one delivery attempt for a task
    async fn process_task(context: &WorkerContext, mut task: UploadTask) {
        task.attempts += 1;
        Self::with_stats(&context.stats, DeliveryStats::record_attempt);

        match context.gateway.submit_detection(&task.event).await {
            Ok(receipt) => Self::finish_success(context, &task, &receipt).await,
            Err(err) => match classify(&err) {
                DeliveryDecision::RetryAfterLogin => {
                    Self::retry_after_login(context, task, &err).await;
                }
                DeliveryDecision::Archive => Self::archive_task(context, &task.event, &err).await,
            },
        }
    }

    /// Force a fresh login and retry the same request exactly once
    async fn retry_after_login(context: &WorkerContext, mut task: UploadTask, first: &DeviceError) {
        debug!(error = %first, "Unauthorized response; forcing re-login");

        if let Err(login_err) = context.auth.force_login().await {
            warn!(error = %login_err, "Re-login failed; archiving event");
            Self::archive_task(context, &task.event, &login_err).await;
            return;
        }

        task.attempts += 1;
        Self::with_stats(&context.stats, DeliveryStats::record_attempt);

        match context.gateway.submit_detection(&task.event).await {
            Ok(receipt) => Self::finish_success(context, &task, &receipt).await,
            Err(retry_err) => {
                warn!(error = %retry_err, "Retry after re-login failed; archiving event");
                Self::archive_task(context, &task.event, &retry_err).await;
            }
        }
    }

    /// Record a confirmed delivery and attempt the best-effort image upload
    async fn finish_success(context: &WorkerContext, task: &UploadTask, receipt: &DetectionReceipt) {
        Self::with_stats(&context.stats, DeliveryStats::record_success);
        debug!(detection_id = %receipt.id, attempts = task.attempts, "Detection delivered");

        if let Some(image_path) = &task.event.image_path {
            if let Err(e) = context.gateway.upload_image(&receipt.id, image_path).await {
                warn!(detection_id = %receipt.id, error = %e, "Image upload failed");
            }
        }
    }

    /// Archive a failed event and record the failure
    ///
    /// An archive failure is the one condition surfaced loudly: it means the
    /// at-least-once guarantee may be broken for this event.
    async fn archive_task(context: &WorkerContext, event: &DetectionEvent, err: &DeviceError) {
        match context.store.archive(event).await {
            Ok(path) => {
                debug!(path = %path.display(), "Event archived for later delivery");
                Self::with_stats(&context.stats, |stats| stats.record_failure(err.to_string()));
            }
            Err(persist_err) => {
                error!(error = %persist_err, "Failed to archive undelivered event; it may be lost");
                Self::with_stats(&context.stats, |stats| {
                    stats.record_failure(persist_err.to_string());
                });
            }
        }
    }

    fn with_stats(stats: &Arc<RwLock<DeliveryStats>>, f: impl FnOnce(&mut DeliveryStats)) {
        match stats.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                f(&mut guard);
            }
        }
    }
}

/// Ensure the worker is stopped when dropped
impl Drop for DeliveryService {
    fn drop(&mut self) {
        // Best-effort cleanup; the async handle cannot be joined here
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
        }
    }
}
