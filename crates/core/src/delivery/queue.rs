//! In-memory FIFO upload queue
//!
//! Decouples event production from delivery. `push` never blocks the
//! producer; the worker waits on `pop_wait` with a bounded timeout so it can
//! observe cancellation between tasks. Lock poisoning is propagated as
//! `DeviceError::Internal` rather than panicking.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use roadwatch_domain::{DetectionEvent, DeviceError, Result};
use tokio::sync::Notify;

/// A detection event wrapped with delivery bookkeeping
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub event: DetectionEvent,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl UploadTask {
    /// Wrap an event for delivery
    pub fn new(event: DetectionEvent) -> Self {
        Self { event, enqueued_at: Utc::now(), attempts: 0 }
    }
}

/// FIFO queue of pending upload tasks
pub struct UploadQueue {
    tasks: Mutex<VecDeque<UploadTask>>,
    notify: Notify,
}

impl UploadQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self { tasks: Mutex::new(VecDeque::new()), notify: Notify::new() }
    }

    /// Enqueue a task and wake one waiter
    pub fn push(&self, task: UploadTask) -> Result<()> {
        let mut tasks =
            self.tasks.lock().map_err(|e| DeviceError::Internal(format!("queue lock: {e}")))?;
        tasks.push_back(task);
        drop(tasks);

        self.notify.notify_one();
        Ok(())
    }

    /// Dequeue the next task without waiting
    pub fn pop(&self) -> Result<Option<UploadTask>> {
        let mut tasks =
            self.tasks.lock().map_err(|e| DeviceError::Internal(format!("queue lock: {e}")))?;
        Ok(tasks.pop_front())
    }

    /// Dequeue the next task, waiting up to `timeout` for one to arrive
    pub async fn pop_wait(&self, timeout: Duration) -> Result<Option<UploadTask>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(task) = self.pop()? {
                return Ok(Some(task));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            tokio::select! {
                _ = self.notify.notified() => continue,
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    /// Remove and return all queued tasks (shutdown flush)
    pub fn drain_all(&self) -> Result<Vec<UploadTask>> {
        let mut tasks =
            self.tasks.lock().map_err(|e| DeviceError::Internal(format!("queue lock: {e}")))?;
        Ok(tasks.drain(..).collect())
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use roadwatch_domain::{BoundingBox, Detection, SensorSnapshot, TriggerSource};

    use super::*;

    fn event(class_name: &str) -> DetectionEvent {
        DetectionEvent::new(
            Utc::now(),
            TriggerSource::Camera,
            vec![Detection {
                bbox: BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
                confidence: 0.9,
                class_name: class_name.to_string(),
            }],
            SensorSnapshot::default(),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = UploadQueue::new();
        queue.push(UploadTask::new(event("first"))).unwrap();
        queue.push(UploadTask::new(event("second"))).unwrap();

        let first = queue.pop().unwrap().unwrap();
        let second = queue.pop().unwrap().unwrap();
        assert_eq!(first.event.detections[0].class_name, "first");
        assert_eq!(second.event.detections[0].class_name, "second");
        assert!(queue.pop().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pop_wait_times_out_empty() {
        let queue = UploadQueue::new();
        let popped = queue.pop_wait(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_pop_wait_wakes_on_push() {
        let queue = Arc::new(UploadQueue::new());

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop_wait(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(UploadTask::new(event("pushed"))).unwrap();

        let popped = waiter.await.unwrap().unwrap();
        assert!(popped.is_some());
    }

    #[tokio::test]
    async fn test_drain_all_empties_queue() {
        let queue = UploadQueue::new();
        queue.push(UploadTask::new(event("a"))).unwrap();
        queue.push(UploadTask::new(event("b"))).unwrap();

        let drained = queue.drain_all().unwrap();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
