//! Offline sync queue.
//!
//! Holds pending remote-write operations while connectivity is down and
//! retries them when it returns. Operations are opaque async callables;
//! the queue only observes success or failure. A drain processes the
//! queue strictly in FIFO order, one operation at a time, and stops the
//! pass on the first failure: the failed operation moves to the tail (or
//! is dropped once its retries are spent), so one persistently failing
//! write cannot starve the rest of the queue.
//!
//! Operation payloads are not durable across a process restart — they
//! close over live behavior. Only metadata is persisted, for diagnostics,
//! and it is discarded on construction rather than replayed; callers that
//! need a mutation to survive a restart re-derive it from the
//! authoritative local record on next load.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::storage::KeyValueStore;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote persist failed: {0}")]
    Remote(String),

    #[error("timed out waiting for online status")]
    Timeout,

    #[error("connectivity signal closed")]
    SignalClosed,
}

/// An opaque remote-write callable. Cloneable so a failed operation can be
/// retried without rebuilding its closure.
pub type SyncOperation = Arc<dyn Fn() -> BoxFuture<'static, Result<(), SyncError>> + Send + Sync>;

/// Wrap an async closure as a [`SyncOperation`].
pub fn operation<F, Fut>(f: F) -> SyncOperation
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), SyncError>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<(), SyncError>> { Box::pin(f()) })
}

/// What kind of record an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Progress,
    Homework,
    Submission,
}

struct QueuedOperation {
    id: String,
    kind: OperationKind,
    enqueued_at: DateTime<Utc>,
    retry_count: u32,
    last_error: Option<String>,
    operation: SyncOperation,
}

/// Serializable slice of a queued operation, persisted for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    pub id: String,
    pub kind: OperationKind,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl From<&QueuedOperation> for OperationMetadata {
    fn from(op: &QueuedOperation) -> Self {
        Self {
            id: op.id.clone(),
            kind: op.kind,
            enqueued_at: op.enqueued_at,
            retry_count: op.retry_count,
            last_error: op.last_error.clone(),
        }
    }
}

/// Observability snapshot. Never mutates the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueStatus {
    pub is_online: bool,
    pub queue_length: usize,
    pub is_processing: bool,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub last_successful_sync: Option<DateTime<Utc>>,
    /// Operations that have failed at least once and are awaiting retry.
    pub failed_operations: usize,
    pub oldest_operation: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SyncQueueConfig {
    /// Bounded FIFO: enqueueing past this evicts the oldest entry.
    pub max_queue_size: usize,
    /// An operation is dropped once it has failed this many times.
    pub max_retries: u32,
    /// Period of the background drain tick while online and non-empty.
    pub drain_interval: Duration,
    /// Key the diagnostic metadata is persisted under.
    pub storage_key: String,
}

impl Default for SyncQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            max_retries: 5,
            drain_interval: Duration::from_secs(30),
            storage_key: "lashon_sync_queue_metadata".to_string(),
        }
    }
}

#[derive(Default)]
struct QueueInner {
    queue: VecDeque<QueuedOperation>,
    is_processing: bool,
    last_sync_attempt: Option<DateTime<Utc>>,
    last_successful_sync: Option<DateTime<Utc>>,
}

/// The offline sync queue.
///
/// Constructed explicitly with its dependencies — the metadata store, a
/// connectivity watch, and config — and started/stopped by the
/// composition root. Drain triggers: enqueueing while online, the
/// offline→online transition, [`SyncQueue::notify_foreground`], and the
/// periodic tick.
pub struct SyncQueue<S: KeyValueStore> {
    config: SyncQueueConfig,
    store: Arc<S>,
    inner: Mutex<QueueInner>,
    online_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<SyncQueueStatus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: KeyValueStore + Send + Sync + 'static> SyncQueue<S> {
    /// Build a queue. Metadata left by a previous session is logged and
    /// discarded — operations cannot be restored, only re-derived.
    pub fn new(
        store: Arc<S>,
        connectivity: watch::Receiver<bool>,
        config: SyncQueueConfig,
    ) -> Arc<Self> {
        match store.get(&config.storage_key) {
            Ok(Some(text)) => {
                let previous: Vec<OperationMetadata> =
                    serde_json::from_str(&text).unwrap_or_default();
                if !previous.is_empty() {
                    warn!(
                        count = previous.len(),
                        "pending sync operations from previous session could not be restored; \
                         they will re-sync on next action"
                    );
                }
                if let Err(e) = store.set(&config.storage_key, "[]") {
                    warn!(error = %e, "failed to clear stale sync queue metadata");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to read sync queue metadata"),
        }

        let is_online = *connectivity.borrow();
        let (status_tx, _) = watch::channel(SyncQueueStatus {
            is_online,
            queue_length: 0,
            is_processing: false,
            last_sync_attempt: None,
            last_successful_sync: None,
            failed_operations: 0,
            oldest_operation: None,
        });

        Arc::new(Self {
            config,
            store,
            inner: Mutex::new(QueueInner::default()),
            online_rx: connectivity,
            status_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the background triggers: the connectivity watcher and the
    /// periodic drain tick. Idempotent until [`SyncQueue::stop`].
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let queue = Arc::clone(self);
        let mut rx = self.online_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut was_online = *rx.borrow();
            while rx.changed().await.is_ok() {
                let online = *rx.borrow();
                if online && !was_online {
                    info!("connection restored; processing sync queue");
                    queue.publish_status();
                    queue.drain().await;
                } else if !online && was_online {
                    info!("connection lost; operations will be queued");
                    queue.publish_status();
                }
                was_online = online;
            }
        }));

        let queue = Arc::clone(self);
        let period = self.config.drain_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if queue.is_online() && !queue.is_empty() {
                    queue.drain().await;
                }
            }
        }));
    }

    /// Abort the background triggers. Queued operations stay in memory.
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online_rx.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Append an operation. If the queue is full the oldest entry is
    /// evicted first — bounded loss is the accepted policy. Triggers an
    /// immediate drain attempt when online.
    pub fn enqueue(self: &Arc<Self>, operation: SyncOperation, kind: OperationKind) -> String {
        let id = Uuid::new_v4().to_string();
        {
            let mut inner = self.inner.lock();
            if inner.queue.len() >= self.config.max_queue_size {
                warn!("sync queue full; evicting oldest operation");
                inner.queue.pop_front();
            }
            inner.queue.push_back(QueuedOperation {
                id: id.clone(),
                kind,
                enqueued_at: Utc::now(),
                retry_count: 0,
                last_error: None,
                operation,
            });
        }
        self.persist_metadata();
        self.publish_status();

        if self.is_online() {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.drain().await;
            });
        }

        id
    }

    /// Process queued operations in FIFO order.
    ///
    /// No-op when offline, already draining, or empty. On a failure the
    /// operation is requeued at the tail (or dropped once its retries are
    /// spent) and the pass ends; remaining operations wait for the next
    /// trigger.
    pub async fn drain(&self) {
        {
            let mut inner = self.inner.lock();
            if !self.is_online() || inner.is_processing || inner.queue.is_empty() {
                return;
            }
            inner.is_processing = true;
            inner.last_sync_attempt = Some(Utc::now());
        }
        self.publish_status();
        debug!(queued = self.len(), "processing sync queue");

        loop {
            if !self.is_online() {
                break;
            }
            let next = {
                let inner = self.inner.lock();
                inner
                    .queue
                    .front()
                    .map(|op| (op.id.clone(), op.kind, Arc::clone(&op.operation)))
            };
            let Some((id, kind, op)) = next else { break };

            match op().await {
                Ok(()) => {
                    let mut inner = self.inner.lock();
                    inner.queue.pop_front();
                    inner.last_successful_sync = Some(Utc::now());
                    drop(inner);
                    debug!(%id, ?kind, "sync operation delivered");
                }
                Err(e) => {
                    let dropped = {
                        let mut inner = self.inner.lock();
                        match inner.queue.pop_front() {
                            Some(mut item) => {
                                item.retry_count += 1;
                                item.last_error = Some(e.to_string());
                                if item.retry_count >= self.config.max_retries {
                                    true
                                } else {
                                    inner.queue.push_back(item);
                                    false
                                }
                            }
                            None => false,
                        }
                    };
                    if dropped {
                        error!(%id, ?kind, error = %e, "max retries exceeded; dropping operation");
                    } else {
                        warn!(%id, ?kind, error = %e, "sync operation failed; requeued for retry");
                    }
                    break;
                }
            }
        }

        self.inner.lock().is_processing = false;
        self.persist_metadata();
        self.publish_status();
    }

    /// Drop every queued operation unconditionally (user-initiated reset).
    pub fn clear(&self) {
        self.inner.lock().queue.clear();
        self.persist_metadata();
        self.publish_status();
        info!("sync queue cleared");
    }

    /// Visibility trigger: the app came to the foreground.
    pub fn notify_foreground(self: &Arc<Self>) {
        if self.is_online() {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.drain().await;
            });
        }
    }

    /// Run a drain now and report whether the queue ended up empty.
    /// Backs a manual "retry" affordance.
    pub async fn force_sync(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        self.drain().await;
        self.is_empty()
    }

    /// Current snapshot of queue observability data.
    pub fn status(&self) -> SyncQueueStatus {
        let inner = self.inner.lock();
        SyncQueueStatus {
            is_online: self.is_online(),
            queue_length: inner.queue.len(),
            is_processing: inner.is_processing,
            last_sync_attempt: inner.last_sync_attempt,
            last_successful_sync: inner.last_successful_sync,
            failed_operations: inner.queue.iter().filter(|op| op.retry_count > 0).count(),
            oldest_operation: inner.queue.front().map(|op| op.enqueued_at),
        }
    }

    /// Watch status snapshots; a new value is published after every
    /// mutation and connectivity edge.
    pub fn subscribe(&self) -> watch::Receiver<SyncQueueStatus> {
        self.status_tx.subscribe()
    }

    /// Metadata of everything currently queued (diagnostics/admin).
    pub fn queued_metadata(&self) -> Vec<OperationMetadata> {
        self.inner
            .lock()
            .queue
            .iter()
            .map(OperationMetadata::from)
            .collect()
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }

    /// Best-effort persistence of queue metadata for diagnostics.
    fn persist_metadata(&self) {
        let metadata = self.queued_metadata();
        match serde_json::to_string(&metadata) {
            Ok(text) => {
                if let Err(e) = self.store.set(&self.config.storage_key, &text) {
                    warn!(error = %e, "failed to persist sync queue metadata");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize sync queue metadata"),
        }
    }
}

impl<S: KeyValueStore> Drop for SyncQueue<S> {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Run an operation now; if it fails, queue it for retry instead of
/// surfacing the error.
pub async fn sync_with_fallback<S: KeyValueStore + Send + Sync + 'static>(
    queue: &Arc<SyncQueue<S>>,
    op: SyncOperation,
    kind: OperationKind,
) {
    if let Err(e) = op().await {
        warn!(?kind, error = %e, "sync failed; adding to queue");
        queue.enqueue(op, kind);
    }
}

/// Wait until the connectivity signal reports online, up to `timeout`.
pub async fn wait_for_online(
    mut connectivity: watch::Receiver<bool>,
    timeout: Duration,
) -> Result<(), SyncError> {
    let waited = tokio::time::timeout(timeout, async {
        loop {
            if *connectivity.borrow() {
                return true;
            }
            if connectivity.changed().await.is_err() {
                return false;
            }
        }
    })
    .await;

    match waited {
        Ok(true) => Ok(()),
        Ok(false) => Err(SyncError::SignalClosed),
        Err(_) => Err(SyncError::Timeout),
    }
}
