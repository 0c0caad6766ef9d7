//! # Download Scheduler
//!
//! Priority-ordered, concurrency-bounded execution of file transfers with
//! bounded retry. One actor task owns the pending queue and the active
//! count, so queue mutations never run concurrently; transfers themselves
//! execute as spawned tasks, up to the configured limit at a time.
//!
//! Every transfer lands in a `.tmp` sibling of its destination and is
//! renamed into place on success, so a reader probing the final path never
//! observes a partially written file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::transfer::Transfer;

/// Queue position of a pending request. Priority only affects ordering
/// among pending requests; an executing transfer is never preempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for a [`DownloadScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of transfers executing at once. Zero is treated as 1.
    pub download_concurrency: usize,
    /// Maximum number of attempts per request, the first try included
    pub max_retry_count: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 4,
            max_retry_count: 3,
        }
    }
}

type TransferOutcome = Result<PathBuf, DownloadError>;

/// One queued or executing transfer. The destination is fixed at
/// submission and survives retries unchanged; the id exists for logging.
#[derive(Debug)]
struct DownloadRequest {
    id: u64,
    uri: String,
    destination: PathBuf,
    priority: Priority,
    attempts: u32,
}

enum SchedulerMessage {
    Submit {
        request: DownloadRequest,
        reply: oneshot::Sender<TransferOutcome>,
    },
}

struct WorkerDone {
    request: DownloadRequest,
    result: Result<(), DownloadError>,
}

/// Handle to the scheduling actor. Cheap to clone; all clones feed one
/// logical queue. When the last handle is dropped the actor finishes the
/// requests it has already accepted, then exits.
#[derive(Clone)]
pub struct DownloadScheduler {
    tx: mpsc::UnboundedSender<SchedulerMessage>,
    next_id: Arc<AtomicU64>,
}

impl DownloadScheduler {
    /// Spawn the scheduling actor on the current tokio runtime.
    pub fn new(transfer: Arc<dyn Transfer>, config: SchedulerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, transfer, config));
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a transfer of `uri` into `destination` and wait for its final
    /// outcome: the destination path on success, or the terminating error
    /// once all permitted attempts are exhausted. The outcome is settled
    /// exactly once per submission.
    pub async fn submit(
        &self,
        uri: impl Into<String>,
        destination: impl Into<PathBuf>,
        priority: Priority,
    ) -> Result<PathBuf, DownloadError> {
        let reply = self.dispatch(uri.into(), destination.into(), priority)?;
        reply.await.map_err(|_| DownloadError::SchedulerClosed)?
    }

    /// Hand a request to the actor without waiting on the outcome. The
    /// send happens before this returns, so call order is queue order.
    fn dispatch(
        &self,
        uri: String,
        destination: PathBuf,
        priority: Priority,
    ) -> Result<oneshot::Receiver<TransferOutcome>, DownloadError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = DownloadRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            uri,
            destination,
            priority,
            attempts: 0,
        };
        self.tx
            .send(SchedulerMessage::Submit {
                request,
                reply: reply_tx,
            })
            .map_err(|_| DownloadError::SchedulerClosed)?;
        Ok(reply_rx)
    }
}

struct SchedulerState {
    concurrency: usize,
    max_retry_count: u32,
    transfer: Arc<dyn Transfer>,
    done_tx: mpsc::UnboundedSender<WorkerDone>,
    /// Pending queue, re-sorted by priority after every insertion
    pending: Vec<DownloadRequest>,
    /// Number of transfers currently executing
    active: usize,
    /// Outcome channels keyed by destination. A destination with an entry
    /// here is in flight; later submissions attach instead of duplicating
    /// the transfer.
    waiters: HashMap<PathBuf, Vec<oneshot::Sender<TransferOutcome>>>,
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<SchedulerMessage>,
    transfer: Arc<dyn Transfer>,
    config: SchedulerConfig,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut state = SchedulerState {
        concurrency: config.download_concurrency.max(1),
        max_retry_count: config.max_retry_count,
        transfer,
        done_tx,
        pending: Vec::new(),
        active: 0,
        waiters: HashMap::new(),
    };
    let mut accepting = true;

    loop {
        tokio::select! {
            // Ingest submissions ahead of completions so a burst of
            // submits is queued (and prioritized) before slots recycle.
            biased;

            msg = rx.recv(), if accepting => match msg {
                Some(SchedulerMessage::Submit { request, reply }) => {
                    state.handle_submit(request, reply);
                }
                None => accepting = false,
            },
            Some(done) = done_rx.recv() => state.handle_done(done),
        }

        if !accepting && state.active == 0 && state.pending.is_empty() {
            break;
        }
    }
    debug!("Download scheduler stopped");
}

impl SchedulerState {
    fn handle_submit(
        &mut self,
        request: DownloadRequest,
        reply: oneshot::Sender<TransferOutcome>,
    ) {
        if let Some(waiters) = self.waiters.get_mut(&request.destination) {
            // Same destination already queued or executing: attach to the
            // shared outcome instead of downloading twice.
            debug!(id = request.id, uri = %request.uri, "Joining in-flight download");
            waiters.push(reply);
            return;
        }

        self.waiters
            .insert(request.destination.clone(), vec![reply]);
        self.enqueue(request);
        self.drain();
    }

    /// Insert and restore priority order. The sort is stable, so equal
    /// priorities keep submission order, and a retried request re-enters
    /// behind anything more urgent that arrived meanwhile.
    fn enqueue(&mut self, request: DownloadRequest) {
        self.pending.push(request);
        self.pending.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Fill free transfer slots from the head of the queue. Runs after
    /// every submission and every completion; never blocks.
    fn drain(&mut self) {
        while self.active < self.concurrency && !self.pending.is_empty() {
            let mut request = self.pending.remove(0);
            self.active += 1;
            request.attempts += 1;
            debug!(
                id = request.id,
                uri = %request.uri,
                priority = %request.priority,
                attempt = request.attempts,
                "Starting transfer"
            );

            let transfer = Arc::clone(&self.transfer);
            let done_tx = self.done_tx.clone();
            tokio::spawn(async move {
                let result = execute(transfer.as_ref(), &request).await;
                // The actor owns all bookkeeping; it is still draining as
                // long as workers exist, so this send only fails if the
                // runtime is tearing down.
                let _ = done_tx.send(WorkerDone { request, result });
            });
        }
    }

    fn handle_done(&mut self, done: WorkerDone) {
        // Exactly one decrement per execution attempt, success or not;
        // anything else deadlocks the queue.
        self.active -= 1;

        let WorkerDone { request, result } = done;
        match result {
            Ok(()) => {
                debug!(id = request.id, uri = %request.uri, "Download complete");
                self.settle_success(&request.destination);
            }
            Err(error) if request.attempts < self.max_retry_count => {
                warn!(
                    id = request.id,
                    uri = %request.uri,
                    attempt = request.attempts,
                    error = %error,
                    "Transfer failed, retrying"
                );
                self.enqueue(request);
            }
            Err(error) => {
                warn!(
                    id = request.id,
                    uri = %request.uri,
                    attempts = request.attempts,
                    error = %error,
                    "Download failed, giving up"
                );
                self.settle_failure(&request, error.to_string());
            }
        }
        self.drain();
    }

    fn settle_success(&mut self, destination: &Path) {
        if let Some(waiters) = self.waiters.remove(destination) {
            for reply in waiters {
                // A caller that dropped its future simply misses the result.
                let _ = reply.send(Ok(destination.to_path_buf()));
            }
        }
    }

    fn settle_failure(&mut self, request: &DownloadRequest, last_error: String) {
        if let Some(waiters) = self.waiters.remove(&request.destination) {
            for reply in waiters {
                let _ = reply.send(Err(DownloadError::RetriesExhausted {
                    uri: request.uri.clone(),
                    attempts: request.attempts,
                    last_error: last_error.clone(),
                }));
            }
        }
    }
}

/// Run one attempt: write into a `.tmp` sibling, then rename into place.
/// On any failure the temporary file is removed best-effort, so the final
/// destination path never exposes partial bytes.
async fn execute(
    transfer: &dyn Transfer,
    request: &DownloadRequest,
) -> Result<(), DownloadError> {
    let tmp = temp_path(&request.destination);
    let result = match transfer.transfer(&request.uri, &tmp).await {
        Ok(()) => fs::rename(&tmp, &request.destination)
            .await
            .map_err(DownloadError::from),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    destination.with_file_name(name)
}
