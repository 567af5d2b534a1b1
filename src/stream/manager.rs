use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::errors::AppResult;
use crate::render::Render;
use crate::shutdown::{spawn_signal_listener, Shutdown};
use crate::stream::producer::run_producer;
use crate::stream::source::LogSource;
use crate::types::{ContainerRef, LogEntry, PodRecord, StreamContext};

/// How often the consumer wakes to observe the cancellation flag.
const CONSUMER_POLL: Duration = Duration::from_millis(250);
/// How long producers get to wind down before they are forcibly cancelled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What travels over the render queue. The sentinel is enqueued exactly once,
/// after every producer has stopped, so the consumer drains everything first.
pub enum QueueItem {
    Entry(LogEntry),
    Notice(String),
    Fault(String),
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct ManagerOpts {
    pub follow: bool,
    pub since_seconds: i64,
    pub tail_lines: i64,
    pub max_containers: usize,
    pub queue_capacity: usize,
    pub exclude_init: bool,
    pub exclude_ephemeral: bool,
}

/// Owns the queue, the cancellation flag, the live-producer set and the
/// concurrency semaphore. Everything mutable about a streaming session lives
/// here; callers construct one manager per run.
pub struct LogManager {
    source: Arc<dyn LogSource>,
    opts: ManagerOpts,
    shutdown: Shutdown,
    semaphore: Option<Arc<Semaphore>>,
    active: Arc<Mutex<HashSet<ContainerRef>>>,
    seen_pods: HashSet<(String, String, String)>,
}

impl LogManager {
    pub fn new(source: Arc<dyn LogSource>, opts: ManagerOpts) -> Self {
        let semaphore = match opts.max_containers {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            source,
            opts,
            shutdown: Shutdown::new(),
            semaphore,
            active: Arc::new(Mutex::new(HashSet::new())),
            seen_pods: HashSet::new(),
        }
    }

    /// Handle for cancelling the run from outside (tests, embedding UIs).
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Marks the initially discovered pods so rotation events for them are
    /// not treated as new arrivals.
    pub fn mark_seen(&mut self, pods: &[PodRecord]) {
        for pod in pods {
            self.seen_pods.insert(pod.key());
        }
    }

    /// Runs the session: consumer first, then one producer per container,
    /// then (in follow mode) the rotation intake. Blocks until every
    /// producer finished naturally, or the cancellation flag is set. On
    /// return no task is running, no stream is open and the queue is empty.
    pub async fn run(
        mut self,
        containers: Vec<ContainerRef>,
        renderer: Box<dyn Render + Send>,
        rotation: Option<mpsc::Receiver<PodRecord>>,
    ) -> AppResult<()> {
        let cancel = self.shutdown.token();
        let signal = spawn_signal_listener(self.shutdown.clone());

        let (queue_tx, queue_rx) = mpsc::channel(self.opts.queue_capacity);

        // Consumer starts before any producer so no enqueued entry can be
        // lost to a not-yet-ready receiver.
        let consumer = tokio::spawn(run_consumer(queue_rx, renderer, cancel.clone()));

        let mut producers = JoinSet::new();
        for container in containers {
            self.spawn_producer(&mut producers, &queue_tx, container);
        }

        if self.opts.follow {
            self.follow_loop(&mut producers, &queue_tx, rotation, &cancel)
                .await;
        } else {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    joined = producers.join_next() => match joined {
                        Some(result) => report_join(result, &queue_tx).await,
                        None => break,
                    },
                }
            }
        }

        // Shutdown protocol: flag first, then a grace-bounded producer
        // drain, then the sentinel, then the consumer.
        self.shutdown.cancel();
        if timeout(SHUTDOWN_GRACE, drain(&mut producers)).await.is_err() {
            tracing::debug!("grace deadline hit, aborting remaining producers");
            producers.abort_all();
            drain(&mut producers).await;
        }
        let _ = queue_tx.send(QueueItem::Shutdown).await;
        let _ = consumer.await;
        let _ = signal.await;
        Ok(())
    }

    async fn follow_loop(
        &mut self,
        producers: &mut JoinSet<()>,
        queue_tx: &mpsc::Sender<QueueItem>,
        rotation: Option<mpsc::Receiver<PodRecord>>,
        cancel: &CancellationToken,
    ) {
        let mut rotation = rotation;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = recv_or_pending(&mut rotation) => match event {
                    Some(pod) => self.attach_pod(producers, queue_tx, pod),
                    None => rotation = None,
                },
                joined = producers.join_next(), if !producers.is_empty() => {
                    if let Some(result) = joined {
                        report_join(result, queue_tx).await;
                    }
                }
            }
        }
    }

    /// Rotation intake: pods are keyed by (namespace, name, uid) so a
    /// re-listed pod is not attached twice, while a replacement pod with the
    /// same name is.
    fn attach_pod(
        &mut self,
        producers: &mut JoinSet<()>,
        queue_tx: &mpsc::Sender<QueueItem>,
        pod: PodRecord,
    ) {
        if !self.seen_pods.insert(pod.key()) {
            return;
        }

        for container in pod.container_refs(self.opts.exclude_init, self.opts.exclude_ephemeral) {
            tracing::info!(container = %container, "new container discovered");
            self.spawn_producer(producers, queue_tx, container);
        }
    }

    fn spawn_producer(
        &self,
        producers: &mut JoinSet<()>,
        queue_tx: &mpsc::Sender<QueueItem>,
        container: ContainerRef,
    ) {
        {
            let mut active = lock(&self.active);
            if !active.insert(container.clone()) {
                tracing::debug!(container = %container, "already streaming");
                return;
            }
        }

        let ctx = StreamContext {
            container: container.clone(),
            since_seconds: self.opts.since_seconds,
            tail_lines: self.opts.tail_lines,
            follow: self.opts.follow,
        };
        let source = Arc::clone(&self.source);
        let queue = queue_tx.clone();
        let semaphore = self.semaphore.clone();
        let cancel = self.shutdown.token();
        let active = Arc::clone(&self.active);

        producers.spawn(async move {
            run_producer(source, ctx, queue, semaphore, cancel).await;
            lock(&active).remove(&container);
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn recv_or_pending(rx: &mut Option<mpsc::Receiver<PodRecord>>) -> Option<PodRecord> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn report_join(result: Result<(), tokio::task::JoinError>, queue: &mpsc::Sender<QueueItem>) {
    if let Err(e) = result {
        if !e.is_cancelled() {
            let _ = queue
                .send(QueueItem::Fault(format!("producer task failed: {e}")))
                .await;
        }
    }
}

async fn drain(producers: &mut JoinSet<()>) {
    while producers.join_next().await.is_some() {}
}

/// The single consumer: strictly FIFO off the queue, the only caller of the
/// renderer. The short timeout keeps the cancellation flag observed on
/// targets where signals cannot preempt the loop.
async fn run_consumer(
    mut queue: mpsc::Receiver<QueueItem>,
    mut renderer: Box<dyn Render + Send>,
    cancel: CancellationToken,
) {
    loop {
        match timeout(CONSUMER_POLL, queue.recv()).await {
            Ok(Some(QueueItem::Entry(entry))) => renderer.render(&entry),
            Ok(Some(QueueItem::Notice(text))) => renderer.warn(&text),
            Ok(Some(QueueItem::Fault(text))) => renderer.error(&text),
            Ok(Some(QueueItem::Shutdown)) | Ok(None) => break,
            Err(_) => {
                if cancel.is_cancelled() && queue.is_empty() {
                    break;
                }
            }
        }
    }
}
