use std::sync::Arc;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::backoff;
use crate::errors::StreamError;
use crate::stream::manager::QueueItem;
use crate::stream::source::{LogLines, LogSource};
use crate::types::{ContainerRef, LogEntry, StreamContext};

/// A stream that survives this long before failing is considered healthy;
/// its next failure retries from the bottom of the backoff ladder.
const HEALTHY_STREAM: Duration = Duration::from_secs(5);

enum Pump {
    Eof,
    Cancelled,
    QueueClosed,
    Failed(StreamError),
}

/// One producer: acquire the concurrency permit, then read the container's
/// stream into the queue until EOF, a terminal error, or cancellation.
/// Transient failures reconnect with exponential backoff.
pub(crate) async fn run_producer(
    source: Arc<dyn LogSource>,
    ctx: StreamContext,
    queue: mpsc::Sender<QueueItem>,
    semaphore: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
) {
    let _permit: Option<OwnedSemaphorePermit> = match semaphore {
        Some(sem) => {
            tokio::select! {
                _ = cancel.cancelled() => return,
                permit = sem.acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
            }
        }
        None => None,
    };

    let container = ctx.container.clone();
    let mut retries: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = source.open(&ctx) => opened,
        };

        match opened {
            Ok(mut lines) => {
                let started = Instant::now();
                match pump(&mut lines, &ctx, &queue, &cancel).await {
                    Pump::Cancelled | Pump::QueueClosed => return,
                    Pump::Eof => {
                        if !ctx.follow {
                            return;
                        }
                        // The container may have restarted; reattach after a
                        // beat. If it is gone, the next open says so.
                        tracing::debug!(container = %container, "stream ended, reconnecting");
                        retries = 0;
                        if !sleep_or_cancel(backoff::delay(0), &cancel).await {
                            return;
                        }
                    }
                    Pump::Failed(StreamError::Gone) => {
                        tracing::info!(container = %container, "container gone, stopping stream");
                        return;
                    }
                    Pump::Failed(StreamError::Forbidden(msg)) => {
                        send_forbidden_notice(&queue, &container, &msg).await;
                        return;
                    }
                    Pump::Failed(StreamError::Interrupted(msg)) => {
                        tracing::warn!(container = %container, error = %msg, "stream interrupted, backing off");
                        let delay = backoff::delay(retries);
                        retries = if started.elapsed() >= HEALTHY_STREAM {
                            0
                        } else {
                            retries.saturating_add(1)
                        };
                        if !sleep_or_cancel(delay, &cancel).await {
                            return;
                        }
                    }
                }
            }
            Err(StreamError::Gone) => {
                tracing::info!(container = %container, "container gone, stopping stream");
                return;
            }
            Err(StreamError::Forbidden(msg)) => {
                send_forbidden_notice(&queue, &container, &msg).await;
                return;
            }
            Err(StreamError::Interrupted(msg)) => {
                tracing::warn!(container = %container, error = %msg, "could not open stream, backing off");
                let delay = backoff::delay(retries);
                retries = retries.saturating_add(1);
                if !sleep_or_cancel(delay, &cancel).await {
                    return;
                }
            }
        }
    }
}

/// Reads lines into the queue. Enqueueing blocks when the queue is full;
/// that backpressure is what stalls the network reader.
async fn pump(
    lines: &mut LogLines,
    ctx: &StreamContext,
    queue: &mpsc::Sender<QueueItem>,
    cancel: &CancellationToken,
) -> Pump {
    use futures::StreamExt;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Pump::Cancelled,
            next = lines.next() => next,
        };

        match next {
            None => return Pump::Eof,
            Some(Ok(line)) => {
                if line.is_empty() {
                    continue;
                }
                let entry = LogEntry::new(ctx.container.clone(), line);
                let sent = tokio::select! {
                    _ = cancel.cancelled() => return Pump::Cancelled,
                    sent = queue.send(QueueItem::Entry(entry)) => sent,
                };
                if sent.is_err() {
                    return Pump::QueueClosed;
                }
            }
            Some(Err(e)) => return Pump::Failed(e),
        }
    }
}

async fn send_forbidden_notice(
    queue: &mpsc::Sender<QueueItem>,
    container: &ContainerRef,
    msg: &str,
) {
    let _ = queue
        .send(QueueItem::Notice(format!(
            "permission denied streaming {container}: {msg}"
        )))
        .await;
}

/// Returns false if cancellation fired before the delay elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}
