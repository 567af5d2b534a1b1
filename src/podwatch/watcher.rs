use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use kube_runtime::watcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::backoff;
use crate::filter::PodFilter;
use crate::kube::client::{pod_record, ClusterClient};
use crate::shutdown::Shutdown;
use crate::types::PodRecord;

/// After this many consecutive watch failures the session is considered
/// unrecoverable and winds down.
const MAX_CONSECUTIVE_FAILURES: u32 = 8;

/// Starts one rotation watcher per namespace. Each forwards running pods
/// that pass the name filter to the manager, which dedups by pod UID and
/// attaches producers. Watchers reconnect with exponential backoff and
/// re-list on resource-version gaps.
pub fn spawn_pod_watchers(
    client: &ClusterClient,
    namespaces: &[String],
    label_selector: Option<String>,
    filter: PodFilter,
    shutdown: Shutdown,
    tx: mpsc::Sender<PodRecord>,
) -> Vec<JoinHandle<()>> {
    namespaces
        .iter()
        .map(|ns| {
            tokio::spawn(watch_namespace(
                client.client(),
                ns.clone(),
                label_selector.clone(),
                filter.clone(),
                shutdown.clone(),
                tx.clone(),
            ))
        })
        .collect()
}

async fn watch_namespace(
    client: Client,
    namespace: String,
    label_selector: Option<String>,
    filter: PodFilter,
    shutdown: Shutdown,
    tx: mpsc::Sender<PodRecord>,
) {
    let api: Api<Pod> = Api::namespaced(client, &namespace);

    let mut config = watcher::Config::default();
    if let Some(selector) = &label_selector {
        config = config.labels(selector);
    }

    let stream = watcher(api, config);
    pin_mut!(stream);

    let cancel = shutdown.token();
    let mut failures: u32 = 0;

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return,
            item = stream.next() => item,
        };

        match item {
            None => return,
            Some(Ok(event)) => {
                failures = 0;
                match event {
                    watcher::Event::Applied(pod) => {
                        if !forward(&pod, &namespace, &filter, &tx).await {
                            return;
                        }
                    }
                    // A restart is a fresh list; the manager's UID dedup
                    // keeps already-attached pods from doubling up.
                    watcher::Event::Restarted(pods) => {
                        for pod in pods {
                            if !forward(&pod, &namespace, &filter, &tx).await {
                                return;
                            }
                        }
                    }
                    // The affected producers observe the gone stream on
                    // their own; nothing to do here.
                    watcher::Event::Deleted(_) => {}
                }
            }
            Some(Err(e)) => {
                failures += 1;
                tracing::warn!(namespace = %namespace, error = %e, "pod watch failed");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    tracing::error!(
                        namespace = %namespace,
                        "pod watch failing repeatedly, winding down the session"
                    );
                    shutdown.cancel();
                    return;
                }
                let delay = backoff::delay(failures - 1);
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

/// Returns false once the manager side of the channel is gone.
async fn forward(
    pod: &Pod,
    namespace: &str,
    filter: &PodFilter,
    tx: &mpsc::Sender<PodRecord>,
) -> bool {
    let record = pod_record(pod, namespace);

    if record.uid.is_empty() || record.phase != "Running" || !filter.admits(&record.name) {
        return true;
    }

    tx.send(record).await.is_ok()
}
