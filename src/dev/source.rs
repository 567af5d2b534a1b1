use std::collections::BTreeMap;

use futures::future::BoxFuture;
use futures::stream;
use tokio::time::{sleep, Duration};

use crate::errors::StreamError;
use crate::stream::source::{LogLines, LogSource};
use crate::types::{PodRecord, StreamContext};

/// Cluster-free log source: every container yields a fixed number of
/// deterministic lines, one JSON line in five, at a configurable rate.
/// Drives the full manager/queue/renderer pipeline for smoke tests.
pub struct DevSource {
    lines: u64,
    rate: Duration,
}

impl DevSource {
    pub fn new(lines: u64, rate_ms: u64) -> Self {
        Self {
            lines,
            rate: Duration::from_millis(rate_ms),
        }
    }
}

impl LogSource for DevSource {
    fn open(&self, ctx: &StreamContext) -> BoxFuture<'static, Result<LogLines, StreamError>> {
        let container = ctx.container.container_name.clone();
        let total = self.lines;
        let rate = self.rate;

        Box::pin(async move {
            let lines = stream::unfold(0u64, move |n| {
                let container = container.clone();
                async move {
                    if n >= total {
                        return None;
                    }
                    if n > 0 {
                        sleep(rate).await;
                    }
                    let line = if n % 5 == 4 {
                        format!(
                            "{{\"level\":\"INFO\",\"msg\":\"heartbeat {n}\",\"source\":\"{container}\"}}"
                        )
                    } else {
                        format!("{container} line {n}")
                    };
                    Some((Ok(line), n + 1))
                }
            });

            Ok(Box::pin(lines) as LogLines)
        })
    }
}

/// The fixed pod set dev mode runs against: one multi-container pod and one
/// single-container pod, so alignment and container omission both show up.
pub fn dev_pods(namespace: &str) -> Vec<PodRecord> {
    vec![
        PodRecord {
            namespace: namespace.to_string(),
            name: "dev-api-1".into(),
            uid: "dev-uid-api-1".into(),
            phase: "Running".into(),
            labels: BTreeMap::from([("app".to_string(), "dev-api".to_string())]),
            containers: vec!["server".into(), "sidecar".into()],
            init_containers: vec!["migrate".into()],
            ephemeral_containers: Vec::new(),
            has_container_statuses: true,
        },
        PodRecord {
            namespace: namespace.to_string(),
            name: "dev-web-1".into(),
            uid: "dev-uid-web-1".into(),
            phase: "Running".into(),
            labels: BTreeMap::from([("app".to_string(), "dev-web".to_string())]),
            containers: vec!["nginx".into()],
            init_containers: Vec::new(),
            ephemeral_containers: Vec::new(),
            has_container_statuses: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use crate::types::{ContainerKind, ContainerRef};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_the_configured_number_of_lines() {
        let source = DevSource::new(7, 1);
        let ctx = StreamContext {
            container: ContainerRef {
                namespace: "default".into(),
                pod_name: "dev-web-1".into(),
                container_name: "nginx".into(),
                kind: ContainerKind::Main,
            },
            since_seconds: 600,
            tail_lines: 25,
            follow: false,
        };

        let mut lines = source.open(&ctx).await.unwrap();
        let mut collected = Vec::new();
        while let Some(line) = lines.next().await {
            collected.push(line.unwrap());
        }

        assert_eq!(collected.len(), 7);
        assert_eq!(collected[0], "nginx line 0");
        assert!(collected[4].starts_with('{'), "fifth line is JSON");
    }
}
