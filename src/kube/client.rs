use futures::future::BoxFuture;
use futures::{AsyncBufReadExt, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{ListParams, LogParams};
use kube::{Api, Client, ResourceExt};

use crate::errors::{classify_stream_error, AppError, AppResult, StreamError};
use crate::stream::source::{LogLines, LogSource};
use crate::types::{PodRecord, StreamContext};

/// Thin async facade over the Kubernetes API. Credentials come from the
/// ambient kubeconfig (or in-cluster config); there are no overrides here.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
}

impl ClusterClient {
    pub async fn connect() -> AppResult<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Namespace of the current kubeconfig context ("default" if unset).
    pub fn default_namespace(&self) -> String {
        self.client.default_namespace().to_string()
    }

    pub async fn list_namespaces(&self) -> AppResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| map_api_error(e, "list namespaces"))?;
        Ok(list.items.iter().map(ResourceExt::name_any).collect())
    }

    /// When namespace reads are forbidden we cannot verify, so assume the
    /// namespace exists and let pod listing decide.
    pub async fn namespace_exists(&self, name: &str) -> AppResult<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get_opt(name).await {
            Ok(found) => Ok(found.is_some()),
            Err(kube::Error::Api(ae)) if ae.code == 403 => {
                tracing::warn!(namespace = %name, "cannot verify namespace exists: permission denied");
                Ok(true)
            }
            Err(e) => Err(map_api_error(e, "get namespace")),
        }
    }

    pub async fn list_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> AppResult<Vec<PodRecord>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        let mut lp = ListParams::default();
        if let Some(selector) = label_selector {
            lp = lp.labels(selector);
        }

        let list = api
            .list(&lp)
            .await
            .map_err(|e| map_api_error(e, &format!("list pods in '{namespace}'")))?;

        Ok(list
            .items
            .iter()
            .map(|pod| pod_record(pod, namespace))
            .collect())
    }
}

impl LogSource for ClusterClient {
    fn open(&self, ctx: &StreamContext) -> BoxFuture<'static, Result<LogLines, StreamError>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &ctx.container.namespace);
        let ctx = ctx.clone();

        Box::pin(async move {
            // Omitted parameters mean "no limit" to the log endpoint; a
            // literal 0 would ask for zero lines.
            let lp = LogParams {
                container: Some(ctx.container.container_name.clone()),
                follow: ctx.follow,
                since_seconds: (ctx.since_seconds > 0).then_some(ctx.since_seconds),
                tail_lines: (ctx.tail_lines > 0).then_some(ctx.tail_lines),
                timestamps: false,
                ..Default::default()
            };

            let reader = api
                .log_stream(&ctx.container.pod_name, &lp)
                .await
                .map_err(classify_stream_error)?;

            let lines = reader
                .lines()
                .map(|res| res.map_err(|e| StreamError::Interrupted(e.to_string())));

            Ok(Box::pin(lines) as LogLines)
        })
    }
}

/// Maps kube API failures from list/get calls onto session errors: 401/403
/// exit 2, everything else surfaces as a connection problem.
fn map_api_error(e: kube::Error, what: &str) -> AppError {
    match &e {
        kube::Error::Api(ae) if ae.code == 401 || ae.code == 403 => {
            AppError::PermissionDenied(format!("{what}: {}", ae.message))
        }
        _ => AppError::Kube(e),
    }
}

/// Snapshot of one pod, shared by discovery and the rotation watcher.
pub fn pod_record(pod: &Pod, fallback_namespace: &str) -> PodRecord {
    let spec = pod.spec.as_ref();
    let status = pod.status.as_ref();

    let containers = spec
        .map(|s| s.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    let init_containers = spec
        .and_then(|s| s.init_containers.as_ref())
        .map(|cs| cs.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    let ephemeral_containers = spec
        .and_then(|s| s.ephemeral_containers.as_ref())
        .map(|cs| cs.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();

    PodRecord {
        namespace: pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| fallback_namespace.to_string()),
        name: pod.name_any(),
        uid: pod.metadata.uid.clone().unwrap_or_default(),
        phase: status
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        containers,
        init_containers,
        ephemeral_containers,
        has_container_statuses: status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|cs| !cs.is_empty())
            .unwrap_or(false),
    }
}
