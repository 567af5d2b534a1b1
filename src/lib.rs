pub mod backoff;
pub mod cli;
pub mod config;
pub mod dev;
pub mod discover;
pub mod duration;
pub mod errors;
pub mod filter;
pub mod kube;
pub mod logging;
pub mod palette;
pub mod podwatch;
pub mod render;
pub mod shutdown;
pub mod stream;
pub mod types;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::dev::source::{dev_pods, DevSource};
use crate::errors::{AppError, AppResult};
use crate::filter::PodFilter;
use crate::kube::client::ClusterClient;
use crate::render::format::LineFormatter;
use crate::render::stdout::StdoutRenderer;
use crate::render::Render;
use crate::stream::manager::{LogManager, ManagerOpts};
use crate::types::{ContainerRef, PodRecord};

/// Capacity of the rotation channel between the watchers and the manager.
const ROTATION_BUFFER: usize = 64;

pub async fn run(config: Config) -> AppResult<()> {
    if config.dev_mode {
        return run_dev(config).await;
    }

    let client = ClusterClient::connect().await?;

    let namespaces = discover::resolve_namespaces(&client, &config.namespaces).await?;
    if namespaces.is_empty() {
        return Err(AppError::NoNamespaces);
    }

    let filter = PodFilter::new(config.include.clone(), config.exclude.clone());
    let pods = discover::discover_pods(
        &client,
        &namespaces,
        config.label_selector.as_deref(),
        &filter,
    )
    .await?;
    if pods.is_empty() {
        return warn_empty("no pods matched the requested filters");
    }

    let containers =
        discover::expand_containers(&pods, config.exclude_init, config.exclude_ephemeral);
    if containers.is_empty() {
        return warn_empty("matching pods have no streamable containers");
    }

    let (containers, renderer) = admit(containers, namespaces.len(), &config);

    let mut manager = LogManager::new(Arc::new(client.clone()), manager_opts(&config));
    manager.mark_seen(&pods);

    let rotation = if config.follow {
        let (tx, rx) = mpsc::channel(ROTATION_BUFFER);
        podwatch::watcher::spawn_pod_watchers(
            &client,
            &namespaces,
            config.label_selector.clone(),
            filter,
            manager.shutdown_handle(),
            tx,
        );
        Some(rx)
    } else {
        None
    };

    manager.run(containers, renderer, rotation).await
}

/// Snapshot pipeline against the built-in fake pod set; no cluster involved.
async fn run_dev(config: Config) -> AppResult<()> {
    let namespaces = discover::resolve_namespaces_offline(
        &["default".to_string()],
        &config.namespaces,
        "default",
    )?;
    if namespaces.is_empty() {
        return Err(AppError::NoNamespaces);
    }
    let namespace = namespaces[0].clone();

    let filter = PodFilter::new(config.include.clone(), config.exclude.clone());
    let pods: Vec<PodRecord> = discover::filter_pods(dev_pods(&namespace), &filter);
    if pods.is_empty() {
        return warn_empty("no pods matched the requested filters");
    }

    let containers =
        discover::expand_containers(&pods, config.exclude_init, config.exclude_ephemeral);
    if containers.is_empty() {
        return warn_empty("matching pods have no streamable containers");
    }

    let (containers, renderer) = admit(containers, namespaces.len(), &config);

    let source = DevSource::new(config.dev.lines, config.dev.rate_ms);
    let mut manager = LogManager::new(Arc::new(source), manager_opts(&config));
    manager.mark_seen(&pods);

    manager.run(containers, renderer, None).await
}

/// Applies the concurrency cap and builds the renderer over the admitted
/// set, so alignment reflects what will actually stream. Truncation is
/// reported before the first log line.
fn admit(
    mut containers: Vec<ContainerRef>,
    namespace_count: usize,
    config: &Config,
) -> (Vec<ContainerRef>, Box<dyn Render + Send>) {
    let dropped = discover::cap_containers(&mut containers, config.max_containers);

    let formatter = LineFormatter::new(namespace_count, &containers, config.color_logs);
    let mut renderer = StdoutRenderer::new(formatter, config.color_logs);

    if dropped > 0 {
        renderer.warn(&format!(
            "{} containers match but --max-containers is {}; streaming the first {}",
            containers.len() + dropped,
            config.max_containers,
            containers.len(),
        ));
    }

    (containers, Box::new(renderer))
}

fn manager_opts(config: &Config) -> ManagerOpts {
    ManagerOpts {
        follow: config.follow,
        since_seconds: config.since_seconds,
        tail_lines: config.tail_lines,
        max_containers: config.max_containers,
        queue_capacity: config.buffer,
        exclude_init: config.exclude_init,
        exclude_ephemeral: config.exclude_ephemeral,
    }
}

/// Nothing to stream after filtering: report it and end the run cleanly,
/// whatever the mode. Unresolvable namespaces are a hard error instead.
fn warn_empty(message: &str) -> AppResult<()> {
    tracing::warn!("{message}");
    Ok(())
}
