use regex::Regex;

use crate::errors::{AppError, AppResult};
use crate::filter::{self, PodFilter};
use crate::kube::client::ClusterClient;
use crate::types::{ContainerRef, PodRecord};

/// Resolves namespace tokens against the cluster. Tokens containing regex
/// metacharacters expand through a namespace listing; exact tokens must
/// exist. Order: exact tokens first, then regex matches in cluster order.
pub async fn resolve_namespaces(
    client: &ClusterClient,
    tokens: &[String],
) -> AppResult<Vec<String>> {
    if tokens.is_empty() {
        return Ok(vec![client.default_namespace()]);
    }

    let (exact, patterns) = partition_tokens(tokens)?;

    for ns in &exact {
        if !client.namespace_exists(ns).await? {
            return Err(AppError::UnknownNamespace(ns.clone()));
        }
    }

    let mut resolved = exact;

    if !patterns.is_empty() {
        let all = client.list_namespaces().await?;
        merge_pattern_matches(&mut resolved, &all, &patterns);
    }

    Ok(resolved)
}

/// Resolves namespace tokens against a known namespace list; used by dev
/// mode, where there is no cluster to ask. Exact tokens must name a listed
/// namespace.
pub fn resolve_namespaces_offline(
    all: &[String],
    tokens: &[String],
    default: &str,
) -> AppResult<Vec<String>> {
    if tokens.is_empty() {
        return Ok(vec![default.to_string()]);
    }

    let (exact, patterns) = partition_tokens(tokens)?;

    for ns in &exact {
        if !all.contains(ns) {
            return Err(AppError::UnknownNamespace(ns.clone()));
        }
    }

    let mut resolved = exact;
    merge_pattern_matches(&mut resolved, all, &patterns);
    Ok(resolved)
}

/// Splits namespace tokens into exact names and compiled case-insensitive
/// patterns.
fn partition_tokens(tokens: &[String]) -> AppResult<(Vec<String>, Vec<Regex>)> {
    let mut exact = Vec::new();
    let mut patterns = Vec::new();

    for token in tokens {
        if filter::is_regex_pattern(token) {
            let re = regex::RegexBuilder::new(token)
                .case_insensitive(true)
                .build()
                .map_err(|source| AppError::InvalidPattern {
                    pattern: token.clone(),
                    source,
                })?;
            patterns.push(re);
        } else {
            exact.push(token.clone());
        }
    }

    Ok((exact, patterns))
}

/// Pure half of pattern resolution, split out for tests.
fn merge_pattern_matches(resolved: &mut Vec<String>, all: &[String], patterns: &[Regex]) {
    for ns in all {
        if resolved.iter().any(|r| r == ns) {
            continue;
        }
        if patterns.iter().any(|p| p.is_match(ns)) {
            resolved.push(ns.clone());
        }
    }
}

/// Lists pods across the resolved namespaces (server-side label filtering)
/// and applies the client-side name filter.
pub async fn discover_pods(
    client: &ClusterClient,
    namespaces: &[String],
    label_selector: Option<&str>,
    filter: &PodFilter,
) -> AppResult<Vec<PodRecord>> {
    let mut pods = Vec::new();
    for ns in namespaces {
        pods.extend(client.list_pods(ns, label_selector).await?);
    }
    Ok(filter_pods(pods, filter))
}

pub fn filter_pods(pods: Vec<PodRecord>, filter: &PodFilter) -> Vec<PodRecord> {
    pods.into_iter()
        .filter(|pod| filter.admits(&pod.name))
        .collect()
}

/// Expands surviving pods into container identities, skipping pods with no
/// readable logs, sorted by (namespace, pod, kind, container) for
/// deterministic startup.
pub fn expand_containers(
    pods: &[PodRecord],
    exclude_init: bool,
    exclude_ephemeral: bool,
) -> Vec<ContainerRef> {
    let mut containers: Vec<ContainerRef> = pods
        .iter()
        .filter(|pod| pod_is_loggable(pod))
        .flat_map(|pod| pod.container_refs(exclude_init, exclude_ephemeral))
        .collect();

    containers.sort_by(|a, b| {
        (&a.namespace, &a.pod_name, a.kind, &a.container_name).cmp(&(
            &b.namespace,
            &b.pod_name,
            b.kind,
            &b.container_name,
        ))
    });
    containers
}

/// A pod with `Unknown` phase and no container statuses has nothing the log
/// endpoint can serve. Everything else is kept; crash-looping containers are
/// worth tailing and retire themselves through the gone-stream path.
fn pod_is_loggable(pod: &PodRecord) -> bool {
    !(pod.phase == "Unknown" && !pod.has_container_statuses)
}

/// Enforces the concurrency cap by truncation: keep the first `max` sorted
/// by (namespace, pod, container). Returns how many were dropped. A cap of
/// 0 means unlimited.
pub fn cap_containers(containers: &mut Vec<ContainerRef>, max: usize) -> usize {
    if max == 0 || containers.len() <= max {
        return 0;
    }
    containers.sort_by(|a, b| {
        (&a.namespace, &a.pod_name, &a.container_name).cmp(&(
            &b.namespace,
            &b.pod_name,
            &b.container_name,
        ))
    });
    let dropped = containers.len() - max;
    containers.truncate(max);
    dropped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::filter::compile_patterns;
    use crate::types::ContainerKind;

    use super::*;

    fn pod(ns: &str, name: &str, phase: &str, containers: &[&str]) -> PodRecord {
        PodRecord {
            namespace: ns.into(),
            name: name.into(),
            uid: format!("uid-{name}"),
            phase: phase.into(),
            labels: BTreeMap::new(),
            containers: containers.iter().map(|c| c.to_string()).collect(),
            init_containers: Vec::new(),
            ephemeral_containers: Vec::new(),
            has_container_statuses: phase == "Running",
        }
    }

    #[test]
    fn include_and_exclude_compose() {
        let filter = PodFilter::new(
            compile_patterns("api-.*").unwrap(),
            compile_patterns("api-test").unwrap(),
        );
        let pods = vec![
            pod("default", "api-test-7", "Running", &["c"]),
            pod("default", "api-prod-1", "Running", &["c"]),
            pod("default", "web-1", "Running", &["c"]),
        ];

        let kept = filter_pods(pods, &filter);
        let names: Vec<&str> = kept.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["api-prod-1"]);
    }

    #[test]
    fn expansion_sorts_and_skips_unknown_pods() {
        let pods = vec![
            pod("b", "zpod", "Running", &["c1"]),
            pod("a", "apod", "Running", &["c2", "c1"]),
            pod("a", "ghost", "Unknown", &["c"]),
        ];

        let containers = expand_containers(&pods, false, false);
        let ids: Vec<String> = containers.iter().map(|c| c.stream_id()).collect();
        assert_eq!(ids, vec!["a/apod/c1", "a/apod/c2", "b/zpod/c1"]);
    }

    #[test]
    fn init_containers_sort_after_main_within_a_pod() {
        let mut p = pod("a", "apod", "Running", &["main-c"]);
        p.init_containers = vec!["aaa-init".into()];

        let containers = expand_containers(&[p], false, false);
        assert_eq!(containers[0].kind, ContainerKind::Main);
        assert_eq!(containers[1].container_name, "aaa-init");
    }

    #[test]
    fn cap_truncates_deterministically() {
        let pods: Vec<PodRecord> = (0..25)
            .map(|i| pod("default", &format!("pod-{i:02}"), "Running", &["c"]))
            .collect();
        let mut containers = expand_containers(&pods, false, false);

        let dropped = cap_containers(&mut containers, 10);
        assert_eq!(dropped, 15);
        assert_eq!(containers.len(), 10);
        assert_eq!(containers[0].pod_name, "pod-00");
        assert_eq!(containers[9].pod_name, "pod-09");
    }

    #[test]
    fn cap_of_zero_is_unlimited() {
        let pods = vec![pod("default", "p", "Running", &["a", "b"])];
        let mut containers = expand_containers(&pods, false, false);
        assert_eq!(cap_containers(&mut containers, 0), 0);
        assert_eq!(containers.len(), 2);
    }

    #[test]
    fn offline_resolution_handles_exact_and_pattern_tokens() {
        let all = vec!["default".to_string(), "dev-a".to_string()];

        let resolved =
            resolve_namespaces_offline(&all, &["dev-.*".to_string()], "default").unwrap();
        assert_eq!(resolved, vec!["dev-a"]);

        let resolved = resolve_namespaces_offline(&all, &[], "default").unwrap();
        assert_eq!(resolved, vec!["default"]);

        assert!(matches!(
            resolve_namespaces_offline(&all, &["staging".to_string()], "default"),
            Err(AppError::UnknownNamespace(_))
        ));
    }

    #[test]
    fn offline_resolution_can_come_up_empty() {
        let all = vec!["default".to_string()];
        let resolved =
            resolve_namespaces_offline(&all, &["nope-.*".to_string()], "default").unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn pattern_matches_merge_after_exact_names() {
        let mut resolved = vec!["frontend".to_string()];
        let all = vec![
            "backend".to_string(),
            "dev-a".to_string(),
            "dev-b".to_string(),
            "frontend".to_string(),
        ];
        let patterns = compile_patterns("dev-.*").unwrap();

        merge_pattern_matches(&mut resolved, &all, &patterns);
        assert_eq!(resolved, vec!["frontend", "dev-a", "dev-b"]);
    }
}
