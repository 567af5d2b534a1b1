use std::collections::BTreeMap;
use std::fmt;

use time::OffsetDateTime;

/// Container flavor within a pod. Ordering is the expansion order used when a
/// pod is turned into streams.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ContainerKind {
    Main,
    Init,
    Ephemeral,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Main => "main",
            ContainerKind::Init => "init",
            ContainerKind::Ephemeral => "ephemeral",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one log stream. The quadruple uniquely keys a stream within a
/// run.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContainerRef {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub kind: ContainerKind,
}

impl ContainerRef {
    pub fn stream_id(&self) -> String {
        format!(
            "{}/{}/{}",
            self.namespace, self.pod_name, self.container_name
        )
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.namespace, self.pod_name, self.container_name
        )
    }
}

/// Immutable snapshot of a pod at discovery time. Rotation yields new records
/// with new UIDs; nothing mutates an existing one.
#[derive(Clone, Debug)]
pub struct PodRecord {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub phase: String,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<String>,
    pub init_containers: Vec<String>,
    pub ephemeral_containers: Vec<String>,
    pub has_container_statuses: bool,
}

impl PodRecord {
    /// Rotation and dedup key.
    pub fn key(&self) -> (String, String, String) {
        (self.namespace.clone(), self.name.clone(), self.uid.clone())
    }

    /// Expands the pod into container identities, honoring the kind
    /// exclusions.
    pub fn container_refs(&self, exclude_init: bool, exclude_ephemeral: bool) -> Vec<ContainerRef> {
        let mut refs = Vec::new();

        for name in &self.containers {
            refs.push(self.container_ref(name, ContainerKind::Main));
        }

        if !exclude_init {
            for name in &self.init_containers {
                refs.push(self.container_ref(name, ContainerKind::Init));
            }
        }

        if !exclude_ephemeral {
            for name in &self.ephemeral_containers {
                refs.push(self.container_ref(name, ContainerKind::Ephemeral));
            }
        }

        refs
    }

    fn container_ref(&self, container_name: &str, kind: ContainerKind) -> ContainerRef {
        ContainerRef {
            namespace: self.namespace.clone(),
            pod_name: self.name.clone(),
            container_name: container_name.to_string(),
            kind,
        }
    }
}

/// Immutable parameter bundle for one producer.
#[derive(Clone, Debug)]
pub struct StreamContext {
    pub container: ContainerRef,
    pub since_seconds: i64,
    pub tail_lines: i64,
    pub follow: bool,
}

/// One raw line read from a container, stamped with client ingest time.
/// Structure extraction (JSON level/message) happens in the renderer, once
/// per line.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub ts: OffsetDateTime,
    pub container: ContainerRef,
    pub message: String,
}

impl LogEntry {
    pub fn new(container: ContainerRef, message: String) -> Self {
        Self {
            ts: OffsetDateTime::now_utc(),
            container,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> PodRecord {
        PodRecord {
            namespace: "default".into(),
            name: "web-1".into(),
            uid: "uid-1".into(),
            phase: "Running".into(),
            labels: BTreeMap::new(),
            containers: vec!["nginx".into()],
            init_containers: vec!["setup".into()],
            ephemeral_containers: vec!["debug".into()],
            has_container_statuses: true,
        }
    }

    #[test]
    fn expansion_honors_kind_exclusions() {
        let all = pod().container_refs(false, false);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind, ContainerKind::Main);

        let no_init = pod().container_refs(true, false);
        assert!(no_init.iter().all(|c| c.kind != ContainerKind::Init));

        let main_only = pod().container_refs(true, true);
        assert_eq!(main_only.len(), 1);
        assert_eq!(main_only[0].container_name, "nginx");
    }

    #[test]
    fn stream_id_is_the_triple() {
        let c = &pod().container_refs(true, true)[0];
        assert_eq!(c.stream_id(), "default/web-1/nginx");
    }
}
