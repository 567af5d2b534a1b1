use std::collections::{BTreeSet, HashMap};

use anstyle::{AnsiColor, Color, Effects, Style};
use serde_json::{Map, Value};

use crate::palette::ColorAssigner;
use crate::types::{ContainerRef, LogEntry};

/// JSON keys probed for a log level, in order.
const LEVEL_KEYS: [&str; 3] = ["level", "severity", "lvl"];
/// JSON keys probed for the main message, in order.
const MESSAGE_KEYS: [&str; 2] = ["msg", "message"];

/// Formats one log entry into one terminal line:
/// `[NS] POD (CONTAINER) > message`, with the prefix padded to a common
/// width. The namespace segment is dropped when the run observes a single
/// namespace; the container segment is dropped for pods with a single
/// admitted container. The width only ever grows.
pub struct LineFormatter {
    show_namespace: bool,
    color: bool,
    width: usize,
    containers_by_pod: HashMap<String, BTreeSet<String>>,
    colors: ColorAssigner,
}

impl LineFormatter {
    pub fn new(namespace_count: usize, containers: &[ContainerRef], color: bool) -> Self {
        let mut containers_by_pod: HashMap<String, BTreeSet<String>> = HashMap::new();
        for c in containers {
            containers_by_pod
                .entry(c.pod_name.clone())
                .or_default()
                .insert(c.container_name.clone());
        }

        let mut colors = ColorAssigner::new();
        colors.initialize(containers_by_pod.keys().cloned());

        let mut formatter = Self {
            show_namespace: namespace_count > 1,
            color,
            width: 0,
            containers_by_pod,
            colors,
        };

        for c in containers {
            let prefix = formatter.plain_prefix(c);
            formatter.width = formatter.width.max(prefix.len());
        }

        formatter
    }

    pub fn format(&mut self, entry: &LogEntry) -> String {
        // Rotation can introduce containers unseen at startup; learn them so
        // the omission rules and width stay consistent from here on.
        self.containers_by_pod
            .entry(entry.container.pod_name.clone())
            .or_default()
            .insert(entry.container.container_name.clone());

        let prefix = self.plain_prefix(&entry.container);
        if prefix.len() > self.width {
            self.width = prefix.len();
        }
        let padding = " ".repeat(self.width - prefix.len());

        let pod_style = self.pod_style(&entry.container.pod_name);

        let mut line = String::new();
        line.push_str(&paint(&prefix, pod_style));
        line.push_str(&padding);
        line.push_str(&paint(" > ", self.dim()));
        self.push_message(&mut line, entry, pod_style);
        line
    }

    fn plain_prefix(&self, container: &ContainerRef) -> String {
        let mut prefix = String::new();
        if self.show_namespace {
            prefix.push_str(&format!("[{}] ", container.namespace));
        }
        prefix.push_str(&container.pod_name);
        if self.show_container(&container.pod_name) {
            prefix.push_str(&format!(" ({})", container.container_name));
        }
        prefix
    }

    fn show_container(&self, pod_name: &str) -> bool {
        self.containers_by_pod
            .get(pod_name)
            .map(|set| set.len() > 1)
            .unwrap_or(false)
    }

    fn push_message(&mut self, line: &mut String, entry: &LogEntry, pod_style: Style) {
        let Some(fields) = parse_json_object(&entry.message) else {
            line.push_str(&paint(&entry.message, pod_style));
            return;
        };

        let level = first_string(&fields, &LEVEL_KEYS).map(normalize_level);
        let Some(message) = first_string(&fields, &MESSAGE_KEYS) else {
            // Structured but message-less; show the raw object untouched.
            line.push_str(&paint(&entry.message, pod_style));
            return;
        };

        if let Some(level) = &level {
            line.push_str(&paint(&format!("[{}] ", level.tag), self.level_style(level)));
        }
        line.push_str(&paint(message, pod_style));

        let metadata = format_metadata(&fields);
        if !metadata.is_empty() {
            line.push_str(&paint(&format!("  {metadata}"), self.dim()));
        }
    }

    fn pod_style(&mut self, pod_name: &str) -> Style {
        if !self.color {
            return Style::new();
        }
        Style::new().fg_color(Some(Color::Rgb(self.colors.get(pod_name))))
    }

    fn level_style(&self, level: &NormalizedLevel) -> Style {
        if !self.color {
            return Style::new();
        }
        match level.severity {
            Severity::Info => bold_fg(AnsiColor::Green),
            Severity::Warn => bold_fg(AnsiColor::Yellow),
            Severity::Error => bold_fg(AnsiColor::Red),
            Severity::Debug => Style::new().effects(Effects::DIMMED),
            Severity::Other => Style::new(),
        }
    }

    fn dim(&self) -> Style {
        if !self.color {
            return Style::new();
        }
        Style::new().effects(Effects::DIMMED)
    }
}

fn bold_fg(color: AnsiColor) -> Style {
    Style::new()
        .fg_color(Some(Color::Ansi(color)))
        .effects(Effects::BOLD)
}

fn paint(s: &str, style: Style) -> String {
    if style == Style::new() {
        return s.to_string();
    }
    format!("{}{}{}", style.render(), s, style.render_reset())
}

fn parse_json_object(message: &str) -> Option<Map<String, Value>> {
    let trimmed = message.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn first_string<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_str))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Severity {
    Info,
    Warn,
    Error,
    Debug,
    Other,
}

struct NormalizedLevel {
    tag: String,
    severity: Severity,
}

fn normalize_level(raw: &str) -> NormalizedLevel {
    let upper = raw.to_ascii_uppercase();
    let (tag, severity) = match upper.as_str() {
        "INFO" | "INF" => ("INFO", Severity::Info),
        "WARN" | "WARNING" => ("WARN", Severity::Warn),
        "ERROR" | "ERR" | "FATAL" | "CRIT" => ("ERROR", Severity::Error),
        "DEBUG" | "DBG" => ("DEBUG", Severity::Debug),
        _ => {
            return NormalizedLevel {
                tag: upper,
                severity: Severity::Other,
            }
        }
    };
    NormalizedLevel {
        tag: tag.to_string(),
        severity,
    }
}

/// Remaining fields as `k=v` pairs in source order, skipping every level and
/// message candidate key.
fn format_metadata(fields: &Map<String, Value>) -> String {
    let mut parts = Vec::new();
    for (key, value) in fields {
        if LEVEL_KEYS.contains(&key.as_str()) || MESSAGE_KEYS.contains(&key.as_str()) {
            continue;
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Number(_) | Value::Bool(_) => value.to_string(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };
        parts.push(format!("{key}={rendered}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use crate::types::ContainerKind;

    use super::*;

    fn container(ns: &str, pod: &str, name: &str) -> ContainerRef {
        ContainerRef {
            namespace: ns.into(),
            pod_name: pod.into(),
            container_name: name.into(),
            kind: ContainerKind::Main,
        }
    }

    fn entry(ns: &str, pod: &str, name: &str, message: &str) -> LogEntry {
        LogEntry::new(container(ns, pod, name), message.into())
    }

    #[test]
    fn single_namespace_single_container_omits_both_segments() {
        let containers = vec![container("default", "web", "nginx")];
        let mut f = LineFormatter::new(1, &containers, false);

        assert_eq!(f.format(&entry("default", "web", "nginx", "hello")), "web > hello");
        assert_eq!(f.format(&entry("default", "web", "nginx", "world")), "web > world");
    }

    #[test]
    fn multi_namespace_prefixes_align() {
        let containers = vec![container("a", "p1", "c"), container("b", "p2", "c")];
        let mut f = LineFormatter::new(2, &containers, false);

        assert_eq!(f.format(&entry("a", "p1", "c", "x")), "[a] p1 > x");
        assert_eq!(f.format(&entry("b", "p2", "c", "y")), "[b] p2 > y");
    }

    #[test]
    fn uneven_prefixes_pad_to_the_widest() {
        let containers = vec![
            container("default", "web", "nginx"),
            container("default", "api-backend", "server"),
        ];
        let mut f = LineFormatter::new(1, &containers, false);

        assert_eq!(f.format(&entry("default", "web", "nginx", "x")), "web         > x");
        assert_eq!(
            f.format(&entry("default", "api-backend", "server", "y")),
            "api-backend > y"
        );
    }

    #[test]
    fn multi_container_pods_show_the_container() {
        let containers = vec![
            container("default", "web", "nginx"),
            container("default", "web", "sidecar"),
        ];
        let mut f = LineFormatter::new(1, &containers, false);

        assert_eq!(
            f.format(&entry("default", "web", "nginx", "x")),
            "web (nginx)   > x"
        );
        assert_eq!(
            f.format(&entry("default", "web", "sidecar", "y")),
            "web (sidecar) > y"
        );
    }

    #[test]
    fn json_lines_extract_level_message_and_metadata() {
        let containers = vec![container("default", "web", "nginx")];
        let mut f = LineFormatter::new(1, &containers, false);

        let line = f.format(&entry(
            "default",
            "web",
            "nginx",
            r#"{"level":"INFO","msg":"Request received","path":"/api/users","method":"GET"}"#,
        ));
        assert_eq!(line, "web > [INFO] Request received  path=/api/users method=GET");
    }

    #[test]
    fn level_synonyms_normalize() {
        let containers = vec![container("default", "web", "nginx")];
        let mut f = LineFormatter::new(1, &containers, false);

        let warn = f.format(&entry("default", "web", "nginx", r#"{"severity":"warning","msg":"m"}"#));
        assert_eq!(warn, "web > [WARN] m");

        let err = f.format(&entry("default", "web", "nginx", r#"{"lvl":"fatal","message":"m"}"#));
        assert_eq!(err, "web > [ERROR] m");
    }

    #[test]
    fn message_without_level_drops_the_tag() {
        let containers = vec![container("default", "web", "nginx")];
        let mut f = LineFormatter::new(1, &containers, false);

        let line = f.format(&entry("default", "web", "nginx", r#"{"msg":"plain","count":3}"#));
        assert_eq!(line, "web > plain  count=3");
    }

    #[test]
    fn non_json_and_broken_json_pass_through_raw() {
        let containers = vec![container("default", "web", "nginx")];
        let mut f = LineFormatter::new(1, &containers, false);

        assert_eq!(f.format(&entry("default", "web", "nginx", "GET /healthz 200")), "web > GET /healthz 200");
        assert_eq!(f.format(&entry("default", "web", "nginx", "{broken")), "web > {broken");
    }

    #[test]
    fn rendering_is_idempotent() {
        let containers = vec![container("default", "web", "nginx")];

        let plain = entry("default", "web", "nginx", "hello");
        let mut f = LineFormatter::new(1, &containers, false);
        assert_eq!(f.format(&plain), f.format(&plain));

        let mut colored = LineFormatter::new(1, &containers, true);
        assert_eq!(colored.format(&plain), colored.format(&plain));
    }

    #[test]
    fn color_mode_only_adds_styling() {
        let containers = vec![container("default", "web", "nginx")];
        let mut plain = LineFormatter::new(1, &containers, false);
        let mut colored = LineFormatter::new(1, &containers, true);

        let e = entry("default", "web", "nginx", "hello");
        let colored_line = colored.format(&e);
        assert!(colored_line.contains("\x1b["));

        let stripped: String = strip_ansi(&colored_line);
        assert_eq!(stripped, plain.format(&e));
    }

    #[test]
    fn width_grows_for_rotated_pods_and_never_shrinks() {
        let containers = vec![container("default", "web", "nginx")];
        let mut f = LineFormatter::new(1, &containers, false);

        assert_eq!(f.format(&entry("default", "web", "nginx", "x")), "web > x");
        assert_eq!(
            f.format(&entry("default", "web-replacement-abc", "nginx", "y")),
            "web-replacement-abc > y"
        );
        // Earlier pods now pad to the grown width.
        assert_eq!(
            f.format(&entry("default", "web", "nginx", "z")),
            "web                 > z"
        );
    }

    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}
