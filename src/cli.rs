use clap::Parser;

/// kulo: aggregate Kubernetes container logs into one color-coded stream.
#[derive(Debug, Clone, Parser)]
#[command(name = "kulo", version, about)]
pub struct Cli {
    /// Comma-separated namespaces; exact names and/or regex patterns
    /// (default: current context namespace)
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Option<String>,

    /// Kubernetes label selector for server-side filtering, e.g. app=web
    #[arg(short = 'l', long = "label-selector", value_name = "SELECTOR")]
    pub label_selector: Option<String>,

    /// Comma-separated regex patterns to include pods by name
    #[arg(
        short = 'i',
        long = "include",
        visible_alias = "filter",
        short_alias = 'f',
        value_name = "PATTERN"
    )]
    pub include: Option<String>,

    /// Comma-separated regex patterns to exclude pods by name (wins over include)
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    pub exclude: Option<String>,

    /// Exclude init containers from output
    #[arg(long = "exclude-init", default_value_t = false)]
    pub exclude_init: bool,

    /// Exclude ephemeral containers from output
    #[arg(long = "exclude-ephemeral", default_value_t = false)]
    pub exclude_ephemeral: bool,

    /// Follow logs and attach to pods that appear later
    #[arg(long = "follow", default_value_t = false)]
    pub follow: bool,

    /// Show logs since duration, e.g. 10s, 5m, 1h, 2d
    #[arg(short = 's', long = "since", default_value = "10m", value_name = "DURATION")]
    pub since: String,

    /// Number of lines to fetch initially per container
    #[arg(short = 't', long = "tail", default_value_t = 25, value_name = "N")]
    pub tail: i64,

    /// Maximum concurrent container streams (0 = unlimited)
    #[arg(long = "max-containers", default_value_t = 10, value_name = "N")]
    pub max_containers: usize,

    /// Disable log colorization
    #[arg(long = "no-color-logs", default_value_t = false)]
    pub no_color_logs: bool,

    /// Bounded render-queue capacity (backpressure onto producers)
    #[arg(long = "buffer", default_value_t = 1024, value_name = "N")]
    pub buffer: usize,

    /// Run against a built-in fake pod set (no cluster required)
    #[arg(long = "dev", default_value_t = false, hide = true)]
    pub dev: bool,

    /// Lines each dev container emits
    #[arg(long = "dev-lines", default_value_t = 10, hide = true, value_name = "N")]
    pub dev_lines: u64,

    /// Delay between dev lines in milliseconds
    #[arg(long = "dev-rate-ms", default_value_t = 10, hide = true, value_name = "MS")]
    pub dev_rate_ms: u64,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
