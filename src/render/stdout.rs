use std::io::{self, Write};

use anstyle::{AnsiColor, Color, Effects, Style};

use crate::render::format::LineFormatter;
use crate::render::Render;
use crate::types::LogEntry;

/// Snapshot renderer: log lines to stdout, warnings and errors to stderr.
/// Owned by the consumer task; nothing else writes to the terminal.
pub struct StdoutRenderer {
    formatter: LineFormatter,
    color: bool,
}

impl StdoutRenderer {
    pub fn new(formatter: LineFormatter, color: bool) -> Self {
        Self { formatter, color }
    }

    fn tag_style(&self, color: AnsiColor) -> Style {
        if !self.color {
            return Style::new();
        }
        Style::new()
            .fg_color(Some(Color::Ansi(color)))
            .effects(Effects::BOLD)
    }
}

impl Render for StdoutRenderer {
    fn render(&mut self, entry: &LogEntry) {
        let line = self.formatter.format(entry);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        // A closed pipe just means the reader went away; the run winds down
        // through the cancellation path, not a write error.
        let _ = out.write_all(line.as_bytes());
        let _ = out.write_all(b"\n");
    }

    fn warn(&mut self, text: &str) {
        let style = self.tag_style(AnsiColor::Yellow);
        eprintln!("{}Warning:{} {text}", style.render(), style.render_reset());
    }

    fn error(&mut self, text: &str) {
        let style = self.tag_style(AnsiColor::Red);
        eprintln!("{}Error:{} {text}", style.render(), style.render_reset());
    }
}
