pub mod format;
pub mod stdout;

use crate::types::LogEntry;

/// Contract between the streaming engine and any front end. The engine never
/// writes to the terminal itself; the consumer task is the only caller.
pub trait Render {
    /// Renders one log entry as one output line.
    fn render(&mut self, entry: &LogEntry);

    /// Out-of-band warning (stream permission problems, truncation notices).
    fn warn(&mut self, text: &str);

    /// Out-of-band failure report for abnormal conditions.
    fn error(&mut self, text: &str);
}
