//! Log sink collaborator for diagnostic output.
//!
//! The interception layer never owns an output device. Everything it wants to
//! say goes through a [`LogSink`], a host-provided collaborator modeled on a
//! pair of numbered byte streams: [`Stream::Output`] (stream 1) for routine
//! lines and [`Stream::Diagnostic`] (stream 2) for failures that need
//! operator attention.
//!
//! Lines are bounded. A formatted line longer than [`LOG_LINE_MAX`] bytes is
//! truncated at a character boundary before it reaches the device; it is never
//! split across multiple writes and never overflows the bound. [`clamp_line`]
//! implements the standard bound and both in-tree sinks apply it.
//!
//! Two implementations ship with the crate:
//! - [`ConsoleSink`] writes to the process stdout/stderr pair, matching the
//!   stream numbering.
//! - [`MemorySink`] captures lines in an append-only buffer for tests and
//!   embedders that post-process diagnostics.

use std::io::{self, Write};

/// Reserved headroom for a device-level line prefix, in bytes.
///
/// Kept out of [`LOG_LINE_MAX`] so a sink may prepend a short tag (timestamp,
/// component name) without pushing the line past a 1 KiB device buffer.
pub const PREFIX_MAX: usize = 32;

/// Maximum length of a single sink line, in bytes.
///
/// Lines longer than this are truncated by [`clamp_line`] before the sink
/// writes them.
pub const LOG_LINE_MAX: usize = 1024 - PREFIX_MAX;

/// Destination stream for a sink line.
///
/// Streams carry fixed numbers so hosts bridging to file descriptors or
/// syslog severities have a stable mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Routine output (stream 1). Successful hide/unhide confirmations and
    /// interception notices go here.
    Output = 1,

    /// Diagnostic output (stream 2). Refused admin calls, allocation
    /// failures, and hook lifecycle errors go here.
    Diagnostic = 2,
}

impl Stream {
    /// Returns the fixed stream number (1 for output, 2 for diagnostic)
    #[must_use]
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

/// Bounds a line to [`LOG_LINE_MAX`] bytes at a character boundary.
///
/// Returns the input unchanged when it already fits. Otherwise the cut is
/// placed at the highest character boundary not exceeding the bound, so the
/// result is always valid UTF-8 and never longer than [`LOG_LINE_MAX`].
///
/// # Examples
///
/// ```rust
/// use veiltap::sink::{clamp_line, LOG_LINE_MAX};
///
/// let long = "x".repeat(LOG_LINE_MAX + 100);
/// assert_eq!(clamp_line(&long).len(), LOG_LINE_MAX);
/// assert_eq!(clamp_line("short"), "short");
/// ```
#[must_use]
pub fn clamp_line(line: &str) -> &str {
    if line.len() <= LOG_LINE_MAX {
        return line;
    }

    let mut end = LOG_LINE_MAX;
    while !line.is_char_boundary(end) {
        end -= 1;
    }

    &line[..end]
}

/// Receiver for bounded diagnostic lines.
///
/// Implementations must be callable from any thread and must never surface a
/// write failure to the caller; a sink that cannot write drops the line.
/// Implementations are expected to bound line length, normally by running
/// each line through [`clamp_line`].
pub trait LogSink: Send + Sync {
    /// Writes one line to the given stream.
    ///
    /// The line does not include a trailing newline; sinks writing to
    /// line-oriented devices append their own.
    fn log(&self, stream: Stream, line: &str);
}

/// Sink writing to the process stdout/stderr pair.
///
/// [`Stream::Output`] maps to stdout, [`Stream::Diagnostic`] to stderr,
/// matching the fixed stream numbers. Write errors are swallowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Creates a console sink
    #[must_use]
    pub fn new() -> Self {
        ConsoleSink
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, stream: Stream, line: &str) {
        let line = clamp_line(line);
        let _ = match stream {
            Stream::Output => writeln!(io::stdout(), "{line}"),
            Stream::Diagnostic => writeln!(io::stderr(), "{line}"),
        };
    }
}

/// Sink capturing lines in memory.
///
/// Backed by an append-only concurrent vector, so capture never blocks the
/// threads producing diagnostics. Primarily used by tests asserting on the
/// exact line sequence an operation produced.
///
/// # Examples
///
/// ```rust
/// use veiltap::sink::{LogSink, MemorySink, Stream};
///
/// let sink = MemorySink::new();
/// sink.log(Stream::Output, "PID 42 is hidden.");
///
/// assert_eq!(sink.len(), 1);
/// assert!(sink.contains("PID 42 is hidden."));
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: boxcar::Vec<(Stream, String)>,
}

impl MemorySink {
    /// Creates an empty capture sink
    #[must_use]
    pub fn new() -> Self {
        MemorySink {
            lines: boxcar::Vec::new(),
        }
    }

    /// Number of captured lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.count()
    }

    /// Returns true if nothing has been captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies out all captured lines with their streams, in capture order
    #[must_use]
    pub fn lines(&self) -> Vec<(Stream, String)> {
        self.lines
            .iter()
            .map(|(_, (stream, line))| (*stream, line.clone()))
            .collect()
    }

    /// Copies out the captured line texts, in capture order
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|(_, (_, line))| line.clone())
            .collect()
    }

    /// Returns true if any captured line contains the given fragment
    #[must_use]
    pub fn contains(&self, fragment: &str) -> bool {
        self.lines.iter().any(|(_, (_, line))| line.contains(fragment))
    }
}

impl LogSink for MemorySink {
    fn log(&self, stream: Stream, line: &str) {
        self.lines.push((stream, clamp_line(line).to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_numbers() {
        assert_eq!(Stream::Output.number(), 1);
        assert_eq!(Stream::Diagnostic.number(), 2);
    }

    #[test]
    fn test_clamp_short_line_untouched() {
        assert_eq!(clamp_line(""), "");
        assert_eq!(clamp_line("PID 42 is hidden."), "PID 42 is hidden.");
    }

    #[test]
    fn test_clamp_exact_bound_untouched() {
        let line = "a".repeat(LOG_LINE_MAX);
        assert_eq!(clamp_line(&line), line.as_str());
    }

    #[test]
    fn test_clamp_overlong_line() {
        let line = "a".repeat(LOG_LINE_MAX * 2);
        let clamped = clamp_line(&line);
        assert_eq!(clamped.len(), LOG_LINE_MAX);
        assert!(clamped.chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_clamp_respects_char_boundaries() {
        // 990 ASCII bytes followed by a three-byte character that straddles
        // the bound; the cut must land before the multi-byte character.
        let mut line = "a".repeat(LOG_LINE_MAX - 2);
        line.push('\u{20AC}');
        assert!(line.len() > LOG_LINE_MAX);

        let clamped = clamp_line(&line);
        assert!(clamped.len() <= LOG_LINE_MAX);
        assert_eq!(clamped.len(), LOG_LINE_MAX - 2);
        assert!(clamped.is_char_boundary(clamped.len()));
    }

    #[test]
    fn test_memory_sink_captures_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.log(Stream::Output, "first");
        sink.log(Stream::Diagnostic, "second");
        sink.log(Stream::Output, "third");

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.messages(), vec!["first", "second", "third"]);

        let lines = sink.lines();
        assert_eq!(lines[0], (Stream::Output, "first".to_string()));
        assert_eq!(lines[1], (Stream::Diagnostic, "second".to_string()));
    }

    #[test]
    fn test_memory_sink_contains() {
        let sink = MemorySink::new();
        sink.log(Stream::Output, "PID 7 is hidden.");

        assert!(sink.contains("PID 7"));
        assert!(!sink.contains("PID 8"));
    }

    #[test]
    fn test_memory_sink_clamps() {
        let sink = MemorySink::new();
        sink.log(Stream::Output, &"b".repeat(LOG_LINE_MAX + 1));

        let lines = sink.messages();
        assert_eq!(lines[0].len(), LOG_LINE_MAX);
    }

    #[test]
    fn test_memory_sink_concurrent_capture() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(MemorySink::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let sink = Arc::clone(&sink);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    sink.log(Stream::Output, &format!("thread {t} line {i}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.len(), 200);
    }

    #[test]
    fn test_console_sink_swallows_writes() {
        // No assertion beyond "does not panic"; output goes to the real
        // stdout/stderr pair.
        let sink = ConsoleSink::new();
        sink.log(Stream::Output, "console sink test line");
        sink.log(Stream::Diagnostic, "console sink diagnostic line");
    }
}
