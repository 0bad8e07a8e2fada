//! Output streams for diagnostic and error lines

use std::io::{self, Write};

use parking_lot::Mutex;

use crate::verbosity::Verbosity;

/// Which stream a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Gated trace/debug output at the given severity
    Diagnostic(Verbosity),
    /// Error reports, never gated
    Error,
}

impl Channel {
    pub fn is_error(&self) -> bool {
        matches!(self, Channel::Error)
    }
}

/// Destination for fully rendered lines.
///
/// Implementations receive one complete line per call (without the trailing
/// newline) and must write it atomically with respect to other lines.
/// Writing must never panic; I/O failures are swallowed.
pub trait Sink: Send + Sync {
    fn write_line(&self, channel: Channel, line: &str);
}

/// Diagnostics to stdout, errors to stderr, flushed after every line
#[derive(Debug, Default, Clone, Copy)]
pub struct StdSink;

impl StdSink {
    fn write_to(mut out: impl Write, line: &str) {
        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line);
        buffer.push('\n');
        let _ = out.write_all(buffer.as_bytes());
        let _ = out.flush();
    }
}

impl Sink for StdSink {
    fn write_line(&self, channel: Channel, line: &str) {
        match channel {
            Channel::Error => Self::write_to(io::stderr().lock(), line),
            Channel::Diagnostic(_) => Self::write_to(io::stdout().lock(), line),
        }
    }
}

/// Routes lines into `tracing` events.
///
/// A diagnostic at severity `s` becomes an event at `s.tracing_level()`, so a
/// subscriber filtered at the gate's `tracing_level()` keeps every line the
/// gate lets through.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn write_line(&self, channel: Channel, line: &str) {
        match channel {
            Channel::Error | Channel::Diagnostic(Verbosity::OnlyError) => {
                tracing::error!(target: "pmdiag", "{line}")
            }
            Channel::Diagnostic(Verbosity::Info) => tracing::info!(target: "pmdiag", "{line}"),
            Channel::Diagnostic(Verbosity::Detail) => tracing::debug!(target: "pmdiag", "{line}"),
            Channel::Diagnostic(Verbosity::Develop) => tracing::trace!(target: "pmdiag", "{line}"),
        }
    }
}

/// A captured line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub channel: Channel,
    pub line: String,
}

/// In-memory sink, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.line.clone()).collect()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.channel.is_error())
            .map(|r| r.line.clone())
            .collect()
    }

    pub fn diagnostic_lines(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| !r.channel.is_error())
            .map(|r| r.line.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Sink for MemorySink {
    fn write_line(&self, channel: Channel, line: &str) {
        self.records.lock().push(Record {
            channel,
            line: line.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::Diagnostics;
    use crate::finalize::Finalizer;

    /// Formatted subscriber output
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Subscriber configured the way the `pmdiag` binary sets it up
    fn capture_at(gate: Verbosity, f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(gate.tracing_level())
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.text()
    }

    #[test]
    fn test_memory_sink_splits_channels() {
        let sink = MemorySink::new();
        sink.write_line(Channel::Diagnostic(Verbosity::Info), "DEBUG - hello");
        sink.write_line(Channel::Error, "ERROR - boom");

        assert_eq!(sink.lines().len(), 2);
        assert_eq!(sink.error_lines(), vec!["ERROR - boom".to_string()]);
        assert_eq!(sink.diagnostic_lines(), vec!["DEBUG - hello".to_string()]);

        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_std_sink_does_not_panic() {
        StdSink.write_line(Channel::Diagnostic(Verbosity::Develop), "DEBUG - std sink");
        StdSink.write_line(Channel::Error, "ERROR - std sink");
    }

    #[test]
    fn test_tracing_sink_keeps_only_error_diagnostics_at_default_level() {
        let diag = Diagnostics::new(
            Verbosity::OnlyError,
            Arc::new(TracingSink),
            Finalizer::default(),
        );

        let text = capture_at(Verbosity::OnlyError, || {
            diag.emit(Verbosity::OnlyError, crate::site!(), format_args!("must be visible"));
        });

        assert!(text.contains("must be visible"), "captured: {text:?}");
    }

    #[test]
    fn test_tracing_sink_matches_gate_at_every_level() {
        for gate in Verbosity::all() {
            let diag = Diagnostics::new(gate, Arc::new(TracingSink), Finalizer::default());

            let text = capture_at(gate, || {
                for severity in Verbosity::all() {
                    diag.emit(severity, crate::site!(), format_args!("line at {severity}"));
                }
                TracingSink.write_line(Channel::Error, "ERROR - error line");
            });

            for severity in Verbosity::all() {
                let needle = format!("line at {severity}");
                assert_eq!(
                    text.contains(&needle),
                    severity <= gate,
                    "{severity} at gate {gate}, captured: {text:?}"
                );
            }
            assert!(text.contains("ERROR - error line"));
        }
    }
}
