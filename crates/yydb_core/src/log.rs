//! Log bridge to the host's error log.
//!
//! The core logs through `tracing`. [`HostLogLayer`] is a
//! `tracing_subscriber` layer that renders every event into one line and
//! hands it to a [`LogSink`] with the host's severity. Writing a log line
//! never fails the operation that produced it.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::fmt::{self, Write as _};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Severity understood by the host log.
///
/// The discriminants are the integers passed across the host boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Lifecycle notices the host always prints.
    System = 0,
    /// Errors.
    Error = 1,
    /// Warnings.
    Warning = 2,
    /// Informational notes, including debug output.
    Information = 3,
}

impl LogLevel {
    /// Maps a `tracing` level onto the host's severities.
    #[must_use]
    pub fn from_tracing(level: &Level) -> Self {
        match *level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warning,
            _ => Self::Information,
        }
    }

    /// Returns the integer severity for the host boundary.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::System => "System",
            Self::Error => "ERROR",
            Self::Warning => "Warning",
            Self::Information => "Note",
        };
        f.write_str(label)
    }
}

/// Destination for rendered log lines.
///
/// `write` has no error channel on purpose: a sink that can fail deals
/// with it internally.
pub trait LogSink: Send + Sync + 'static {
    /// Writes one log line.
    fn write(&self, level: LogLevel, message: &str);
}

/// A [`LogSink`] over any `io::Write`, one `[Level] message` line per event.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send + 'static> LogSink for WriterSink<W> {
    fn write(&self, level: LogLevel, message: &str) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "[{level}] {message}");
        let _ = writer.flush();
    }
}

/// Tracing layer forwarding events to a [`LogSink`].
#[derive(Clone)]
pub struct HostLogLayer {
    sink: Arc<dyn LogSink>,
}

impl HostLogLayer {
    /// Creates a layer writing to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl fmt::Debug for HostLogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLogLayer").finish_non_exhaustive()
    }
}

impl<S: Subscriber> Layer<S> for HostLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LineVisitor::default();
        event.record(&mut line);
        let level = LogLevel::from_tracing(event.metadata().level());
        let message = line.finish();

        // Sink failures never reach the caller.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| self.sink.write(level, &message)));
    }
}

/// Renders `message` followed by ` key=value` pairs.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        let mut line = String::with_capacity(6 + self.message.len() + self.fields.len());
        line.push_str("yydb: ");
        line.push_str(&self.message);
        line.push_str(&self.fields);
        line
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

fn parse_filter(filter: &str) -> CoreResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| CoreError::invalid_config(format!("bad log filter {filter:?}: {e}")))
}

/// Installs the host log bridge as the process-wide subscriber.
///
/// Returns `Ok(false)` if a global subscriber was already installed, in
/// which case the existing one stays in place.
///
/// # Errors
///
/// Returns [`CoreError::InvalidConfig`] if `filter` is not a valid directive.
pub fn install(sink: Arc<dyn LogSink>, filter: &str) -> CoreResult<bool> {
    let filter = parse_filter(filter)?;
    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(HostLogLayer::new(sink))
        .try_init()
        .is_ok())
}

/// Routes this thread's events to `sink` until the guard is dropped.
///
/// # Errors
///
/// Returns [`CoreError::InvalidConfig`] if `filter` is not a valid directive.
pub fn scoped(sink: Arc<dyn LogSink>, filter: &str) -> CoreResult<DefaultGuard> {
    let filter = parse_filter(filter)?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(HostLogLayer::new(sink));
    Ok(tracing::subscriber::set_default(subscriber))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(LogLevel, String)>>);

    impl LogSink for Capture {
        fn write(&self, level: LogLevel, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    struct Exploding;

    impl LogSink for Exploding {
        fn write(&self, _level: LogLevel, _message: &str) {
            panic!("sink is broken");
        }
    }

    #[test]
    fn events_reach_sink_with_fields() {
        let sink = Arc::new(Capture::default());
        let _guard = scoped(sink.clone(), "debug").unwrap();

        tracing::warn!(table = "orders", refs = 2, "handle leak suspected");
        tracing::debug!("opened");

        let lines = sink.0.lock();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, LogLevel::Warning);
        assert_eq!(lines[0].1, "yydb: handle leak suspected table=orders refs=2");
        assert_eq!(lines[1], (LogLevel::Information, "yydb: opened".to_string()));
    }

    #[test]
    fn filter_drops_lower_levels() {
        let sink = Arc::new(Capture::default());
        let _guard = scoped(sink.clone(), "error").unwrap();

        tracing::info!("not forwarded");
        tracing::error!("forwarded");

        let lines = sink.0.lock();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, LogLevel::Error);
    }

    #[test]
    fn panicking_sink_does_not_reach_caller() {
        let _guard = scoped(Arc::new(Exploding), "info").unwrap();
        tracing::info!("still fine");
    }

    #[test]
    fn writer_sink_formats_lines() {
        let sink = WriterSink::new(Vec::new());
        sink.write(LogLevel::Error, "store offline");
        sink.write(LogLevel::Information, "ready");

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "[ERROR] store offline\n[Note] ready\n");
    }

    #[test]
    fn severities_match_host_values() {
        assert_eq!(LogLevel::System.as_i32(), 0);
        assert_eq!(LogLevel::Error.as_i32(), 1);
        assert_eq!(LogLevel::from_tracing(&Level::TRACE), LogLevel::Information);
    }

    #[test]
    fn bad_filter_is_rejected() {
        let result = scoped(Arc::new(Capture::default()), "yydb=notalevel");
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
}
