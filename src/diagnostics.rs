//! Envelope-shaped diagnostics on stderr.
//!
//! stdout carries the data stream, so every `tracing` event is rendered as a
//! `{"type":"log",...}` record on stderr instead of human-oriented text.

use std::fmt::{self, Write as _};
use std::io::Write;
use std::process::ExitCode;

use tracing::field::{Field, Visit};
use tracing::{error, Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::envelope::{ErrorFrame, LogRecord};
use crate::error::{BridgeError, ErrorKind};

/// `tracing` layer writing one [`LogRecord`] per event.
pub struct LogSink<W> {
    program: String,
    make_writer: W,
}

impl LogSink<fn() -> std::io::Stderr> {
    pub fn stderr(program: &str) -> Self {
        Self::with_writer(program, std::io::stderr)
    }
}

impl<W> LogSink<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    pub fn with_writer(program: &str, make_writer: W) -> Self {
        Self {
            program: program.to_string(),
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for LogSink<W>
where
    S: Subscriber,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord::new(
            &self.program,
            &event.metadata().level().as_str().to_ascii_lowercase(),
            visitor.finish(),
        );
        let Ok(mut line) = serde_json::to_vec(&record) else {
            return;
        };
        line.push(b'\n');

        let mut writer = self.make_writer.make_writer();
        // Nowhere left to report a failed diagnostic write.
        let _ = writer.write_all(&line);
        let _ = writer.flush();
    }
}

/// Collects the `message` field and appends any other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`) plus [`LogSink`].
pub fn init(program: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(LogSink::stderr(program))
        .init();
}

/// Report the error that ended the process, once.
///
/// Fatal configuration problems become an error frame on stdout so the
/// downstream consumer sees them; fatal filesystem problems become one on
/// stderr. Anything else is a runtime failure and goes through the LogSink.
pub fn report_fatal(err: &anyhow::Error) {
    report_fatal_to(err, &mut std::io::stdout(), &mut std::io::stderr());
}

fn report_fatal_to<'a>(err: &anyhow::Error, stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) {
    let Some(bridge) = err.downcast_ref::<BridgeError>().filter(|e| e.is_fatal()) else {
        error!("{err:#}");
        return;
    };
    let Ok(line) = serde_json::to_string(&ErrorFrame::new(bridge.to_string())) else {
        return;
    };

    let out = match bridge.kind() {
        ErrorKind::Configuration => stdout,
        _ => stderr,
    };
    // The reader may already be gone.
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

/// Exit status for a finished process, reporting a startup failure first.
pub fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_fatal(&e);
            ExitCode::FAILURE
        }
    }
}
