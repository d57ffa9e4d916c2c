use std::fmt;
use std::io::IsTerminal;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::types::LogFormat;

/// Custom tracing formatter that prepends colored [ANSWER]/[REFUSE] prefixes
/// to log events based on message content, and colorizes known field names.
pub struct PrefixedFormatter<E> {
    inner: E,
    ansi: bool,
}

impl<E> PrefixedFormatter<E> {
    pub fn new(inner: E, ansi: bool) -> Self {
        Self { inner, ansi }
    }
}

impl<S, N, E> FormatEvent<S, N> for PrefixedFormatter<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        let msg_lower = visitor.message.to_lowercase();

        if is_refuse_pattern(&msg_lower) {
            if self.ansi {
                write!(writer, "\x1b[31m[REFUSE]\x1b[0m ")?;
            } else {
                write!(writer, "[REFUSE] ")?;
            }
        } else if is_answer_pattern(&msg_lower) {
            if self.ansi {
                write!(writer, "\x1b[34m[ANSWER]\x1b[0m ")?;
            } else {
                write!(writer, "[ANSWER] ")?;
            }
        }

        if self.ansi {
            let mut buf = String::new();
            let buf_writer = Writer::new(&mut buf);
            self.inner.format_event(ctx, buf_writer, event)?;
            write!(writer, "{}", colorize_fields(&buf))?;
            Ok(())
        } else {
            self.inner.format_event(ctx, writer, event)
        }
    }
}

/// Colorize known field names in a log line.
/// cyan=user, yellow=port/addr, magenta=peer, dim=conn_id, red=error.
fn colorize_fields(line: &str) -> String {
    let mut result = line.to_string();
    // Longer names first so "remote_port" is not split by "port"
    for (field, color) in FIELD_COLORS {
        let pattern = format!(" {}=", field);
        if result.contains(&pattern) {
            let colored = format!(" \x1b[{}m{}=\x1b[0m", color, field);
            result = result.replace(&pattern, &colored);
        }
    }
    result
}

/// Field name → ANSI color code mapping.
const FIELD_COLORS: &[(&str, &str)] = &[
    ("user", "36"),
    ("remote_port", "33"),
    ("port", "33"),
    ("addr", "33"),
    ("peer", "35"),
    ("conn_id", "2"),
    ("conn", "2"),
    ("error", "31"),
];

/// Visitor that extracts the message field from a tracing event.
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn is_refuse_pattern(msg: &str) -> bool {
    msg.contains("no connection owns port")
        || msg.contains("unable to start")
        || msg.contains("request timeout")
        || msg.contains("accept error")
        || msg.contains("connection error")
        || msg.contains("error reply sent")
}

fn is_answer_pattern(msg: &str) -> bool {
    msg.contains("resolved ident user") || msg.contains("ident reply sent")
}

/// Initialize the global tracing subscriber.
///
/// In Pretty mode, wraps the default formatter with `PrefixedFormatter`
/// to prepend colored [ANSWER]/[REFUSE] tags and colorize field names.
/// JSON mode is unchanged. Only the binary calls this.
pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Pretty => {
            let ansi = std::io::stdout().is_terminal();
            let default_format = tracing_subscriber::fmt::format::Format::default();
            tracing_subscriber::fmt()
                .event_format(PrefixedFormatter::new(default_format, ansi))
                .with_env_filter(filter)
                .init();
        }
    }
}
