use chrono::Local;
use colored::*;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber with colorized output on stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies (e.g. `"info"`
/// or `"wellness_sdk_rs=debug"`). Calling it twice is harmless.
/// Example: `RUST_LOG=wellness_sdk_rs=trace wellness-chat ask --symptoms "..."`
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .event_format(CustomFormatter)
        .try_init();
}

struct CustomFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now().format("%H:%M:%S%.3f").to_string();
        let metadata = event.metadata();

        write!(
            writer,
            "{} {} {} ",
            now.dimmed(),
            level_label(*metadata.level()),
            metadata.target().dimmed()
        )?;

        let mut message = String::new();
        event.record(&mut MessageVisitor {
            message: &mut message,
        });

        writeln!(writer, "{}", message)
    }
}

fn level_label(level: tracing::Level) -> ColoredString {
    match level {
        tracing::Level::ERROR => "ERROR".red().bold(),
        tracing::Level::WARN => " WARN".yellow().bold(),
        tracing::Level::INFO => " INFO".green().bold(),
        tracing::Level::DEBUG => "DEBUG".blue().bold(),
        tracing::Level::TRACE => "TRACE".magenta().bold(),
    }
}

/// Writes the `message` field bare and every other field as ` key=value`.
struct MessageVisitor<'a> {
    message: &'a mut String,
}

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        use std::fmt::Write;
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.message, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        use std::fmt::Write;
        if field.name() == "message" {
            let _ = write!(self.message, "{}", value);
        } else {
            let _ = write!(self.message, " {}={}", field.name(), value);
        }
    }
}
