//! Diagnostics routed to syslog.
//!
//! `tracing` events are formatted by `tracing-subscriber` and handed to the
//! AUTH facility at the priority matching their level. Debug events are only
//! emitted when the module was loaded with the `debug` argument.

use once_cell::sync::Lazy;
use std::io;
use std::sync::{Mutex, Once};
use syslog::{Facility, Formatter3164, LoggerBackend};
use tracing::{Level, Metadata};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// Process name attached to every syslog record.
pub const PROCESS_NAME: &str = "oauth-ssh";

static INIT: Once = Once::new();

static SYSLOG: Lazy<Mutex<Option<syslog::Logger<LoggerBackend, Formatter3164>>>> =
    Lazy::new(|| {
        let formatter = Formatter3164 {
            facility: Facility::LOG_AUTH,
            hostname: None,
            process: PROCESS_NAME.to_string(),
            pid: std::process::id(),
        };

        Mutex::new(syslog::unix(formatter).ok())
    });

/// Install the syslog subscriber. Only the first call in a process has any
/// effect.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let level = if debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        let _ = tracing_subscriber::registry()
            .with(level)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(SyslogMakeWriter)
                    .without_time()
                    .with_ansi(false)
                    .with_target(false),
            )
            .try_init();
    });
}

/// Send an already formatted record at info priority.
pub fn syslog_info(message: &str) {
    send(Level::INFO, message);
}

fn send(level: Level, message: &str) {
    let message = message.trim_end();
    if message.is_empty() {
        return;
    }

    let Ok(mut guard) = SYSLOG.lock() else {
        return;
    };
    let Some(ref mut logger) = *guard else {
        return;
    };

    let _ = match level {
        Level::ERROR => logger.err(message),
        Level::WARN => logger.warning(message),
        Level::INFO => logger.info(message),
        _ => logger.debug(message),
    };
}

struct SyslogMakeWriter;

impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter::new(*meta.level())
    }
}

/// Buffers one formatted event; the record is sent when dropped.
struct SyslogWriter {
    level: Level,
    buf: Vec<u8>,
}

impl SyslogWriter {
    fn new(level: Level) -> Self {
        Self {
            level,
            buf: Vec::new(),
        }
    }

    fn message(&self) -> String {
        String::from_utf8_lossy(&self.buf).trim_end().to_string()
    }
}

impl io::Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        send(self.level, &self.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_init_is_idempotent() {
        init(true);
        init(false);
        tracing::info!("logging initialized twice");
        assert!(INIT.is_completed());
    }

    #[test]
    fn test_writer_trims_line_ending() {
        let mut writer = SyslogWriter::new(Level::WARN);
        writeln!(writer, "WARN Mapped account missing").unwrap();
        assert_eq!(writer.message(), "WARN Mapped account missing");
    }

    #[test]
    fn test_writer_level_follows_event() {
        let writer = SyslogMakeWriter.make_writer();
        assert_eq!(writer.level, Level::INFO);
    }
}
