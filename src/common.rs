// Licensed under the Apache-2.0 license

//! Diagnostic logging shared by the drivers.
//!
//! Drivers never talk to a transport directly. They receive a [`Logger`] and
//! report configuration problems and runtime bus errors through it. The
//! default [`NoOpLogger`] compiles every call away.

use core::fmt::{self, Write};
use heapless::String;

/// Capacity of a single formatted log line.
pub const LOG_LINE_CAPACITY: usize = 96;

pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Forwards every message to the `defmt` global logger.
#[cfg(feature = "defmt")]
#[derive(Clone, Copy, Debug, Default)]
pub struct DefmtLogger;

#[cfg(feature = "defmt")]
impl Logger for DefmtLogger {
    fn debug(&mut self, msg: &str) {
        defmt::debug!("{=str}", msg);
    }

    fn warn(&mut self, msg: &str) {
        defmt::warn!("{=str}", msg);
    }

    fn error(&mut self, msg: &str) {
        defmt::error!("{=str}", msg);
    }
}

/// Severity used by [`log_fmt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Warn,
    Error,
}

/// Render `args` into a fixed-capacity line and hand it to `logger`.
///
/// Formatting stops at the first fragment that no longer fits in
/// [`LOG_LINE_CAPACITY`]; whatever was rendered up to that point is logged.
pub fn log_fmt<L: Logger + ?Sized>(logger: &mut L, level: Level, args: fmt::Arguments<'_>) {
    let mut line: String<LOG_LINE_CAPACITY> = String::new();
    // A full buffer only truncates the message.
    let _ = line.write_fmt(args);
    match level {
        Level::Debug => logger.debug(&line),
        Level::Warn => logger.warn(&line),
        Level::Error => logger.error(&line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        lines: Vec<(Level, std::string::String)>,
    }

    impl Logger for Capture {
        fn debug(&mut self, msg: &str) {
            self.lines.push((Level::Debug, msg.into()));
        }
        fn warn(&mut self, msg: &str) {
            self.lines.push((Level::Warn, msg.into()));
        }
        fn error(&mut self, msg: &str) {
            self.lines.push((Level::Error, msg.into()));
        }
    }

    #[test]
    fn test_log_fmt_routes_level() {
        let mut capture = Capture::default();
        log_fmt(
            &mut capture,
            Level::Error,
            format_args!("errorsrc=0x{:02x}", 2),
        );
        log_fmt(&mut capture, Level::Warn, format_args!("timeout"));

        assert_eq!(capture.lines[0], (Level::Error, "errorsrc=0x02".into()));
        assert_eq!(capture.lines[1].0, Level::Warn);
    }

    #[test]
    fn test_log_fmt_truncates_long_lines() {
        let mut capture = Capture::default();
        let long = "x".repeat(LOG_LINE_CAPACITY * 2);
        log_fmt(&mut capture, Level::Debug, format_args!("{long}"));

        assert!(capture.lines[0].1.len() <= LOG_LINE_CAPACITY);
    }
}
