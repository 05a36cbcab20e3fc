//! A minimal logger for tests and host drivers.
//!
//! Level comes from the `LOG` environment variable (`error`, `warn`,
//! `info`, `debug`, `trace`), defaulting to `warn` so test output stays
//! quiet unless asked.

use std::io::Write as _;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        let _ = writeln!(
            std::io::stderr(),
            "\x1b[{color}m[{:>5}] {}\x1b[0m",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;
static INIT: Once = Once::new();

/// Installs the logger once; later calls are no-ops.
pub fn init_logger() {
    INIT.call_once(|| {
        let level = match std::env::var("LOG").as_deref() {
            Ok("error") => LevelFilter::Error,
            Ok("warn") => LevelFilter::Warn,
            Ok("info") => LevelFilter::Info,
            Ok("debug") => LevelFilter::Debug,
            Ok("trace") => LevelFilter::Trace,
            _ => LevelFilter::Warn,
        };
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(level);
    });
}
