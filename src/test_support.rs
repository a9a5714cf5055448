//! Test helpers: a `log` backend that records records per thread so tests can
//! assert on warnings without seeing each other's output.

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[derive(Debug, Clone)]
pub struct CapturedLog {
    pub level: Level,
    pub target: String,
    pub message: String,
}

thread_local! {
    static BUFFER: RefCell<Option<Vec<CapturedLog>>> = const { RefCell::new(None) };
}

struct ThreadLocalLogger;

impl Log for ThreadLocalLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        BUFFER.with(|buffer| {
            if let Some(entries) = buffer.borrow_mut().as_mut() {
                entries.push(CapturedLog {
                    level: record.level(),
                    target: record.target().to_string(),
                    message: record.args().to_string(),
                });
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLocalLogger = ThreadLocalLogger;
static INSTALL: Once = Once::new();

/// Records log output on the current thread until dropped.
pub struct LogCapture {
    _private: (),
}

impl LogCapture {
    pub fn start() -> Self {
        INSTALL.call_once(|| {
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(LevelFilter::Trace);
            }
        });
        BUFFER.with(|buffer| *buffer.borrow_mut() = Some(Vec::new()));
        Self { _private: () }
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        BUFFER.with(|buffer| *buffer.borrow_mut() = None);
    }
}

pub fn captured_logs() -> Vec<CapturedLog> {
    BUFFER.with(|buffer| buffer.borrow().clone().unwrap_or_default())
}

pub fn warnings_containing(needle: &str) -> usize {
    captured_logs()
        .iter()
        .filter(|entry| entry.level == Level::Warn && entry.message.contains(needle))
        .count()
}
