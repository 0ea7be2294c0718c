#![cfg(test)]
//! A logger which records warnings so tests can check what was reported.

use std::sync::Mutex;

use log::Level;
use log::Log;
use log::Metadata;
use log::Record;
use once_cell::sync::Lazy;

static RECORDS: Lazy<Mutex<Vec<(Level, String)>>> = Lazy::new(|| Mutex::new(Vec::new()));

#[derive(Debug)]
struct Recorder;

static RECORDER: Recorder = Recorder;

impl Log for Recorder {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            RECORDS
                .lock()
                .expect("the record lock is not poisoned")
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

/// Install the recording logger. Only the first call in a test binary has an effect.
pub(crate) fn install() {
    if log::set_logger(&RECORDER).is_ok() {
        log::set_max_level(log::LevelFilter::Warn);
    }
}

/// Everything recorded so far, by any test.
pub(crate) fn captured() -> Vec<(Level, String)> {
    RECORDS
        .lock()
        .expect("the record lock is not poisoned")
        .clone()
}
