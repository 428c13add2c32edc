//! Progress reporting and cooperative cancellation.
//!
//! A host (CLI log lines, a GUI dialog, tests) implements [`ProgressSink`].
//! The tokenizer drives it only during full-file scans: `start` once,
//! `update` at chunk checkpoints, and `end` on every exit path. Returning
//! `false` from `update` cancels the scan.

use log::info;

pub trait ProgressSink {
    fn start(&mut self, _total_bytes: Option<u64>) {}

    /// Reports the number of input bytes consumed so far. Returns `false`
    /// to request cancellation.
    fn update(&mut self, bytes_consumed: u64) -> bool;

    fn end(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _bytes_consumed: u64) -> bool {
        true
    }
}

/// Emits an `info!` line each time another tenth of the input is consumed.
#[derive(Debug)]
pub struct LogProgress {
    label: String,
    total: Option<u64>,
    last_decile: u64,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total: None,
            last_decile: 0,
        }
    }
}

impl ProgressSink for LogProgress {
    fn start(&mut self, total_bytes: Option<u64>) {
        self.total = total_bytes.filter(|total| *total > 0);
        self.last_decile = 0;
        info!("Importing {}", self.label);
    }

    fn update(&mut self, bytes_consumed: u64) -> bool {
        if let Some(total) = self.total {
            let decile = (bytes_consumed.min(total) * 10) / total;
            if decile > self.last_decile {
                self.last_decile = decile;
                info!("{}: {}% read", self.label, decile * 10);
            }
        }
        true
    }

    fn end(&mut self) {
        info!("Finished reading {}", self.label);
    }
}

/// Calls [`ProgressSink::end`] when dropped.
pub(crate) struct ProgressGuard<'a> {
    sink: &'a mut dyn ProgressSink,
}

impl<'a> ProgressGuard<'a> {
    pub(crate) fn start(sink: &'a mut dyn ProgressSink, total_bytes: Option<u64>) -> Self {
        sink.start(total_bytes);
        Self { sink }
    }

    pub(crate) fn update(&mut self, bytes_consumed: u64) -> bool {
        self.sink.update(bytes_consumed)
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.sink.end();
    }
}
