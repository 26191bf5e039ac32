use std::io::{self, Write};
use std::time::Instant;

use crate::chunker::ChunkRange;

/// Milestones of one document translation, reported in the order they happen.
///
/// With several workers, `Translated`/`Failed` arrive in completion order,
/// not chunk order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    Planned {
        chunks: usize,
        lines: usize,
    },
    Translated {
        done: usize,
        total: usize,
        range: ChunkRange,
    },
    Failed {
        range: ChunkRange,
        message: String,
    },
    Merged {
        chunks: usize,
        chars: usize,
    },
}

/// Caller-supplied hook for progress reporting.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ChunkEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn on_event(&self, _event: &ChunkEvent) {}
}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", msg.as_ref());
    }

    pub fn progress(&self, label: &str, current: usize, total: usize) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", progress_line(label, current, total));
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_event(&self, event: &ChunkEvent) {
        match event {
            ChunkEvent::Planned { chunks, lines } => {
                self.info(format!("Split {lines} lines into {chunks} chunk(s)"));
            }
            ChunkEvent::Translated { done, total, range } => {
                self.progress(&format!("Translated {range}:"), *done, *total);
            }
            ChunkEvent::Failed { range, message } => {
                self.info(format!("Chunk {range} failed: {message}"));
            }
            ChunkEvent::Merged { chunks, chars } => {
                self.info(format!("Merged {chunks} chunk(s), {chars} chars"));
            }
        }
    }
}

fn progress_line(label: &str, current: usize, total: usize) -> String {
    let total = total.max(1);
    let current = current.min(total);
    let pct = (current as f64 / total as f64) * 100.0;
    format!("{label} {current}/{total} ({pct:5.1}%)")
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
