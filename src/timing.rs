//! Per-stage timing, reported as a `Server-Timing` header.

use std::fmt;
use std::time::{Duration, Instant};

/// A pipeline stage that shows up in `Server-Timing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transform,
    SizeCheck,
    CacheWrite,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Transform => "transform",
            Self::SizeCheck => "size-check",
            Self::CacheWrite => "cache-write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only list of stage durations for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingLog {
    entries: Vec<(Stage, Duration)>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.entries.push((stage, elapsed));
    }

    /// Record the time since `started`.
    pub fn record_since(&mut self, stage: Stage, started: Instant) {
        self.record(stage, started.elapsed());
    }

    pub fn entries(&self) -> &[(Stage, Duration)] {
        &self.entries
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.entries.iter().map(|(stage, _)| *stage).collect()
    }

    /// `fetch;dur=12.3, transform;dur=40.0`: durations in milliseconds.
    pub fn header_value(&self) -> String {
        self.entries
            .iter()
            .map(|(stage, elapsed)| {
                format!("{stage};dur={:.1}", elapsed.as_secs_f64() * 1000.0)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
