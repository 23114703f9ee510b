//! Time utilities: the shared clock source and human-readable durations.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Millisecond wall-clock source shared by every reader and writer in the
/// pipeline, so cooldown comparisons always use the same notion of "now".
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_millis: i64) {
        self.now.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Format seconds as a compact human-readable duration.
///
/// Uses the two largest applicable units: "45s", "5m 30s", "2h 5m", "3d 4h".
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);

    if seconds < 60 {
        return format!("{seconds}s");
    }

    let minutes = seconds / 60;
    let rem_seconds = seconds % 60;

    if minutes < 60 {
        return if rem_seconds > 0 {
            format!("{minutes}m {rem_seconds}s")
        } else {
            format!("{minutes}m")
        };
    }

    let hours = minutes / 60;
    let rem_minutes = minutes % 60;

    if hours < 24 {
        return if rem_minutes > 0 {
            format!("{hours}h {rem_minutes}m")
        } else {
            format!("{hours}h")
        };
    }

    let days = hours / 24;
    let rem_hours = hours % 24;

    if rem_hours > 0 {
        format!("{days}d {rem_hours}h")
    } else {
        format!("{days}d")
    }
}

/// Parse a duration string like "1h30m" into seconds.
///
/// Recognized unit suffixes: s, m, h, d, w. Digits without a recognized
/// suffix are ignored, and an empty input parses to zero.
pub fn parse_duration(input: &str) -> i64 {
    let mut total = 0i64;
    let mut number = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            if let Ok(value) = number.parse::<i64>() {
                total += match c {
                    's' => value,
                    'm' => value * 60,
                    'h' => value * 3600,
                    'd' => value * 86_400,
                    'w' => value * 604_800,
                    _ => 0,
                };
            }
            number.clear();
        }
    }

    total
}
