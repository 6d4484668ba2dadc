//! Human-readable order numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Produces unique, human-readable order numbers.
pub trait OrderNumberGenerator: Send + Sync {
    fn next_number(&self) -> String;
}

/// Shared by every [`ClockOrderNumbers`] in the process.
static CLOCK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `{prefix}-{YYYYMMDD}-{HHMMSS}-{nnnn}`: the UTC clock plus a process-wide
/// counter. Generators in one process never repeat each other, and a
/// restarted process starts from a later timestamp.
///
/// This is the default generator for [`OrderService`](crate::orders::OrderService).
#[derive(Debug, Clone)]
pub struct ClockOrderNumbers {
    prefix: String,
}

impl ClockOrderNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl OrderNumberGenerator for ClockOrderNumbers {
    fn next_number(&self) -> String {
        let seq = CLOCK_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
        format!(
            "{}-{}-{:04}",
            self.prefix,
            Utc::now().format("%Y%m%d-%H%M%S"),
            seq
        )
    }
}

/// `{prefix}-{YYYYMMDD}-{sequence}` with a zero-padded per-generator sequence.
///
/// Only unique while a single generator issues numbers for a store; resume
/// it with [`starting_at`](Self::starting_at) after a restart.
#[derive(Debug)]
pub struct SequentialOrderNumbers {
    prefix: String,
    sequence: AtomicU64,
}

impl SequentialOrderNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// Resume numbering, e.g. after loading the last issued sequence.
    pub fn starting_at(prefix: impl Into<String>, next: u64) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(next),
        }
    }
}

impl OrderNumberGenerator for SequentialOrderNumbers {
    fn next_number(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{:06}",
            self.prefix,
            Utc::now().format("%Y%m%d"),
            seq
        )
    }
}
