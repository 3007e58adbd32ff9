//! Timeout policy for reads and writes.
//!
//! A call's overall budget is `constant + n * multiplier` milliseconds, where
//! `n` is the number of bytes requested. Reads may additionally be cut short
//! by an inter-byte gap. A zero budget means "poll": the engine makes a
//! single non-blocking attempt and returns whatever that produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Maximum gap allowed between two received bytes within one read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterByte {
    /// No inter-byte check; only the overall deadline applies.
    #[default]
    Disabled,
    /// Stop reading once this many milliseconds pass without a new byte.
    Finite(u32),
}

impl InterByte {
    /// Interpret a raw millisecond value, treating [`Timeout::MAX`] as disabled.
    pub fn from_millis(ms: u32) -> Self {
        if ms == Timeout::MAX {
            InterByte::Disabled
        } else {
            InterByte::Finite(ms)
        }
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            InterByte::Disabled => None,
            InterByte::Finite(ms) => Some(Duration::from_millis(u64::from(ms))),
        }
    }
}

impl fmt::Display for InterByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterByte::Disabled => f.write_str("disabled"),
            InterByte::Finite(ms) => write!(f, "{ms}ms"),
        }
    }
}

impl Serialize for InterByte {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InterByte::Disabled => serializer.serialize_str("disabled"),
            InterByte::Finite(ms) => serializer.serialize_u32(*ms),
        }
    }
}

impl<'de> Deserialize<'de> for InterByte {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(u32),
            Word(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(InterByte::from_millis(ms)),
            Raw::Word(word) if word.eq_ignore_ascii_case("disabled") => Ok(InterByte::Disabled),
            Raw::Word(word) => Err(serde::de::Error::custom(format!(
                "expected milliseconds or \"disabled\", got {word:?}"
            ))),
        }
    }
}

/// Deadline rules for reads and writes, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeout {
    pub inter_byte: InterByte,
    pub read_constant_ms: u32,
    pub read_multiplier_ms: u32,
    pub write_constant_ms: u32,
    pub write_multiplier_ms: u32,
}

impl Default for Timeout {
    fn default() -> Self {
        Self::simple(1000)
    }
}

impl Timeout {
    /// Raw sentinel that older configurations use to mean "no inter-byte limit".
    pub const MAX: u32 = u32::MAX;

    /// Same constant budget for reads and writes, no per-byte or inter-byte terms.
    pub fn simple(ms: u32) -> Self {
        Self {
            inter_byte: InterByte::Disabled,
            read_constant_ms: ms,
            read_multiplier_ms: 0,
            write_constant_ms: ms,
            write_multiplier_ms: 0,
        }
    }

    /// Every budget zero: reads and writes return after one attempt.
    pub fn non_blocking() -> Self {
        Self::simple(0)
    }

    pub fn with_inter_byte(mut self, inter_byte: InterByte) -> Self {
        self.inter_byte = inter_byte;
        self
    }

    /// Overall budget for a read of `size` bytes.
    pub fn read_budget(&self, size: usize) -> Duration {
        budget(self.read_constant_ms, self.read_multiplier_ms, size)
    }

    /// Overall budget for a write of `size` bytes.
    pub fn write_budget(&self, size: usize) -> Duration {
        budget(self.write_constant_ms, self.write_multiplier_ms, size)
    }
}

fn budget(constant_ms: u32, multiplier_ms: u32, size: usize) -> Duration {
    let per_byte = u64::from(multiplier_ms).saturating_mul(size as u64);
    Duration::from_millis(u64::from(constant_ms).saturating_add(per_byte))
}

/// A point in time computed once at the start of a call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Self {
        let now = Instant::now();
        // checked_add only fails for absurd budgets; clamp to "far away"
        let at = now
            .checked_add(budget)
            .unwrap_or_else(|| now + Duration::from_secs(u64::from(u32::MAX)));
        Self { at }
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}
