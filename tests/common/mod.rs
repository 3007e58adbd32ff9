//! Shared test utilities for serial-line integration tests.
//!
//! This module provides common test infrastructure including:
//! - Mock-backed ports with pre-programmed input
//! - Timing assertions for deadline checks

#![allow(dead_code)]

use serial_line::port::{MockDriver, Serial, Timeout};
use std::time::{Duration, Instant};

/// Open a mock-backed port named `MOCK0` at 9600 baud.
///
/// Returns the driver as well so the test can script input and inspect output.
pub fn mock_serial(timeout: Timeout) -> (MockDriver, Serial) {
    let mock = MockDriver::new();
    let serial = serial_line::new("MOCK0", 9600)
        .timeout(timeout)
        .driver(mock.clone())
        .build()
        .expect("mock port should open");
    (mock, serial)
}

/// Same as [`mock_serial`] with `responses` already queued for reading.
pub fn mock_serial_with_input(timeout: Timeout, responses: &[&[u8]]) -> (MockDriver, Serial) {
    let (mock, serial) = mock_serial(timeout);
    for response in responses {
        mock.push_read(response);
    }
    (mock, serial)
}

/// Run `f`, returning its result and how long it took.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let started = Instant::now();
    let value = f();
    (value, started.elapsed())
}

/// Assert `elapsed` lies in `[min, max)`, with a readable failure message.
pub fn assert_elapsed_between(elapsed: Duration, min: Duration, max: Duration) {
    assert!(
        elapsed >= min && elapsed < max,
        "expected elapsed time in [{min:?}, {max:?}), got {elapsed:?}"
    );
}
