//! Deadline behaviour of reads and writes.

mod common;

use common::{assert_elapsed_between, mock_serial, mock_serial_with_input, timed};
use proptest::prelude::*;
use serial_line::{InterByte, Timeout};
use std::time::Duration;

const MS: Duration = Duration::from_millis(1);

#[test]
fn test_silent_line_read_takes_the_constant() {
    let (_mock, serial) = mock_serial(Timeout::simple(1000));

    let (n, elapsed) = timed(|| serial.read(&mut [0u8; 10]).unwrap());
    assert_eq!(n, 0);
    assert_elapsed_between(elapsed, 1000 * MS, 1500 * MS);
}

#[test]
fn test_multiplier_extends_the_budget() {
    let timeout = Timeout {
        inter_byte: InterByte::Disabled,
        read_constant_ms: 50,
        read_multiplier_ms: 10,
        write_constant_ms: 0,
        write_multiplier_ms: 0,
    };
    let (_mock, serial) = mock_serial(timeout);

    // 50 + 10 * 10
    let (n, elapsed) = timed(|| serial.read(&mut [0u8; 10]).unwrap());
    assert_eq!(n, 0);
    assert_elapsed_between(elapsed, 150 * MS, 600 * MS);
}

#[test]
fn test_slow_sender_within_budget_is_fully_read() {
    let (mock, serial) = mock_serial(Timeout::simple(1000));
    mock.push_read_after(30 * MS, b"ab");
    mock.push_read_after(60 * MS, b"cd");

    let (bytes, elapsed) = timed(|| serial.read_to_vec(4).unwrap());
    assert_eq!(bytes, b"abcd");
    assert!(elapsed < 500 * MS, "took {elapsed:?}");
}

#[test]
fn test_inter_byte_gap_cuts_read_short() {
    let timeout = Timeout::simple(2000).with_inter_byte(InterByte::Finite(40));
    let (mock, serial) = mock_serial_with_input(timeout, &[b"first"]);
    mock.push_read_after(500 * MS, b"second");

    let (bytes, elapsed) = timed(|| serial.read_to_vec(64).unwrap());
    assert_eq!(bytes, b"first");
    assert_elapsed_between(elapsed, 40 * MS, 400 * MS);
}

#[test]
fn test_max_inter_byte_value_is_disabled() {
    let timeout = Timeout::simple(200).with_inter_byte(InterByte::from_millis(Timeout::MAX));
    assert_eq!(timeout.inter_byte, InterByte::Disabled);

    let (mock, serial) = mock_serial_with_input(timeout, &[b"a"]);
    mock.push_read_after(100 * MS, b"b");
    assert_eq!(serial.read_to_vec(3).unwrap(), b"ab");
}

#[test]
fn test_zero_budget_polls() {
    let (mock, serial) = mock_serial(Timeout::non_blocking());
    mock.push_read_after(50 * MS, b"late");

    let (n, elapsed) = timed(|| serial.read(&mut [0u8; 4]).unwrap());
    assert_eq!(n, 0);
    assert!(elapsed < 50 * MS, "took {elapsed:?}");
}

#[test]
fn test_write_deadline_yields_partial_count() {
    let timeout = Timeout {
        write_constant_ms: 80,
        ..Timeout::simple(0)
    };
    let (mock, serial) = mock_serial(timeout);
    mock.set_write_capacity(Some(2));

    let (n, elapsed) = timed(|| serial.write(b"hello").unwrap());
    assert_eq!(n, 2);
    assert_eq!(mock.written(), b"he");
    assert_elapsed_between(elapsed, 80 * MS, 600 * MS);
}

#[test]
fn test_timeout_change_applies_to_next_read() {
    let (_mock, serial) = mock_serial(Timeout::simple(1000));
    serial.set_timeout(Timeout::simple(30)).unwrap();

    let (_, elapsed) = timed(|| serial.read(&mut [0u8; 1]).unwrap());
    assert!(elapsed < 500 * MS, "took {elapsed:?}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn read_never_exceeds_request(
        queued in proptest::collection::vec(any::<u8>(), 0..64),
        size in 0usize..96,
    ) {
        let (_mock, serial) = mock_serial_with_input(Timeout::non_blocking(), &[queued.as_slice()]);
        let mut buf = vec![0u8; size];
        let n = serial.read(&mut buf).unwrap();

        prop_assert!(n <= size);
        prop_assert_eq!(n, size.min(queued.len()));
        prop_assert_eq!(&buf[..n], &queued[..n]);
    }

    #[test]
    fn written_bytes_match_prefix(
        data in proptest::collection::vec(any::<u8>(), 1..64),
        capacity in 0usize..80,
    ) {
        let (mock, serial) = mock_serial(Timeout::non_blocking());
        mock.set_write_capacity(Some(capacity));

        let n = serial.write(&data).unwrap();
        prop_assert_eq!(n, capacity.min(data.len()));
        prop_assert_eq!(mock.written(), data[..n].to_vec());
    }
}
