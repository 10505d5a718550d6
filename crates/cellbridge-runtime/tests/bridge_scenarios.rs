//! Scenario tests for the cell/stream bridge.
//!
//! Covers the observable contract end to end:
//!
//! 1. Initial sync: the stream starts at the cell's value.
//! 2. Forward propagation: cell writes reach stream subscribers in order.
//! 3. Reverse propagation: stream values are readable from the cell at once.
//! 4. No echo: a value crosses the bridge exactly once.
//! 5. Idempotent disposal.
//! 6. Lifetime: owned bridges are reclaimed, attached ones are not unless
//!    disposed.
//! 7. The `[1, 2, 3]` round trip.
//! 8. Nested writes against the propagation direction are dropped as echoes.

use std::cell::RefCell;
use std::rc::Rc;

use cellbridge_runtime::{
    BridgeConfig, CellBridgeExt, Disposable, HotStream, ObservableCell, PropagationState,
    Retention, StreamSubscription,
};

fn recording_sink<T: Clone + 'static>(
    stream: &HotStream<T>,
) -> (Rc<RefCell<Vec<T>>>, StreamSubscription<T>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = Rc::clone(&log);
    let sub = stream.sink(move |v: &T| log_clone.borrow_mut().push(v.clone()));
    (log, sub)
}

fn recording_observer<T: Clone + 'static>(
    cell: &ObservableCell<T>,
) -> (Rc<RefCell<Vec<T>>>, cellbridge_runtime::Subscription) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = Rc::clone(&log);
    let sub = cell.observe(move |v: &T| log_clone.borrow_mut().push(v.clone()));
    (log, sub)
}

// ── Initial sync ────────────────────────────────────────────────────────

#[test]
fn initial_sync() {
    for retention in [Retention::Owned, Retention::Attached] {
        let cell = ObservableCell::new(17);
        let bridged = cell.stream_with(&BridgeConfig::new().with_retention(retention));
        assert_eq!(bridged.value(), 17);
        assert_eq!(cell.version(), 0, "attaching must not write the cell");
        bridged.complete();
    }
}

// ── Forward propagation ─────────────────────────────────────────────────

#[test]
fn forward_propagation_in_order() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();
    let (log, _sub) = recording_sink(&bridged);

    for v in 1..=5 {
        cell.set(v);
        assert_eq!(bridged.value(), v, "delivery is synchronous");
    }
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4, 5]);
}

// ── Reverse propagation ─────────────────────────────────────────────────

#[test]
fn reverse_propagation_is_synchronous() {
    let cell = ObservableCell::new("a".to_string());
    let bridged = cell.stream();

    for v in ["b", "c", "d"] {
        bridged.send(v.to_string());
        assert_eq!(cell.get(), v);
    }
}

// ── No echo ─────────────────────────────────────────────────────────────

#[test]
fn stream_push_is_delivered_once() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();
    let (stream_log, _s) = recording_sink(&bridged);
    let (cell_log, _c) = recording_observer(&cell);

    bridged.send(9);
    assert_eq!(*stream_log.borrow(), vec![0, 9]);
    assert_eq!(*cell_log.borrow(), vec![9]);
    assert_eq!(cell.version(), 1);
}

#[test]
fn cell_write_is_delivered_once() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();
    let (stream_log, _s) = recording_sink(&bridged);
    let (cell_log, _c) = recording_observer(&cell);

    cell.set(4);
    assert_eq!(*stream_log.borrow(), vec![0, 4]);
    assert_eq!(*cell_log.borrow(), vec![4]);
    assert_eq!(cell.version(), 1);
}

#[test]
fn equal_values_cross_once_each() {
    let cell = ObservableCell::new(1);
    let bridged = cell.stream();
    let (stream_log, _s) = recording_sink(&bridged);
    let (cell_log, _c) = recording_observer(&cell);

    cell.set(1);
    cell.set(1);
    bridged.send(1);
    bridged.send(1);

    assert_eq!(*stream_log.borrow(), vec![1, 1, 1, 1, 1]);
    assert_eq!(*cell_log.borrow(), vec![1, 1, 1, 1]);
}

#[test]
fn two_bridges_on_one_cell_stay_in_sync() {
    let cell = ObservableCell::new(0);
    let left = cell.stream();
    let right = cell.stream();
    let (right_log, _s) = recording_sink(&right);

    left.send(5);
    assert_eq!(cell.get(), 5);
    assert_eq!(right.value(), 5);
    assert_eq!(*right_log.borrow(), vec![0, 5]);
}

// ── Disposal ────────────────────────────────────────────────────────────

#[test]
fn disposal_is_idempotent() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();
    let (log, _s) = recording_sink(&bridged);

    bridged.dispose();
    let after_first = (cell.observer_count(), bridged.subscriber_count());
    bridged.dispose();
    assert!(bridged.is_disposed());
    assert_eq!(
        (cell.observer_count(), bridged.subscriber_count()),
        after_first
    );

    cell.set(1);
    bridged.send(2);
    assert_eq!(cell.get(), 1);
    assert_eq!(*log.borrow(), vec![0, 2]);
}

#[test]
fn drop_stops_synchronisation() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();
    let stream = bridged.stream().clone();
    drop(bridged);

    cell.set(1);
    assert_eq!(stream.value(), 0);
    stream.send(2);
    assert_eq!(cell.get(), 1);
}

#[test]
fn dispose_from_stream_subscriber_blocks_reverse_write() {
    let cell = ObservableCell::new(0);
    let bridged = Rc::new(cell.stream());

    // Subscribed before the bridge disposes; disposing during a send must
    // stop every later crossing.
    let handle = Rc::downgrade(&bridged);
    let _killer = bridged.sink(move |v: &i32| {
        if *v == 7 {
            if let Some(bridged) = handle.upgrade() {
                bridged.dispose();
            }
        }
    });

    cell.set(7);
    assert!(bridged.is_disposed());
    bridged.send(8);
    assert_eq!(cell.get(), 7);
}

// ── Lifetime ────────────────────────────────────────────────────────────

#[test]
fn owned_stream_is_reclaimed() {
    let cell = ObservableCell::new(1);
    let bridged = cell.stream();
    let weak = bridged.downgrade();
    drop(bridged);

    assert!(weak.is_dropped());
    cell.set(2);
    assert_eq!(cell.observer_count(), 0);
}

/// Regression for the self-retaining attached subscription: after the last
/// external handle is dropped the stream should be unreachable, but the
/// subscription it owns keeps it alive.
#[test]
#[should_panic(expected = "stream still reachable")]
fn attached_stream_is_reclaimed() {
    let cell = ObservableCell::new(1);
    let stream = cell.attached_stream();
    let weak = stream.downgrade();
    drop(stream);

    assert!(weak.is_dropped(), "stream still reachable after last owner dropped it");
}

#[test]
fn attached_stream_stays_bridged_without_owner() {
    let cell = ObservableCell::new(1);
    let weak = cell.attached_stream().downgrade();

    cell.set(2);
    let stream = weak.upgrade().expect("attached stream is retained");
    assert_eq!(stream.value(), 2);

    stream.send(3);
    assert_eq!(cell.get(), 3);
}

#[test]
fn completion_releases_attached_stream() {
    let cell = ObservableCell::new(1);
    let weak = cell.attached_stream().downgrade();

    weak.upgrade().expect("attached stream is retained").complete();
    assert!(weak.is_dropped());

    cell.set(2);
    assert_eq!(cell.observer_count(), 0);
}

#[test]
fn disposed_attached_stream_is_reclaimed() {
    let cell = ObservableCell::new(1);
    let bridged = cell.stream_with(&BridgeConfig::attached());
    assert_eq!(bridged.subscriber_count(), 1);

    bridged.dispose();
    bridged.dispose();
    assert_eq!(bridged.subscriber_count(), 0);
    assert!(!bridged.is_completed());

    let weak = bridged.downgrade();
    drop(bridged);
    assert!(weak.is_dropped());
    cell.set(2);
    assert_eq!(cell.observer_count(), 0);
}

// ── Nested writes ───────────────────────────────────────────────────────

#[test]
fn cell_observer_write_during_backward_is_dropped() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();

    let clamp_cell = cell.clone();
    let _clamp = cell.observe(move |v: &i32| {
        if *v > 10 {
            clamp_cell.set(10);
        }
    });

    bridged.send(50);
    assert_eq!(cell.get(), 10);
    assert_eq!(bridged.value(), 50, "clamp never reaches the stream");
    assert_eq!(bridged.state(), PropagationState::Idle);

    // The next ordinary write brings both sides back together.
    cell.set(3);
    assert_eq!(bridged.value(), 3);
}

#[test]
fn stream_subscriber_send_during_forward_is_dropped() {
    let cell = ObservableCell::new(0);
    let bridged = cell.stream();

    let clamp_stream = bridged.stream().clone();
    let _clamp = bridged.sink(move |v: &i32| {
        if *v > 10 {
            clamp_stream.send(10);
        }
    });

    cell.set(50);
    assert_eq!(cell.get(), 50, "clamp never reaches the cell");
    assert_eq!(bridged.value(), 10);
    assert_eq!(bridged.state(), PropagationState::Idle);

    bridged.send(4);
    assert_eq!(cell.get(), 4);
}

// ── End to end ──────────────────────────────────────────────────────────

#[test]
fn round_trip_one_two_three() {
    for retention in [Retention::Owned, Retention::Attached] {
        let cell = ObservableCell::new(1);
        let bridged = cell.stream_with(&BridgeConfig::new().with_retention(retention));
        assert_eq!(bridged.value(), 1);

        let (values, _sub) = recording_sink(&bridged);
        assert_eq!(*values.borrow(), vec![1]);

        cell.set(2);
        assert_eq!(bridged.value(), 2);
        assert_eq!(*values.borrow(), vec![1, 2]);

        bridged.send(3);
        assert_eq!(cell.get(), 3);
        assert_eq!(*values.borrow(), vec![1, 2, 3]);

        bridged.complete();
    }
}

#[test]
fn round_trip_under_fmt_subscriber() {
    use tracing_subscriber::EnvFilter;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("cellbridge_runtime=trace"))
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let cell = ObservableCell::new(1);
        let bridged = cell.stream_with(&BridgeConfig::new().with_label("round-trip"));
        let (values, _sub) = recording_sink(&bridged);
        cell.set(2);
        bridged.send(3);
        assert_eq!(*values.borrow(), vec![1, 2, 3]);
    });
}
