#![forbid(unsafe_code)]

//! Reactive primitives and the bridge between them.
//!
//! - [`ObservableCell`]: a shared mutable value that notifies observers on
//!   every write.
//! - [`HotStream`]: a push stream that retains its latest value and replays it
//!   to new subscribers.
//! - [`BridgedStream`]: a stream kept in sync with a cell in both directions.
//!
//! # Architecture
//!
//! All three use `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Interior borrows are always released before any callback runs, so
//! observers may read and write the value they are observing.
//!
//! # Invariants
//!
//! 1. Observers are notified synchronously, in registration order, before the
//!    write that triggered them returns.
//! 2. A disposed subscription is never called again, even mid-notification.
//! 3. A bridge never echoes a value back in the direction it came from.

pub mod bridge;
pub mod cell;
pub mod stream;

pub use bridge::{BridgedStream, CellBridgeExt, PropagationState};
pub use cell::{ObservableCell, Subscription};
pub use stream::{HotStream, StreamObserver, StreamSubscription, WeakHotStream};
