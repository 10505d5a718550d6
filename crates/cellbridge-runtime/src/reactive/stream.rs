#![forbid(unsafe_code)]

//! Hot stream that retains its latest value.
//!
//! # Design
//!
//! [`HotStream<T>`] is a current-value subject: it always holds a value, new
//! subscribers receive that value immediately, and every later
//! [`send()`](HotStream::send) is delivered synchronously to all subscribers
//! before returning. [`complete()`](HotStream::complete) is terminal.
//!
//! Each subscriber entry keeps its observer alive and tracks the observer's
//! outstanding [`Demand`]. Entries come in two flavours:
//!
//! - **Owned** ([`subscribe()`](HotStream::subscribe),
//!   [`sink()`](HotStream::sink)): the caller receives a
//!   [`StreamSubscription`] and cancels by dropping or disposing it. The
//!   entry does not keep the stream alive.
//! - **Attached** ([`attach()`](HotStream::attach)): no handle is returned.
//!   The entry holds a strong handle back to the stream, so the stream and
//!   the observer stay alive together until the stream completes, even when
//!   every external handle has been dropped.
//!
//! # Invariants
//!
//! 1. A subscriber receives the current value first, then every later value,
//!    in send order, while its demand is not exhausted.
//! 2. After `complete()`, no value is delivered and `receive_completion()` has
//!    been called exactly once on every subscriber that was still active.
//! 3. A cancelled subscription is never delivered to again, including for the
//!    remainder of a send that is in progress.
//!
//! # Failure Modes
//!
//! - **Send after completion**: ignored by `send()`, reported by `try_send()`
//!   as [`StreamClosed`]. The retained value does not change.
//! - **Attached observer never completes**: the stream and its attached
//!   observers are kept alive indefinitely, unless the entry is detached
//!   from within the crate.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use cellbridge_core::{Demand, Disposable, StreamClosed};
use tracing::trace;

/// Receiver side of a [`HotStream`] subscription.
pub trait StreamObserver<T> {
    /// Demand granted when the subscription is established.
    fn initial_demand(&self) -> Demand {
        Demand::Unlimited
    }

    /// Handle one value. The returned demand is added to what is outstanding.
    fn receive(&self, value: &T) -> Demand;

    /// The stream completed. Called at most once.
    fn receive_completion(&self) {}
}

struct SubscriberEntry<T> {
    id: u64,
    observer: Rc<dyn StreamObserver<T>>,
    demand: Cell<Demand>,
    active: Cell<bool>,
    /// Set for attached entries: keeps the stream alive until completion.
    _anchor: Option<HotStream<T>>,
}

impl<T> SubscriberEntry<T> {
    fn deliver(&self, value: &T) {
        if !self.active.get() || self.demand.get().is_exhausted() {
            return;
        }
        self.demand.set(self.demand.get().consume_one());
        let extra = self.observer.receive(value);
        self.demand.set(self.demand.get() + extra);
    }
}

struct StreamInner<T> {
    value: T,
    completed: bool,
    next_id: u64,
    subscribers: Vec<Rc<SubscriberEntry<T>>>,
}

/// A push stream with a retained current value.
///
/// Cloning a `HotStream` creates a new handle to the **same** stream.
pub struct HotStream<T> {
    inner: Rc<RefCell<StreamInner<T>>>,
}

impl<T> Clone for HotStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HotStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("HotStream")
            .field("value", &inner.value)
            .field("completed", &inner.completed)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + 'static> HotStream<T> {
    /// Create a stream holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StreamInner {
                value,
                completed: false,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Latest value sent (or the initial value).
    #[must_use]
    pub fn value(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Whether `complete()` has been called.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }

    /// Number of live subscribers, owned and attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|e| e.active.get())
            .count()
    }

    /// Non-owning handle to this stream.
    #[must_use]
    pub fn downgrade(&self) -> WeakHotStream<T> {
        WeakHotStream {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Send a value. Ignored once the stream has completed.
    pub fn send(&self, value: T) {
        let _ = self.try_send(value);
    }

    /// Send a value, reporting [`StreamClosed`] if the stream has completed.
    pub fn try_send(&self, value: T) -> Result<(), StreamClosed> {
        let entries: Vec<Rc<SubscriberEntry<T>>> = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return Err(StreamClosed);
            }
            inner.value = value.clone();
            inner.subscribers.clone()
        };
        for entry in &entries {
            entry.deliver(&value);
        }
        Ok(())
    }

    /// Complete the stream. Idempotent.
    ///
    /// Every registered subscriber is deactivated and receives
    /// `receive_completion()`. All entries are then released, which also
    /// releases the strong handles held by attached entries.
    pub fn complete(&self) {
        let entries = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return;
            }
            inner.completed = true;
            std::mem::take(&mut inner.subscribers)
        };
        trace!(subscribers = entries.len(), "stream completed");
        for entry in &entries {
            if entry.active.replace(false) {
                entry.observer.receive_completion();
            }
        }
    }

    /// Subscribe `observer`. The current value is delivered before this
    /// returns. If the stream has already completed, the observer receives
    /// only `receive_completion()` and the returned handle is inert.
    pub fn subscribe(&self, observer: Rc<dyn StreamObserver<T>>) -> StreamSubscription<T> {
        match self.register(observer, None) {
            Some(entry) => StreamSubscription {
                stream: self.downgrade(),
                entry: RefCell::new(Some(entry)),
            },
            None => StreamSubscription::inert(),
        }
    }

    /// Subscribe a closure that accepts every value.
    pub fn sink(&self, on_value: impl Fn(&T) + 'static) -> StreamSubscription<T> {
        self.subscribe(Rc::new(Sink(on_value)))
    }

    /// Subscribe `observer` without returning a handle.
    ///
    /// The subscription keeps this stream alive until it completes. Use this
    /// only when the stream's lifetime is bounded by completion.
    pub fn attach(&self, observer: Rc<dyn StreamObserver<T>>) {
        let _ = self.attach_keyed(observer);
    }

    /// Like [`attach()`](Self::attach), returning the entry id for
    /// [`detach()`](Self::detach). `None` if the stream has completed.
    pub(crate) fn attach_keyed(&self, observer: Rc<dyn StreamObserver<T>>) -> Option<u64> {
        self.register(observer, Some(self.clone())).map(|entry| entry.id)
    }

    fn register(
        &self,
        observer: Rc<dyn StreamObserver<T>>,
        anchor: Option<HotStream<T>>,
    ) -> Option<Rc<SubscriberEntry<T>>> {
        let (entry, current) = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                drop(inner);
                observer.receive_completion();
                return None;
            }
            let id = inner.next_id;
            inner.next_id += 1;
            let entry = Rc::new(SubscriberEntry {
                id,
                demand: Cell::new(observer.initial_demand()),
                observer,
                active: Cell::new(true),
                _anchor: anchor,
            });
            inner.subscribers.push(Rc::clone(&entry));
            (entry, inner.value.clone())
        };
        entry.deliver(&current);
        Some(entry)
    }
}

impl<T> HotStream<T> {
    /// Drop an attached entry before completion, releasing its hold on the
    /// stream. Unknown ids are ignored.
    pub(crate) fn detach(&self, id: u64) {
        self.remove(id);
    }

    fn remove(&self, id: u64) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let position = inner.subscribers.iter().position(|e| e.id == id);
            position.map(|i| inner.subscribers.remove(i))
        };
        // Dropped outside the borrow: the entry may own the last handle to
        // its observer.
        if let Some(entry) = removed {
            entry.active.set(false);
        }
    }
}

/// Non-owning handle to a [`HotStream`].
pub struct WeakHotStream<T> {
    inner: Weak<RefCell<StreamInner<T>>>,
}

impl<T> Clone for WeakHotStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakHotStream<T> {
    /// A handle that never upgrades.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Weak::new() }
    }

    /// Recover a strong handle if the stream is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<HotStream<T>> {
        self.inner.upgrade().map(|inner| HotStream { inner })
    }

    /// Whether the stream has been dropped.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl<T> Default for WeakHotStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WeakHotStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHotStream")
            .field("dropped", &self.is_dropped())
            .finish()
    }
}

/// Handle for an owned [`HotStream`] subscription.
///
/// Holds the stream weakly. Dropping the handle cancels the subscription.
pub struct StreamSubscription<T> {
    stream: WeakHotStream<T>,
    entry: RefCell<Option<Rc<SubscriberEntry<T>>>>,
}

impl<T> StreamSubscription<T> {
    fn inert() -> Self {
        Self {
            stream: WeakHotStream::new(),
            entry: RefCell::new(None),
        }
    }

    /// Whether values can still be delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.entry
            .borrow()
            .as_ref()
            .is_some_and(|e| e.active.get())
    }

    /// Grant additional demand.
    pub fn request(&self, demand: Demand) {
        if let Some(entry) = self.entry.borrow().as_ref() {
            entry.demand.set(entry.demand.get() + demand);
        }
    }

    /// Cancel the subscription. Idempotent; takes effect immediately, even
    /// in the middle of a send.
    pub fn cancel(&self) {
        let entry = self.entry.borrow_mut().take();
        if let Some(entry) = entry {
            entry.active.set(false);
            if let Some(stream) = self.stream.upgrade() {
                stream.remove(entry.id);
            }
        }
    }
}

impl<T> Disposable for StreamSubscription<T> {
    fn dispose(&self) {
        self.cancel();
    }

    fn is_disposed(&self) -> bool {
        !self.is_active()
    }
}

impl<T> Drop for StreamSubscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> fmt::Debug for StreamSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Closure observer used by [`HotStream::sink`].
struct Sink<F>(F);

impl<T, F: Fn(&T)> StreamObserver<T> for Sink<F> {
    fn receive(&self, value: &T) -> Demand {
        (self.0)(value);
        Demand::NONE
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
