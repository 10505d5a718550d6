#![forbid(unsafe_code)]

//! Mutable observable cell with synchronous change notification.
//!
//! # Design
//!
//! [`ObservableCell<T>`] wraps a value of type `T` in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). Every write through [`set()`](ObservableCell::set)
//! stores the value and notifies all live observers, in registration order,
//! before returning. Writes are not filtered by equality: two successive
//! writes of the same value notify twice. Use
//! [`set_if_changed()`](ObservableCell::set_if_changed) or
//! [`update()`](ObservableCell::update) for `PartialEq`-filtered writes.
//!
//! # Performance
//!
//! | Operation     | Complexity                 |
//! |---------------|----------------------------|
//! | `get()`       | O(1) + clone               |
//! | `set()`       | O(S) where S = observers   |
//! | `observe()`   | O(1) amortized             |
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: Calling `set()` from within an observer callback is
//!   allowed. The interior borrow is released before callbacks run, so the
//!   nested write notifies every observer before the outer loop continues.
//!   Unbounded mutual recursion between observers is the caller's problem;
//!   the bridge bounds it with its propagation state.
//! - **Observer leak**: If [`Subscription`] handles are stored indefinitely
//!   without being dropped, callbacks accumulate. Dead entries are pruned
//!   lazily during notification.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use cellbridge_core::Disposable;

/// One registered observer. The cell holds it weakly; the [`Subscription`]
/// holds it strongly.
struct ObserverEntry<T> {
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

/// Type-erased view of an [`ObserverEntry`] so [`Subscription`] need not be
/// generic over `T`.
trait ObserverSlot {
    fn deactivate(&self);
    fn is_active(&self) -> bool;
}

impl<T> ObserverSlot for ObserverEntry<T> {
    fn deactivate(&self) {
        self.active.set(false);
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Shared interior for [`ObservableCell<T>`].
struct CellInner<T> {
    value: T,
    version: u64,
    /// Observers stored as weak references. Dead entries are pruned on notify.
    observers: Vec<Weak<ObserverEntry<T>>>,
}

/// A shared mutable value that notifies observers on every write.
///
/// Cloning an `ObservableCell` creates a new handle to the **same** inner
/// state: both handles see the same value and share observers.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each write that notifies.
/// 2. Observers are notified in registration order.
/// 3. A disposed or dropped [`Subscription`] is never called again, even if
///    it is disposed in the middle of a notification cycle.
pub struct ObservableCell<T> {
    inner: Rc<RefCell<CellInner<T>>>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObservableCell")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("observer_count", &inner.observers.len())
            .finish()
    }
}

impl<T: Clone + 'static> ObservableCell<T> {
    /// Create a new cell with the given initial value.
    ///
    /// The initial version is 0 and no observers are registered.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CellInner {
                value,
                version: 0,
                observers: Vec::new(),
            })),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Write a new value and notify every live observer before returning.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.value = value.clone();
            inner.version += 1;
        }
        self.notify(&value);
    }

    /// Observe future writes. The current value is **not** delivered.
    ///
    /// Returns a [`Subscription`] handle. Dropping or disposing it stops
    /// delivery immediately.
    pub fn observe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let entry: Rc<ObserverEntry<T>> = Rc::new(ObserverEntry {
            active: Cell::new(true),
            callback: Box::new(callback),
        });
        self.inner
            .borrow_mut()
            .observers
            .push(Rc::downgrade(&entry));
        let slot: Rc<dyn ObserverSlot> = entry;
        Subscription {
            slot: RefCell::new(Some(slot)),
        }
    }

    /// Deliver the current value to `callback` immediately, then observe
    /// future writes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let current = self.get();
        callback(&current);
        self.observe(callback)
    }

    /// Number of writes that notified observers. Useful for dirty-checking.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of currently registered observers (including dead ones not
    /// yet pruned).
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Notify live observers with `value` and prune dead ones.
    fn notify(&self, value: &T) {
        // Collect live entries first (to avoid holding the borrow during calls).
        let entries: Vec<Rc<ObserverEntry<T>>> = {
            let mut inner = self.inner.borrow_mut();
            inner
                .observers
                .retain(|w| w.upgrade().is_some_and(|e| e.active.get()));
            inner.observers.iter().filter_map(Weak::upgrade).collect()
        };

        for entry in &entries {
            // An earlier callback may have disposed this one.
            if entry.active.get() {
                (entry.callback)(value);
            }
        }
    }
}

impl<T: Clone + PartialEq + 'static> ObservableCell<T> {
    /// Write `value` only if it differs from the current value (by
    /// `PartialEq`). Returns whether a write happened.
    pub fn set_if_changed(&self, value: T) -> bool {
        if self.inner.borrow().value == value {
            return false;
        }
        self.set(value);
        true
    }

    /// Modify the value in place via a closure. Observers are notified only
    /// if the value changes (compared against a snapshot).
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value != old {
                inner.version += 1;
                Some(inner.value.clone())
            } else {
                None
            }
        };
        if let Some(value) = changed {
            self.notify(&value);
        }
    }
}

/// Handle for an observer registered on an [`ObservableCell`].
///
/// The handle owns the only strong reference to the observer callback.
/// Dropping it, or calling [`Disposable::dispose`], deactivates the callback
/// at once; the cell's weak entry is pruned on the next notification.
pub struct Subscription {
    slot: RefCell<Option<Rc<dyn ObserverSlot>>>,
}

impl Subscription {
    /// Whether the callback can still be called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot.borrow().as_ref().is_some_and(|s| s.is_active())
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        let slot = self.slot.borrow_mut().take();
        if let Some(slot) = slot {
            slot.deactivate();
        }
    }

    fn is_disposed(&self) -> bool {
        !self.is_active()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
