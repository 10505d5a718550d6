#![forbid(unsafe_code)]

//! Cancellation handles.
//!
//! # Design
//!
//! A [`Disposable`] releases some resource exactly once. Every handle in this
//! module is idempotent: the first `dispose()` does the work, later calls are
//! no-ops. Handles use interior mutability so they can be shared behind an
//! `Rc` and disposed from inside callbacks.
//!
//! # Invariants
//!
//! 1. `dispose()` runs the underlying release at most once.
//! 2. `is_disposed()` is true from the moment `dispose()` is entered.
//! 3. Adding a child to an already disposed [`CompositeDisposable`] disposes
//!    the child immediately.
//! 4. Children of a composite are disposed in insertion order.
//!
//! # Failure Modes
//!
//! - **Re-entrant dispose**: a child that disposes its own parent composite
//!   while being disposed is harmless; the parent is already marked disposed
//!   and its child list has been taken out before any child runs.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A handle that releases a resource when disposed.
pub trait Disposable {
    /// Release the resource. Idempotent.
    fn dispose(&self);

    /// Whether `dispose()` has been called.
    fn is_disposed(&self) -> bool;
}

impl<D: Disposable + ?Sized> Disposable for Rc<D> {
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

// ---------------------------------------------------------------------------
// ActionDisposable
// ---------------------------------------------------------------------------

/// Runs a closure the first time it is disposed.
pub struct ActionDisposable {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl ActionDisposable {
    /// Wrap `action` so it runs on the first `dispose()`.
    #[must_use]
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }
}

impl Disposable for ActionDisposable {
    fn dispose(&self) {
        // Take the action before running it so a re-entrant dispose sees None.
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl fmt::Debug for ActionDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDisposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CompositeDisposable
// ---------------------------------------------------------------------------

/// A set of disposables released together.
#[derive(Default)]
pub struct CompositeDisposable {
    children: RefCell<Vec<Box<dyn Disposable>>>,
    disposed: Cell<bool>,
}

impl CompositeDisposable {
    /// Create an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child. If the composite is already disposed, the child is
    /// disposed immediately instead of being stored.
    pub fn add(&self, child: impl Disposable + 'static) {
        if self.disposed.get() {
            child.dispose();
            return;
        }
        self.children.borrow_mut().push(Box::new(child));
    }

    /// Add a closure to run on disposal.
    pub fn add_action(&self, action: impl FnOnce() + 'static) {
        self.add(ActionDisposable::new(action));
    }

    /// Number of children currently held (zero after disposal).
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    /// Whether no children are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let children = std::mem::take(&mut *self.children.borrow_mut());
        #[cfg(feature = "tracing")]
        tracing::trace!(children = children.len(), "composite disposed");
        for child in &children {
            child.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDisposable")
            .field("children", &self.len())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ScopedDisposable
// ---------------------------------------------------------------------------

/// RAII guard that disposes the wrapped handle when dropped.
pub struct ScopedDisposable<D: Disposable> {
    inner: D,
}

impl<D: Disposable> ScopedDisposable<D> {
    /// Take ownership of `inner`, disposing it on drop.
    #[must_use]
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped handle.
    #[must_use]
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Disposable> Disposable for ScopedDisposable<D> {
    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<D: Disposable> Drop for ScopedDisposable<D> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<D: Disposable> fmt::Debug for ScopedDisposable<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedDisposable")
            .field("disposed", &self.inner.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
