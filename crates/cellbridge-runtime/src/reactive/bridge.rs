#![forbid(unsafe_code)]

//! Bidirectional bridge between an [`ObservableCell`] and a [`HotStream`].
//!
//! # Design
//!
//! A bridge keeps a cell and a current-value stream in sync:
//!
//! - **Forward** (cell → stream): the bridge observes the cell and sends
//!   every written value into the stream.
//! - **Backward** (stream → cell): the bridge is a [`StreamObserver`] and
//!   writes every received value into the cell, always asking for unlimited
//!   demand.
//!
//! Both directions run synchronously on the caller's stack. A single
//! [`PropagationState`] suppresses echoes: while a forward propagation is in
//! progress, values arriving from the stream are the bridge's own and are
//! ignored, and vice versa. Suppression never compares values, so two
//! successive writes of the same value each cross exactly once.
//!
//! # Ownership
//!
//! ```text
//!   BridgedStream ──► HotStream ──► entry ──► Bridge ──► ObservableCell
//!        │                                      │  ╎
//!        └──────────── StreamSubscription ──────┘  └╌╌► HotStream (weak)
//! ```
//!
//! The bridge owns the cell and only a weak handle to the stream. Who owns
//! the stream subscription is chosen by [`Retention`]:
//!
//! - [`Retention::Owned`]: the caller's [`BridgedStream`] owns it. Dropping
//!   the handle tears the bridge down and frees the stream.
//! - [`Retention::Attached`]: the stream owns it and the subscription holds
//!   the stream. Nothing is reclaimed until the stream completes or the
//!   [`BridgedStream`] is disposed, even after every external handle is
//!   gone.
//!
//! # Invariants
//!
//! 1. Immediately after construction the stream's value equals the cell's.
//! 2. At most one direction propagates at a time; a value never crosses
//!    back in the direction it came from.
//! 3. Once disposal begins, no value crosses in either direction.
//! 4. Completion of the stream disposes the bridge.
//! 5. Disposal releases the stream entry under either retention.
//!
//! # Failure Modes
//!
//! - **Nested write against the propagation direction**: while a direction
//!   is in flight, anything arriving from the other side counts as an echo.
//!   A cell observer that writes the cell during a backward propagation, or
//!   a stream subscriber that sends into the stream during a forward
//!   propagation, is therefore dropped by the bridge, and the cell and stream
//!   keep different values until the next write. Only a stream subscriber
//!   writing the cell during a forward propagation (or a cell observer
//!   sending into the stream during a backward one) crosses the bridge.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use cellbridge_core::{CompositeDisposable, Demand, Disposable};
use tracing::{debug, debug_span, trace, warn};

use super::cell::ObservableCell;
use super::stream::{HotStream, StreamObserver, StreamSubscription, WeakHotStream};
use crate::config::{BridgeConfig, Retention};

/// Which direction of a bridge is currently propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A cell write is being sent into the stream.
    Forward,
    /// A stream value is being written into the cell.
    Backward,
}

/// Restores the previous propagation state on drop, including on unwind.
struct StateGuard<'a> {
    state: &'a Cell<PropagationState>,
    previous: PropagationState,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a Cell<PropagationState>, next: PropagationState) -> Self {
        let previous = state.replace(next);
        Self { state, previous }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state.set(self.previous);
    }
}

struct Bridge<T> {
    cell: ObservableCell<T>,
    stream: WeakHotStream<T>,
    state: Cell<PropagationState>,
    /// Holds the cell observation.
    disposables: CompositeDisposable,
    /// Stream entry id under [`Retention::Attached`].
    attached: Cell<Option<u64>>,
    label: String,
}

impl<T: Clone + 'static> Bridge<T> {
    fn forward(&self, value: &T) {
        if self.disposables.is_disposed() {
            return;
        }
        let _span = debug_span!("bridge", label = %self.label).entered();
        if self.state.get() == PropagationState::Backward {
            trace!("suppressed echo into stream");
            return;
        }
        let Some(stream) = self.stream.upgrade() else {
            debug!("stream dropped; disposing bridge");
            self.dispose();
            return;
        };
        let _guard = StateGuard::enter(&self.state, PropagationState::Forward);
        trace!("cell -> stream");
        stream.send(value.clone());
    }

    fn backward(&self, value: &T) {
        if self.disposables.is_disposed() {
            return;
        }
        let _span = debug_span!("bridge", label = %self.label).entered();
        if self.state.get() == PropagationState::Forward {
            trace!("suppressed echo into cell");
            return;
        }
        let _guard = StateGuard::enter(&self.state, PropagationState::Backward);
        trace!("stream -> cell");
        self.cell.set(value.clone());
    }
}

impl<T> Bridge<T> {
    fn dispose(&self) {
        if !self.disposables.is_disposed() {
            debug!(label = %self.label, "bridge disposed");
        }
        self.disposables.dispose();
        if let Some(id) = self.attached.take() {
            if let Some(stream) = self.stream.upgrade() {
                stream.detach(id);
            }
        }
    }
}

impl<T: Clone + 'static> StreamObserver<T> for Bridge<T> {
    fn receive(&self, value: &T) -> Demand {
        self.backward(value);
        Demand::Unlimited
    }

    fn receive_completion(&self) {
        debug!(label = %self.label, "stream completed");
        self.dispose();
    }
}

/// A stream kept in sync with a cell, plus the handle that owns the bridge.
///
/// Dereferences to the underlying [`HotStream`]. With [`Retention::Owned`],
/// dropping or disposing this handle stops synchronisation in both
/// directions; clones of the stream taken beforehand stay valid but are no
/// longer bridged. With [`Retention::Attached`], dropping the handle leaves
/// the bridge running until the stream completes; `dispose()` still stops it
/// and removes the stream's entry, so the stream is freed with its last
/// handle.
pub struct BridgedStream<T> {
    stream: HotStream<T>,
    subscription: Option<StreamSubscription<T>>,
    bridge: Rc<Bridge<T>>,
    retention: Retention,
}

impl<T: Clone + 'static> BridgedStream<T> {
    /// Bridge `cell` to a new stream initialised with the cell's value.
    pub fn new(cell: &ObservableCell<T>, config: &BridgeConfig) -> Self {
        if let Err(errors) = config.validate() {
            for error in &errors {
                warn!(%error, "invalid bridge config");
            }
        }

        let label = config.label_or_default().to_string();
        let stream = HotStream::new(cell.get());
        let bridge = Rc::new(Bridge {
            cell: cell.clone(),
            stream: stream.downgrade(),
            state: Cell::new(PropagationState::Idle),
            disposables: CompositeDisposable::new(),
            attached: Cell::new(None),
            label,
        });

        let weak_bridge: Weak<Bridge<T>> = Rc::downgrade(&bridge);
        let observation = cell.observe(move |value| {
            if let Some(bridge) = weak_bridge.upgrade() {
                bridge.forward(value);
            }
        });
        bridge.disposables.add(observation);

        // The stream replays its current value on subscribe. That value came
        // from the cell, so unless asked otherwise it is treated as an echo.
        let subscription = {
            let _guard = (!config.write_back_initial)
                .then(|| StateGuard::enter(&bridge.state, PropagationState::Forward));
            let observer: Rc<dyn StreamObserver<T>> = bridge.clone();
            match config.retention {
                Retention::Owned => Some(stream.subscribe(observer)),
                Retention::Attached => {
                    bridge.attached.set(stream.attach_keyed(observer));
                    None
                }
            }
        };

        debug!(
            label = %bridge.label,
            retention = %config.retention,
            "bridge constructed"
        );

        Self {
            stream,
            subscription,
            bridge,
            retention: config.retention,
        }
    }

    /// The bridged stream.
    #[must_use]
    pub fn stream(&self) -> &HotStream<T> {
        &self.stream
    }

    /// The bridged cell.
    #[must_use]
    pub fn cell(&self) -> &ObservableCell<T> {
        &self.bridge.cell
    }
}

impl<T> BridgedStream<T> {
    /// Retention policy the bridge was built with.
    #[must_use]
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Current propagation state of the bridge.
    #[must_use]
    pub fn state(&self) -> PropagationState {
        self.bridge.state.get()
    }
}

impl<T> Deref for BridgedStream<T> {
    type Target = HotStream<T>;

    fn deref(&self) -> &HotStream<T> {
        &self.stream
    }
}

impl<T> Disposable for BridgedStream<T> {
    fn dispose(&self) {
        self.bridge.dispose();
        if let Some(subscription) = &self.subscription {
            subscription.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.bridge.disposables.is_disposed()
    }
}

impl<T> Drop for BridgedStream<T> {
    fn drop(&mut self) {
        if self.retention == Retention::Owned {
            self.dispose();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for BridgedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgedStream")
            .field("stream", &self.stream)
            .field("label", &self.bridge.label)
            .field("retention", &self.retention)
            .field("state", &self.bridge.state.get())
            .field("disposed", &self.bridge.disposables.is_disposed())
            .finish()
    }
}

/// Conversion from an [`ObservableCell`] to a bridged [`HotStream`].
pub trait CellBridgeExt<T> {
    /// Bridge to a new stream with [`Retention::Owned`].
    fn stream(&self) -> BridgedStream<T>;

    /// Bridge to a new stream with an explicit configuration.
    fn stream_with(&self, config: &BridgeConfig) -> BridgedStream<T>;

    /// Bridge with [`Retention::Attached`] and hand back only the stream.
    ///
    /// The stream keeps itself, the bridge, and the cell alive until it
    /// completes. Dropping the returned handle does not reclaim it.
    fn attached_stream(&self) -> HotStream<T>;
}

impl<T: Clone + 'static> CellBridgeExt<T> for ObservableCell<T> {
    fn stream(&self) -> BridgedStream<T> {
        BridgedStream::new(self, &BridgeConfig::default())
    }

    fn stream_with(&self, config: &BridgeConfig) -> BridgedStream<T> {
        BridgedStream::new(self, config)
    }

    fn attached_stream(&self) -> HotStream<T> {
        BridgedStream::new(self, &BridgeConfig::attached())
            .stream
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
