#![forbid(unsafe_code)]

//! Runtime: observable cells, hot streams, and the bridge between them.
//!
//! # Role in cellbridge
//! `cellbridge-runtime` owns the reactive primitives. It depends on
//! `cellbridge-core` for cancellation handles and demand, and adds the two
//! value holders plus the adapter that keeps them in sync.
//!
//! # Primary responsibilities
//! - **ObservableCell**: mutable value with synchronous change notification.
//! - **HotStream**: current-value subject with completion and demand.
//! - **BridgedStream**: bidirectional, echo-free synchronisation with an
//!   explicit retention policy.
//! - **BridgeConfig**: env-overridable bridge configuration.
//!
//! # Example
//!
//! ```
//! use cellbridge_runtime::{CellBridgeExt, ObservableCell};
//!
//! let volume = ObservableCell::new(1);
//! let stream = volume.stream();
//!
//! volume.set(2);
//! assert_eq!(stream.value(), 2);
//!
//! stream.send(3);
//! assert_eq!(volume.get(), 3);
//! ```

pub mod config;
pub mod reactive;

pub use cellbridge_core::{Demand, Disposable, Never, StreamClosed};
pub use config::{BridgeConfig, BridgeConfigError, BridgeConfigParse, Retention};
pub use reactive::{
    BridgedStream, CellBridgeExt, HotStream, ObservableCell, PropagationState, StreamObserver,
    StreamSubscription, Subscription, WeakHotStream,
};
