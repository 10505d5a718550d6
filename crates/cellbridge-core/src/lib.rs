#![forbid(unsafe_code)]

//! Core: cancellation handles, flow-control demand, and channel error types.
//!
//! # Role in cellbridge
//! `cellbridge-core` holds the small vocabulary shared by every reactive
//! primitive in the workspace. It has no notion of cells, streams, or
//! bridges; it only describes how a subscription is cancelled, how much an
//! observer is willing to receive, and how a channel reports failure.
//!
//! # Primary responsibilities
//! - **Disposable**: idempotent cancellation handles and their composites.
//! - **Demand**: per-subscriber flow control for hot streams.
//! - **Never / StreamClosed**: the never-failing channel type and the one
//!   error a completed stream reports.
//!
//! # How it fits in the system
//! `cellbridge-runtime` builds `ObservableCell`, `HotStream`, and the bridge
//! on top of these types. Bridges collect their cell observations in a
//! [`CompositeDisposable`] so that completion or an explicit dispose tears
//! everything down in one call.

pub mod demand;
pub mod disposable;
pub mod error;

pub use demand::Demand;
pub use disposable::{ActionDisposable, CompositeDisposable, Disposable, ScopedDisposable};
pub use error::{Never, StreamClosed};
