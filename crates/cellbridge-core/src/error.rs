#![forbid(unsafe_code)]

//! Channel error types.

use std::fmt;

/// Failure type of a channel that cannot fail.
///
/// Cells and streams in this workspace carry no error channel. Sources that
/// can fail must be mapped onto a never-failing channel before bridging.
pub type Never = std::convert::Infallible;

/// A value was sent into a stream that has already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamClosed;

impl fmt::Display for StreamClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stream already completed")
    }
}

impl std::error::Error for StreamClosed {}
