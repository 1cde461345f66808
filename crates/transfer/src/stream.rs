#![deny(unsafe_code)]

//! Stream capability traits.
//!
//! Streams that participate in the delete-on-success protocol expose
//! [`ErrorFlaggable`]: when downstream processing fails, the flag is set
//! before close so that close-time side effects (deleting the remote source,
//! finalizing an archive move) are suppressed. Dispatch is always on the
//! capability trait, never on concrete stream types.

use std::io::Read;

use crate::error::TransferError;

/// Capability of carrying a "downstream processing failed" flag.
pub trait ErrorFlaggable {
    /// Marks the stream as having observed a downstream error. Close-time
    /// side effects must be skipped from now on.
    fn set_error_occurred(&mut self);

    /// Whether an error has been flagged.
    fn error_occurred(&self) -> bool;
}

/// A readable payload source that can be error-flagged and closed.
///
/// Outbound dispatch accepts any [`SourceStream`]; when the source is itself
/// a deliverable from an inbound fetch (a receive-then-forward flow), the
/// flag set on dispatch failure prevents the inbound side from deleting or
/// archiving the original, and the close after a clean dispatch is what
/// settles it.
pub trait SourceStream: Read + ErrorFlaggable + Send {
    /// Closes the stream, running any close-time side effects it carries.
    fn close(self: Box<Self>) -> Result<(), TransferError>;
}

/// Adapter giving any reader a no-effect error flag, for payloads that do
/// not originate from a deliverable stream.
pub struct PlainSource<R> {
    inner: R,
    error_occurred: bool,
}

impl<R: Read> PlainSource<R> {
    /// Wraps `inner`.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            error_occurred: false,
        }
    }

    /// Unwraps the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PlainSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R> ErrorFlaggable for PlainSource<R> {
    fn set_error_occurred(&mut self) {
        self.error_occurred = true;
    }

    fn error_occurred(&self) -> bool {
        self.error_occurred
    }
}

impl<R: Read + Send> SourceStream for PlainSource<R> {
    fn close(self: Box<Self>) -> Result<(), TransferError> {
        Ok(())
    }
}
