#![deny(unsafe_code)]

//! The remote-filesystem capability surface.
//!
//! [`RemoteFs`] is the seam between the transfer protocols and the wire. The
//! production implementation is [`SftpSession`](crate::session::SftpSession);
//! tests substitute an in-memory remote. All paths handed to these methods
//! are pre-resolved absolute paths (see
//! [`PathResolver`](crate::resolve::PathResolver)).

use std::io::Read;
use std::time::SystemTime;

use crate::error::ClientError;

/// Point-in-time attributes of one remote file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileAttrs {
    /// File size in bytes.
    pub size: u64,
    /// Last-modified time as reported by the server.
    pub modified: SystemTime,
}

/// One authenticated, single-use, non-shareable remote filesystem session.
///
/// Implementations are **not** thread-safe in the sharing sense: each
/// concurrent operation must obtain its own instance, use it for exactly one
/// logical operation, and release it with [`close`](RemoteFs::close) (or by
/// dropping it, which releases best-effort).
pub trait RemoteFs: Send {
    /// The session home directory captured at login.
    fn home(&self) -> &str;

    /// Current working directory, tracked purely for diagnostic context.
    fn current_dir(&self) -> &str;

    /// Validates that `path` is an existing remote directory and records it
    /// as the diagnostic working directory.
    ///
    /// No subsequent operation depends on this state; it exists so that the
    /// outbound temp-dir protocol can probe for directory existence the same
    /// way an interactive `cd` would.
    fn change_dir(&mut self, path: &str) -> Result<(), ClientError>;

    /// Lists the plain files (never directories) in `path`, by name.
    fn list_files(&mut self, path: &str) -> Result<Vec<String>, ClientError>;

    /// Lists the sub-directories (never files) in `path`, by name.
    fn list_directories(&mut self, path: &str) -> Result<Vec<String>, ClientError>;

    /// Stats one remote file.
    fn stat(&mut self, path: &str) -> Result<FileAttrs, ClientError>;

    /// Opens a remote file for streamed reading.
    fn open_read(&mut self, path: &str) -> Result<Box<dyn Read + Send>, ClientError>;

    /// Streams `reader` to the remote file at `path`, returning the number of
    /// bytes written. The payload is never buffered in full.
    fn put(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, ClientError>;

    /// Renames (moves) a remote file.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), ClientError>;

    /// Deletes a remote file.
    fn remove_file(&mut self, path: &str) -> Result<(), ClientError>;

    /// Deletes an empty remote directory.
    fn remove_dir(&mut self, path: &str) -> Result<(), ClientError>;

    /// Creates a remote directory.
    fn make_dir(&mut self, path: &str) -> Result<(), ClientError>;

    /// Sets the permission bits on a remote path.
    fn set_permissions(&mut self, path: &str, mode: u32) -> Result<(), ClientError>;

    /// Reports whether the underlying connection is still usable.
    fn connected(&self) -> bool;

    /// Releases the session (logout + disconnect). Idempotent.
    fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens fresh sessions on demand.
///
/// The polling receiver opens one session for each listing and another for
/// each per-file retrieval; dispatchers open one per send. This trait is the
/// single place that discipline is rooted.
pub trait SessionFactory: Send + Sync {
    /// Opens and authenticates a new session.
    fn open(&self) -> Result<Box<dyn RemoteFs>, ClientError>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> Result<Box<dyn RemoteFs>, ClientError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn RemoteFs>, ClientError> {
        self()
    }
}
