#![deny(unsafe_code)]

//! Inbound fetch with delete-on-clean-close semantics.
//!
//! [`fetch_for_delivery`] opens the remote source and returns a
//! [`Deliverable`] stream. The remote source is deleted only when the
//! consumer closes the stream *without* having flagged an error, and only
//! when auto-delete is configured — the remote source is never removed
//! before its bytes have been fully and successfully consumed downstream.
//! Dropping a deliverable without closing it releases the session but never
//! deletes anything.

use std::io::Read;

use tracing::{debug, warn};

use client::resolve::join;
use client::RemoteFs;
use settings::Settings;

use crate::archive::{self, ArchiveOptions, ArchiveStream};
use crate::error::TransferError;
use crate::naming::timestamp_suffix_now;
use crate::staging::ensure_remote_dir;
use crate::stream::{ErrorFlaggable, SourceStream};

/// Reserve semantics for inbound files: move the source into a remote temp
/// directory before opening it, so concurrent pollers do not double-pick the
/// same file. Best-effort — true exclusivity depends on server-side rename
/// atomicity.
#[derive(Clone, Debug)]
pub struct ReserveOptions {
    /// Temp directory under the source directory.
    pub temp_dir: String,
    /// Timestamp-suffix the reserved name for uniqueness.
    pub add_timestamp_suffix: bool,
}

/// Options for one inbound fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Delete the remote source on clean close of the deliverable.
    pub auto_delete: bool,
    /// Move a reserved file back to the source directory when the consumer
    /// flags an error, so the next poll sees it again.
    pub keep_file_on_error: bool,
    /// Optional reserve move before download.
    pub reserve: Option<ReserveOptions>,
    /// Optional local archive configuration.
    pub archive: Option<ArchiveOptions>,
}

impl FetchOptions {
    /// Derives fetch options from resolved settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            auto_delete: settings.auto_delete,
            keep_file_on_error: settings.keep_file_on_error,
            reserve: settings.temp_dir_inbound.clone().map(|temp_dir| ReserveOptions {
                temp_dir,
                add_timestamp_suffix: settings.use_temp_file_timestamp_suffix,
            }),
            archive: ArchiveOptions::from_settings(settings),
        }
    }
}

/// Stream of the remote source file, deleting it on clean close.
pub struct RemoteSourceStream {
    fs: Box<dyn RemoteFs>,
    reader: Box<dyn Read + Send>,
    path: String,
    // Where the file came from, when a reserve move should be undone on a
    // flagged error.
    restore_path: Option<String>,
    original_name: String,
    auto_delete: bool,
    error_occurred: bool,
}

impl std::fmt::Debug for RemoteSourceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSourceStream")
            .field("path", &self.path)
            .field("auto_delete", &self.auto_delete)
            .field("error_occurred", &self.error_occurred)
            .finish_non_exhaustive()
    }
}

impl RemoteSourceStream {
    /// Remote path being read (after any reserve move).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The file name as listed in the source directory.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub(crate) fn close_inner(mut self) -> Result<(), TransferError> {
        // Drop the remote file handle before touching the file.
        drop(self.reader);

        let settle_result = if self.error_occurred {
            if let Some(original) = &self.restore_path {
                debug!(
                    from = %self.path,
                    to = %original,
                    "moving failed file back to the source directory"
                );
                if let Err(err) = self.fs.rename(&self.path, original) {
                    warn!(
                        from = %self.path,
                        error = %err,
                        "could not move failed file back to the source directory"
                    );
                }
            }
            Ok(())
        } else if self.auto_delete {
            debug!(path = %self.path, "deleting consumed source file");
            self.fs.remove_file(&self.path).map_err(TransferError::from)
        } else {
            Ok(())
        };

        if let Err(err) = self.fs.close() {
            warn!(error = %err, "failed to release the fetch session");
        }
        settle_result
    }

    /// Close used on compensation paths: failures are logged, never raised,
    /// so they cannot mask the error that got us here.
    pub(crate) fn close_quiet(self) {
        let path = self.path.clone();
        if let Err(err) = self.close_inner() {
            warn!(path = %path, error = %err, "error while abandoning source stream");
        }
    }
}

impl Read for RemoteSourceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl ErrorFlaggable for RemoteSourceStream {
    fn set_error_occurred(&mut self) {
        self.error_occurred = true;
    }

    fn error_occurred(&self) -> bool {
        self.error_occurred
    }
}

/// The stream handed to downstream delivery, with the original filename as
/// metadata and close-time side effects per configuration.
pub enum Deliverable {
    /// Reads straight from the remote; clean close deletes the source when
    /// auto-delete is on.
    Remote(RemoteSourceStream),
    /// Reads from the local archive copy; the remote side was already
    /// settled when the archive was staged. Clean close finalizes the
    /// archive placement.
    Archived(ArchiveStream),
}

impl Deliverable {
    /// The file name as it appeared in the source directory listing, before
    /// any reserve move or suffixing.
    #[must_use]
    pub fn original_name(&self) -> &str {
        match self {
            Self::Remote(stream) => &stream.original_name,
            Self::Archived(stream) => stream.original_name(),
        }
    }

    /// Closes the stream, running the close-time side effects unless an
    /// error was flagged.
    pub fn close(self) -> Result<(), TransferError> {
        match self {
            Self::Remote(stream) => stream.close_inner(),
            Self::Archived(stream) => stream.close_inner(),
        }
    }
}

impl Read for Deliverable {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Remote(stream) => stream.read(buf),
            Self::Archived(stream) => stream.read(buf),
        }
    }
}

impl ErrorFlaggable for Deliverable {
    fn set_error_occurred(&mut self) {
        match self {
            Self::Remote(stream) => stream.set_error_occurred(),
            Self::Archived(stream) => stream.set_error_occurred(),
        }
    }

    fn error_occurred(&self) -> bool {
        match self {
            Self::Remote(stream) => stream.error_occurred(),
            Self::Archived(stream) => stream.error_occurred(),
        }
    }
}

impl SourceStream for Deliverable {
    fn close(self: Box<Self>) -> Result<(), TransferError> {
        (*self).close()
    }
}

impl std::fmt::Debug for Deliverable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(stream) => f.debug_tuple("Remote").field(stream).finish(),
            Self::Archived(stream) => f.debug_tuple("Archived").field(stream).finish(),
        }
    }
}

/// Opens `source_dir/name` for delivery.
///
/// Applies the reserve move and archive staging per `options`. Any failure
/// releases the session and leaves the remote source in place (possibly
/// under the reserve temp directory when the failure came after the reserve
/// move — the file is never deleted).
pub fn fetch_for_delivery(
    mut fs: Box<dyn RemoteFs>,
    source_dir: &str,
    name: &str,
    options: &FetchOptions,
) -> Result<Deliverable, TransferError> {
    match open_source(fs.as_mut(), source_dir, name, options) {
        Ok((path, reader)) => {
            let source_path = join(source_dir, name);
            let restore_path =
                (options.keep_file_on_error && path != source_path).then_some(source_path);
            let raw = RemoteSourceStream {
                fs,
                reader,
                path,
                restore_path,
                original_name: name.to_owned(),
                auto_delete: options.auto_delete,
                error_occurred: false,
            };
            match &options.archive {
                Some(archive_options) => archive::stage(raw, archive_options),
                None => Ok(Deliverable::Remote(raw)),
            }
        }
        Err(err) => {
            if let Err(close_err) = fs.close() {
                warn!(error = %close_err, "failed to release the fetch session");
            }
            Err(err)
        }
    }
}

type OpenedSource = (String, Box<dyn Read + Send>);

fn open_source(
    fs: &mut dyn RemoteFs,
    source_dir: &str,
    name: &str,
    options: &FetchOptions,
) -> Result<OpenedSource, TransferError> {
    let mut remote_path = join(source_dir, name);

    if let Some(reserve) = &options.reserve {
        let temp_dir_abs = ensure_remote_dir(fs, source_dir, &reserve.temp_dir)?;
        let reserved_name = if reserve.add_timestamp_suffix {
            timestamp_suffix_now(name)
        } else {
            name.to_owned()
        };
        let reserved_path = join(&temp_dir_abs, &reserved_name);
        debug!(from = %remote_path, to = %reserved_path, "reserving source file");
        fs.rename(&remote_path, &reserved_path)?;
        remote_path = reserved_path;
    }

    let reader = fs.open_read(&remote_path)?;
    Ok((remote_path, reader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::MemoryRemoteFs;

    fn remote_with_file() -> MemoryRemoteFs {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_dir("/in");
        fs.add_file("/in/a.txt", b"inbound payload");
        fs
    }

    #[test]
    fn clean_close_deletes_source_when_auto_delete() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let options = FetchOptions {
            auto_delete: true,
            ..FetchOptions::default()
        };

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "a.txt", &options).unwrap();
        assert_eq!(deliverable.original_name(), "a.txt");

        let mut buf = Vec::new();
        deliverable.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"inbound payload");
        deliverable.close().unwrap();

        assert!(!handle.has_file("/in/a.txt"));
        assert!(handle.is_closed());
    }

    #[test]
    fn flagged_error_prevents_deletion() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let options = FetchOptions {
            auto_delete: true,
            ..FetchOptions::default()
        };

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "a.txt", &options).unwrap();
        let mut buf = Vec::new();
        deliverable.read_to_end(&mut buf).unwrap();
        deliverable.set_error_occurred();
        deliverable.close().unwrap();

        assert!(handle.has_file("/in/a.txt"));
        assert!(handle.is_closed());
    }

    #[test]
    fn auto_delete_off_keeps_source() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let options = FetchOptions::default();

        let deliverable = fetch_for_delivery(Box::new(fs), "/in", "a.txt", &options).unwrap();
        deliverable.close().unwrap();
        assert!(handle.has_file("/in/a.txt"));
    }

    #[test]
    fn reserve_moves_source_before_download() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let options = FetchOptions {
            auto_delete: true,
            reserve: Some(ReserveOptions {
                temp_dir: "picked".to_owned(),
                add_timestamp_suffix: false,
            }),
            ..FetchOptions::default()
        };

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "a.txt", &options).unwrap();
        // Original name is reported even though the file moved.
        assert_eq!(deliverable.original_name(), "a.txt");
        assert!(!handle.has_file("/in/a.txt"));
        assert!(handle.has_file("/in/picked/a.txt"));

        let mut buf = Vec::new();
        deliverable.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"inbound payload");
        deliverable.close().unwrap();
        assert!(!handle.has_file("/in/picked/a.txt"));
    }

    #[test]
    fn keep_file_on_error_moves_reserved_file_back() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let options = FetchOptions {
            auto_delete: true,
            keep_file_on_error: true,
            reserve: Some(ReserveOptions {
                temp_dir: "picked".to_owned(),
                add_timestamp_suffix: false,
            }),
            archive: None,
        };

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "a.txt", &options).unwrap();
        let mut buf = Vec::new();
        deliverable.read_to_end(&mut buf).unwrap();
        deliverable.set_error_occurred();
        deliverable.close().unwrap();

        // The failed file is visible again for the next poll.
        assert!(handle.has_file("/in/a.txt"));
        assert!(!handle.has_file("/in/picked/a.txt"));
        assert!(handle.is_closed());
    }

    #[test]
    fn missing_file_releases_session() {
        let fs = MemoryRemoteFs::new("/home/user");
        let handle = fs.handle();
        let options = FetchOptions::default();

        let result = fetch_for_delivery(Box::new(fs), "/in", "missing.txt", &options);
        assert!(result.is_err());
        assert!(handle.is_closed());
    }
}
