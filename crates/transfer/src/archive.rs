#![deny(unsafe_code)]

//! Local archive staging for received files.
//!
//! The archive copy is made **before** the deliverable stream is handed
//! downstream, and any failure while preparing it aborts the whole fetch
//! with the remote source still in place — archive failure can never cause
//! source-file loss.
//!
//! With both temp directories configured the archive placement is itself
//! staged: copy into the receiving dir, move to the sending dir, and only a
//! clean close of the returned stream performs the last move to the final
//! archive file. Without temp dirs the copy goes straight to the final
//! location and close adds nothing.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use settings::Settings;

use crate::error::TransferError;
use crate::inbound::{Deliverable, RemoteSourceStream};
use crate::stream::ErrorFlaggable;

/// Local archive configuration.
#[derive(Clone, Debug)]
pub struct ArchiveOptions {
    /// Root directory of the archive.
    pub archive_dir: PathBuf,
    /// Receiving-side temp directory under the archive root.
    pub temp_receiving_dir: Option<String>,
    /// Sending-side temp directory under the archive root.
    pub temp_sending_dir: Option<String>,
}

impl ArchiveOptions {
    /// Derives archive options from resolved settings; `None` when no
    /// archive directory is configured.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings.archive_dir.clone().map(|archive_dir| Self {
            archive_dir,
            temp_receiving_dir: settings.archive_temp_receiving_dir.clone(),
            temp_sending_dir: settings.archive_temp_sending_dir.clone(),
        })
    }

    /// Archive placement is staged only when both temp dirs are configured.
    fn staged_dirs(&self) -> Option<(&str, &str)> {
        match (&self.temp_receiving_dir, &self.temp_sending_dir) {
            (Some(receiving), Some(sending)) => Some((receiving, sending)),
            _ => None,
        }
    }
}

/// Stream over the locally archived copy.
///
/// A clean close performs the pending sending-dir-to-final move, when one is
/// configured.
pub struct ArchiveStream {
    file: File,
    staged_path: PathBuf,
    final_path: Option<PathBuf>,
    original_name: String,
    error_occurred: bool,
}

impl ArchiveStream {
    /// The file name as listed in the remote source directory.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Local path currently backing the stream.
    #[must_use]
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    pub(crate) fn close_inner(self) -> Result<(), TransferError> {
        drop(self.file);
        if self.error_occurred {
            return Ok(());
        }
        if let Some(final_path) = &self.final_path {
            debug!(
                from = %self.staged_path.display(),
                to = %final_path.display(),
                "finalizing archive placement"
            );
            fs::rename(&self.staged_path, final_path).map_err(|source| {
                TransferError::Archive {
                    path: self.staged_path.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStream")
            .field("staged_path", &self.staged_path)
            .field("final_path", &self.final_path)
            .field("error_occurred", &self.error_occurred)
            .finish_non_exhaustive()
    }
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl ErrorFlaggable for ArchiveStream {
    fn set_error_occurred(&mut self) {
        self.error_occurred = true;
    }

    fn error_occurred(&self) -> bool {
        self.error_occurred
    }
}

/// Copies `raw` into the archive and returns the deliverable over the local
/// copy.
///
/// On success the raw stream is closed cleanly, which is what settles the
/// remote side (source deletion when auto-delete is on). On any archive
/// failure the raw stream is flagged and abandoned quietly, so the source
/// is left untouched and the original error propagates.
pub(crate) fn stage(
    raw: RemoteSourceStream,
    options: &ArchiveOptions,
) -> Result<Deliverable, TransferError> {
    let name = raw.original_name().to_owned();
    let final_file = options.archive_dir.join(&name);

    let (staged_path, final_path) = if let Some((receiving, sending)) = options.staged_dirs() {
        let receiving_dir = options.archive_dir.join(receiving);
        let sending_dir = options.archive_dir.join(sending);
        let receiving_file = receiving_dir.join(&name);
        let sending_file = sending_dir.join(&name);

        let mut raw = raw;
        if let Err(err) = prepare_dir(&receiving_dir)
            .and_then(|()| prepare_dir(&sending_dir))
            .and_then(|()| copy_to(&mut raw, &receiving_file))
            .and_then(|()| move_staged(&receiving_file, &sending_file))
        {
            raw.set_error_occurred();
            raw.close_quiet();
            return Err(err);
        }
        raw.close_inner()?;
        (sending_file, Some(final_file))
    } else {
        let mut raw = raw;
        if let Err(err) =
            prepare_dir(&options.archive_dir).and_then(|()| copy_to(&mut raw, &final_file))
        {
            raw.set_error_occurred();
            raw.close_quiet();
            return Err(err);
        }
        raw.close_inner()?;
        (final_file, None)
    };

    let file = File::open(&staged_path).map_err(|source| TransferError::Archive {
        path: staged_path.clone(),
        source,
    })?;
    Ok(Deliverable::Archived(ArchiveStream {
        file,
        staged_path,
        final_path,
        original_name: name,
        error_occurred: false,
    }))
}

fn prepare_dir(dir: &Path) -> Result<(), TransferError> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "creating archive directory");
    }
    fs::create_dir_all(dir).map_err(|source| TransferError::Archive {
        path: dir.to_path_buf(),
        source,
    })
}

fn copy_to(raw: &mut RemoteSourceStream, target: &Path) -> Result<(), TransferError> {
    debug!(target = %target.display(), "copying source stream to archive");
    let result = File::create(target)
        .and_then(|mut out| io::copy(raw, &mut out))
        .map(|_| ());
    if let Err(source) = result {
        // Leave no partial archive file behind; failures here are secondary.
        if let Err(cleanup) = fs::remove_file(target) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(
                    path = %target.display(),
                    error = %cleanup,
                    "could not remove partial archive copy"
                );
            }
        }
        return Err(TransferError::Archive {
            path: target.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn move_staged(from: &Path, to: &Path) -> Result<(), TransferError> {
    debug!(from = %from.display(), to = %to.display(), "staging archive copy");
    fs::rename(from, to).map_err(|source| TransferError::Archive {
        path: from.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::{fetch_for_delivery, FetchOptions};
    use tempfile::tempdir;
    use test_support::MemoryRemoteFs;

    fn remote_with_file() -> MemoryRemoteFs {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_dir("/in");
        fs.add_file("/in/report.txt", b"archived payload");
        fs
    }

    fn fetch_options(archive: ArchiveOptions) -> FetchOptions {
        FetchOptions {
            auto_delete: true,
            archive: Some(archive),
            ..FetchOptions::default()
        }
    }

    #[test]
    fn direct_archive_copies_before_delivery() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let dir = tempdir().unwrap();
        let options = fetch_options(ArchiveOptions {
            archive_dir: dir.path().to_path_buf(),
            temp_receiving_dir: None,
            temp_sending_dir: None,
        });

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "report.txt", &options).unwrap();

        // The copy already happened and the source is settled.
        assert!(!handle.has_file("/in/report.txt"));
        assert_eq!(
            fs::read(dir.path().join("report.txt")).unwrap(),
            b"archived payload"
        );

        let mut buf = Vec::new();
        deliverable.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"archived payload");
        deliverable.close().unwrap();
        assert!(dir.path().join("report.txt").exists());
    }

    #[test]
    fn staged_archive_moves_through_temp_dirs() {
        let fs = remote_with_file();
        let dir = tempdir().unwrap();
        let options = fetch_options(ArchiveOptions {
            archive_dir: dir.path().to_path_buf(),
            temp_receiving_dir: Some("receiving".to_owned()),
            temp_sending_dir: Some("sending".to_owned()),
        });

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "report.txt", &options).unwrap();

        // Staged in the sending dir; final file not placed yet.
        assert!(dir.path().join("sending/report.txt").exists());
        assert!(!dir.path().join("receiving/report.txt").exists());
        assert!(!dir.path().join("report.txt").exists());

        let mut buf = Vec::new();
        deliverable.read_to_end(&mut buf).unwrap();
        deliverable.close().unwrap();

        assert!(dir.path().join("report.txt").exists());
        assert!(!dir.path().join("sending/report.txt").exists());
    }

    #[test]
    fn flagged_error_leaves_archive_staged() {
        let fs = remote_with_file();
        let dir = tempdir().unwrap();
        let options = fetch_options(ArchiveOptions {
            archive_dir: dir.path().to_path_buf(),
            temp_receiving_dir: Some("receiving".to_owned()),
            temp_sending_dir: Some("sending".to_owned()),
        });

        let mut deliverable =
            fetch_for_delivery(Box::new(fs), "/in", "report.txt", &options).unwrap();
        deliverable.set_error_occurred();
        deliverable.close().unwrap();

        // No final placement on error.
        assert!(!dir.path().join("report.txt").exists());
        assert!(dir.path().join("sending/report.txt").exists());
    }

    #[test]
    fn archive_failure_preserves_source() {
        let fs = remote_with_file();
        let handle = fs.handle();
        let dir = tempdir().unwrap();
        // A plain file where the archive directory should be makes every
        // create_dir_all attempt fail.
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"not a directory").unwrap();

        let options = fetch_options(ArchiveOptions {
            archive_dir: blocked,
            temp_receiving_dir: None,
            temp_sending_dir: None,
        });

        let err = fetch_for_delivery(Box::new(fs), "/in", "report.txt", &options).unwrap_err();
        assert!(matches!(err, TransferError::Archive { .. }));
        // Source must survive any archive failure, auto-delete or not.
        assert!(handle.has_file("/in/report.txt"));
        assert!(handle.is_closed());
    }
}
