#![deny(unsafe_code)]

//! Transfer error taxonomy.
//!
//! Duplicate-name collisions, the deliberately unimplemented overwrite
//! policy, temp-directory problems, and archive failures are all distinct
//! variants so callers can report them as first-class outcomes. Cleanup-step
//! failures are logged by the protocols, never surfaced in place of the
//! original error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use client::ClientError;

/// Error returned by the outbound and inbound transfer protocols.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The desired name already exists at the destination and the policy is
    /// to fail.
    #[error("file {name} already exists in {dir} and duplicate handling is throwException")]
    DuplicateExists {
        /// Colliding file name.
        name: String,
        /// Destination directory.
        dir: String,
    },

    /// The overwrite duplicate policy was selected; it is not implemented.
    #[error("duplicate-handling strategy 'overwrite' is not implemented")]
    OverwriteUnsupported,

    /// The remote temp directory could not be entered or created.
    #[error("could not prepare temp directory {path}")]
    TempDir {
        /// Absolute temp-directory path.
        path: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// Streaming the payload to the remote failed.
    #[error("upload to {path} failed")]
    Upload {
        /// Absolute upload path.
        path: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// The rename from the in-flight name to the final destination failed.
    #[error("commit rename {from} -> {to} failed")]
    Commit {
        /// In-flight path.
        from: String,
        /// Final destination path.
        to: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// Copying or staging the local archive file failed.
    #[error("archive step failed for {}", path.display())]
    Archive {
        /// Offending local path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A capability-surface operation failed outside the specific phases
    /// above (listing, stat, reserve move, source delete).
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_display_names_file_and_dir() {
        let err = TransferError::DuplicateExists {
            name: "a.txt".to_owned(),
            dir: "/data/out".to_owned(),
        };
        let text = err.to_string();
        assert!(text.contains("a.txt"));
        assert!(text.contains("/data/out"));
    }

    #[test]
    fn overwrite_display_is_distinct() {
        let text = TransferError::OverwriteUnsupported.to_string();
        assert!(text.contains("not implemented"));
    }
}
