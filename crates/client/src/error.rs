#![deny(unsafe_code)]

//! Error taxonomy for the SFTP capability surface.
//!
//! Connection and authentication failures are distinct from per-operation
//! failures so that callers can report session-acquisition problems
//! separately (retry policy, if any, belongs to the surrounding layer and is
//! never applied here).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error returned by [`RemoteFs`](crate::fs::RemoteFs) operations and session
/// construction.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the remote host failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Remote host name or address.
        host: String,
        /// Remote port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// SSH handshake or channel setup failed.
    #[error("ssh session setup with {host} failed: {source}")]
    Handshake {
        /// Remote host name or address.
        host: String,
        /// Underlying library error.
        #[source]
        source: ssh2::Error,
    },

    /// Authentication was rejected or could not be attempted.
    #[error("login failed for {user}@{host}: {source}")]
    Auth {
        /// User name presented to the server.
        user: String,
        /// Remote host name or address.
        host: String,
        /// Underlying library error.
        #[source]
        source: ssh2::Error,
    },

    /// The configured identity file does not exist on the local filesystem.
    #[error("identity file {} not found", path.display())]
    IdentityFileMissing {
        /// Configured identity-file path.
        path: PathBuf,
    },

    /// Changing the working directory failed, usually because the directory
    /// does not exist.
    #[error("cannot change working directory to {path}: {reason}")]
    ChangeDir {
        /// Attempted absolute path.
        path: String,
        /// Server-side failure description.
        reason: String,
    },

    /// Directory creation failed.
    #[error("could not create directory {path}: {reason}")]
    Mkdir {
        /// Attempted absolute path.
        path: String,
        /// Server-side failure description.
        reason: String,
    },

    /// A remote file operation failed.
    #[error("{op} failed for {path}: {reason}")]
    Operation {
        /// Operation name (`list`, `stat`, `get`, `put`, `rename`, ...).
        op: &'static str,
        /// Path the operation was applied to.
        path: String,
        /// Server-side failure description.
        reason: String,
    },

    /// Local I/O error (reading an identity file, copying a payload stream).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Builds an [`ClientError::Operation`] from an `ssh2` error.
    pub(crate) fn op(op: &'static str, path: &str, source: &ssh2::Error) -> Self {
        Self::Operation {
            op,
            path: path.to_owned(),
            reason: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_display_names_op_and_path() {
        let err = ClientError::Operation {
            op: "rename",
            path: "/data/in/a.txt".to_owned(),
            reason: "no such file".to_owned(),
        };
        let text = err.to_string();
        assert!(text.contains("rename"));
        assert!(text.contains("/data/in/a.txt"));
    }

    #[test]
    fn identity_file_display_names_path() {
        let err = ClientError::IdentityFileMissing {
            path: PathBuf::from("/home/user/.ssh/id_ed25519"),
        };
        assert!(err.to_string().contains("/home/user/.ssh/id_ed25519"));
    }
}
