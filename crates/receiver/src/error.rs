#![deny(unsafe_code)]

//! Error taxonomy for the polling receiver.

use client::ClientError;
use thiserror::Error;
use transfer::TransferError;

/// Error type returned by downstream delivery collaborators.
pub type DeliveryError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by a poll cycle or one of its per-file steps.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Could not open a session for listing or retrieval.
    #[error("could not open a session: {0}")]
    Session(#[source] ClientError),

    /// The directory listing failed; the whole poll cycle is abandoned.
    #[error("listing {dir} failed: {source}")]
    Listing {
        /// Directory the listing was attempted on.
        dir: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// A stability check could not complete. This is a hard error for the
    /// poll attempt, never treated as "file not ready".
    #[error("stability check for {name} failed: {source}")]
    Stability {
        /// Candidate file name.
        name: String,
        /// Underlying transfer error.
        #[source]
        source: TransferError,
    },

    /// Fetching one available file failed.
    #[error("fetch of {name} failed: {source}")]
    Fetch {
        /// File name as listed.
        name: String,
        /// Underlying transfer error.
        #[source]
        source: TransferError,
    },

    /// The downstream delivery collaborator reported a failure.
    #[error("delivery of {name} failed: {source}")]
    Delivery {
        /// File name as listed.
        name: String,
        /// Downstream error.
        #[source]
        source: DeliveryError,
    },
}
