#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `receiver` implements the inbound polling loop. Each cycle lists the
//! configured remote directory, drops names the [`FilenameFilter`] rejects,
//! defers files the stability check reports as still being written, and
//! fetches each remaining file over its own dedicated session before handing
//! the stream to a [`Delivery`] collaborator. The collaborator's close of
//! the stream — not the receiver — is what settles the remote source
//! (deletion, archive finalization).
//!
//! Sessions follow the one-per-operation discipline: the listing session is
//! released before the first retrieval session is opened.

pub mod error;
pub mod filter;
pub mod poll;

pub use error::{DeliveryError, ReceiverError};
pub use filter::{AcceptAll, FilenameFilter, GlobFilter};
pub use poll::{Delivery, PollReport, PollingReceiver};
