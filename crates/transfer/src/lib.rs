#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `transfer` implements the reliable file-transfer protocols on top of the
//! [`RemoteFs`](client::RemoteFs) capability surface:
//!
//! - **Stability detection** ([`stability`]): age- and size-based heuristics
//!   deciding whether a remote candidate file has finished being written.
//! - **Duplicate-name resolution** ([`duplicate`]): policy-driven choice of
//!   the final destination name.
//! - **Staged outbound transfer** ([`outbound`]): upload into a temp
//!   directory, then rename to the final name as the commit point, with
//!   compensating cleanup on failure.
//! - **Archive-on-receive** ([`inbound`] and [`archive`]): a deliverable
//!   stream whose clean close — and nothing earlier — triggers deletion of
//!   the remote source, optionally copying the content into a durable local
//!   archive first.
//!
//! # Data-integrity invariant
//!
//! The remote source file is never deleted (inbound) and never left
//! half-written at its final destination name (outbound, temp-dir path)
//! unless the whole plan — data copy, rename steps, and any configured
//! archive copy — completed without error. Rename is the commit point;
//! SFTP servers do not all guarantee atomic rename, so this is best-effort
//! durability, not ACID.

pub mod archive;
pub mod duplicate;
pub mod error;
pub mod inbound;
pub mod naming;
pub mod outbound;
pub mod stability;
mod staging;
pub mod stream;

pub use archive::ArchiveOptions;
pub use duplicate::resolve_name;
pub use error::TransferError;
pub use inbound::{fetch_for_delivery, Deliverable, FetchOptions, ReserveOptions};
pub use outbound::{dispatch, send, SendOptions};
pub use stability::{is_still_changing, StabilityPolicy};
pub use stream::{ErrorFlaggable, PlainSource, SourceStream};
