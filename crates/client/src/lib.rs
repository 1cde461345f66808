#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `client` wraps one authenticated SFTP connection behind a small,
//! synchronous capability surface. A [`SftpSession`] is created per logical
//! operation (one listing, one retrieval, one store), used from exactly one
//! thread, and released afterwards; sessions are never shared or pooled by
//! this crate.
//!
//! The capability surface itself is the [`RemoteFs`] trait, which higher
//! layers (staged transfer, archive-on-receive, the polling receiver) consume
//! so that protocol logic can be exercised against an in-memory remote in
//! tests.
//!
//! # Path discipline
//!
//! Every operation takes a pre-resolved absolute path produced by
//! [`PathResolver`]. The session keeps a current-directory string purely for
//! diagnostic context; no call relies on server-side working-directory state
//! left behind by an earlier call.

pub mod endpoint;
pub mod error;
pub mod fs;
pub mod resolve;
pub mod session;

pub use endpoint::{Credential, RemoteEndpoint, RemoteEndpointBuilder};
pub use error::ClientError;
pub use fs::{FileAttrs, RemoteFs, SessionFactory};
pub use resolve::PathResolver;
pub use session::{EndpointSessionFactory, SftpSession};
