#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `settings` holds every tunable of the transfer core in one layered
//! configuration stack. Tunables exist at two conceptual levels — connector
//! defaults and endpoint overrides — and historically each one was resolved
//! by its own check-override-else-fallback accessor. Here a single mechanism
//! applies uniformly: overlays are ordered from most to least specific and
//! the first layer that sets a field wins.
//!
//! ```
//! use settings::{SettingsOverlay, SettingsStack};
//!
//! let connector = SettingsOverlay {
//!     auto_delete: Some(false),
//!     size_check_wait_ms: Some(500),
//!     ..SettingsOverlay::default()
//! };
//! let endpoint = SettingsOverlay {
//!     auto_delete: Some(true),
//!     ..SettingsOverlay::default()
//! };
//!
//! let resolved = SettingsStack::new()
//!     .over(endpoint)
//!     .over(connector)
//!     .resolve();
//! assert!(resolved.auto_delete);                      // endpoint wins
//! assert_eq!(resolved.size_check_wait_ms, 500);       // connector fallback
//! ```

pub mod policy;
pub mod stack;

pub use policy::DuplicatePolicy;
pub use stack::{Settings, SettingsOverlay, SettingsStack, DEFAULT_POLLING_INTERVAL_MS};
