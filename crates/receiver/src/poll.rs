#![deny(unsafe_code)]

//! The poll cycle: list, filter, stability-check, fetch, hand off.
//!
//! # Session discipline
//!
//! Each cycle opens one session for the directory listing and stability
//! checks, releases it, and then opens a dedicated session per available
//! file for the actual retrieval. A listing session is never reused for a
//! download.
//!
//! # Failure isolation
//!
//! A listing failure or a stability-check failure abandons the whole cycle
//! (no partial file list is ever acted on; a stat error is a hard error,
//! never "file not ready"). Failures after that point are isolated per
//! file: one file's fetch or delivery failure is recorded and the cycle
//! moves on to the next file in listing order.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use client::resolve::join;
use client::{PathResolver, RemoteFs, SessionFactory};
use settings::Settings;
use transfer::{fetch_for_delivery, is_still_changing, Deliverable, FetchOptions, StabilityPolicy};

use crate::error::{DeliveryError, ReceiverError};
use crate::filter::{AcceptAll, FilenameFilter};

/// Downstream consumer of fetched files.
///
/// The implementation owns the deliverable's lifecycle: it must read the
/// stream and close it (flagging an error first when consumption failed),
/// since close is what settles the remote source.
pub trait Delivery: Send {
    /// Consumes one fetched file.
    fn deliver(&mut self, stream: Deliverable, original_filename: &str)
        -> Result<(), DeliveryError>;
}

/// Outcome of one poll cycle that got past the listing stage.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Files handed to delivery without error.
    pub delivered: usize,
    /// Per-file failures, in listing order.
    pub failures: Vec<ReceiverError>,
}

/// Interval-driven inbound receiver.
pub struct PollingReceiver {
    factory: Arc<dyn SessionFactory>,
    directory: String,
    filter: Box<dyn FilenameFilter>,
    stability: StabilityPolicy,
    fetch: FetchOptions,
    interval: Duration,
    only_first: bool,
}

impl PollingReceiver {
    /// Builds a receiver from resolved settings, accepting every file name.
    #[must_use]
    pub fn from_settings(factory: Arc<dyn SessionFactory>, settings: &Settings) -> Self {
        Self {
            factory,
            directory: settings.directory.clone(),
            filter: Box::new(AcceptAll),
            stability: StabilityPolicy::from_millis(
                settings.file_age_ms,
                settings.size_check_wait_ms,
            ),
            fetch: FetchOptions::from_settings(settings),
            interval: Duration::from_millis(settings.polling_interval_ms),
            only_first: false,
        }
    }

    /// Replaces the filename filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Box<dyn FilenameFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Stops the availability scan at the first settled file.
    #[must_use]
    pub fn only_first(mut self, only_first: bool) -> Self {
        self.only_first = only_first;
        self
    }

    /// Lists the configured directory and returns the names that pass the
    /// filename filter and the stability check, in listing order.
    ///
    /// Opens and releases its own session. Any listing or stat failure
    /// abandons the scan with an error.
    pub fn available_files(&self) -> Result<Vec<String>, ReceiverError> {
        let mut fs = self.factory.open().map_err(ReceiverError::Session)?;
        let result = self.scan(fs.as_mut());
        if let Err(err) = fs.close() {
            warn!(error = %err, "failed to release the listing session");
        }
        result
    }

    fn scan(&self, fs: &mut dyn RemoteFs) -> Result<Vec<String>, ReceiverError> {
        let dir = PathResolver::new(fs.home()).resolve(&self.directory);
        let names = fs
            .list_files(&dir)
            .map_err(|source| ReceiverError::Listing {
                dir: dir.clone(),
                source,
            })?;

        let mut available = Vec::new();
        for name in names {
            if !self.filter.accept(&name) {
                debug!(%name, "filtered out");
                continue;
            }
            let path = join(&dir, &name);
            let changing = is_still_changing(fs, &path, &self.stability).map_err(|source| {
                ReceiverError::Stability {
                    name: name.clone(),
                    source,
                }
            })?;
            if changing {
                debug!(%name, "still changing, deferred");
                continue;
            }
            available.push(name);
            if self.only_first {
                break;
            }
        }
        Ok(available)
    }

    /// Runs one poll cycle: scan for available files, then fetch and hand
    /// each one to `delivery` sequentially.
    pub fn poll(&self, delivery: &mut dyn Delivery) -> Result<PollReport, ReceiverError> {
        let available = self.available_files()?;
        debug!(count = available.len(), "poll cycle found available files");

        let mut report = PollReport::default();
        for name in available {
            match self.fetch_one(&name) {
                Ok(deliverable) => match delivery.deliver(deliverable, &name) {
                    Ok(()) => report.delivered += 1,
                    Err(source) => report.failures.push(ReceiverError::Delivery {
                        name,
                        source,
                    }),
                },
                Err(err) => report.failures.push(err),
            }
        }
        Ok(report)
    }

    fn fetch_one(&self, name: &str) -> Result<Deliverable, ReceiverError> {
        let fs = self.factory.open().map_err(ReceiverError::Session)?;
        let dir = PathResolver::new(fs.home()).resolve(&self.directory);
        fetch_for_delivery(fs, &dir, name, &self.fetch).map_err(|source| ReceiverError::Fetch {
            name: name.to_owned(),
            source,
        })
    }

    /// Runs poll cycles on the configured interval until `shutdown` receives
    /// a message or is dropped. Cycle failures are logged, never fatal.
    pub fn run(&self, delivery: &mut dyn Delivery, shutdown: &Receiver<()>) {
        info!(
            directory = %self.directory,
            interval_ms = self.interval.as_millis() as u64,
            "polling receiver started"
        );
        loop {
            match shutdown.recv_timeout(self.interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => match self.poll(delivery) {
                    Ok(report) => {
                        for failure in &report.failures {
                            error!(error = %failure, "file processing failed");
                        }
                    }
                    Err(err) => error!(error = %err, "poll cycle failed"),
                },
            }
        }
        info!("polling receiver stopped");
    }
}
