#![deny(unsafe_code)]

//! Staged outbound transfer.
//!
//! The upload path is chosen once, before any bytes move: duplicate
//! resolution against a destination-listing snapshot, optional staging
//! through a temp directory, optional timestamp-suffixed in-flight name.
//! With a temp directory the final rename is the commit point — the
//! destination name never exposes a half-written file. Without one, a
//! mid-upload failure leaves a partial file at the final name; callers that
//! cannot tolerate this must configure the temp directory.

use tracing::{debug, info, warn};

use client::resolve::join;
use client::RemoteFs;
use settings::{DuplicatePolicy, Settings};

use crate::duplicate::resolve_name;
use crate::error::TransferError;
use crate::naming::timestamp_suffix_now;
use crate::staging::ensure_remote_dir;
use crate::stream::SourceStream;

/// Options for one outbound send.
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    /// When set, uploads are staged in this directory under the destination
    /// and renamed into place on completion.
    pub temp_dir: Option<String>,
    /// Timestamp-suffix the in-flight name (temp-dir path only).
    pub add_timestamp_suffix: bool,
    /// Policy applied when the desired name already exists.
    pub duplicate_policy: DuplicatePolicy,
}

impl SendOptions {
    /// Derives send options from resolved settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            temp_dir: settings.temp_dir_outbound.clone(),
            add_timestamp_suffix: settings.use_temp_file_timestamp_suffix,
            duplicate_policy: settings.duplicate_handling,
        }
    }
}

/// Sends `source` to `dest_dir/desired_name`, returning the final name the
/// file was committed under.
///
/// `dest_dir` must be a pre-resolved absolute path. On any failure the
/// source stream's error flag is set (so a deliverable source will not
/// delete or archive its origin), any partially-uploaded temp file is
/// deleted best-effort, and the original error is re-raised. Closing the
/// source and releasing the session belong to the caller; see [`dispatch`]
/// for the scoped variant.
pub fn send(
    fs: &mut dyn RemoteFs,
    source: &mut dyn SourceStream,
    dest_dir: &str,
    desired_name: &str,
    options: &SendOptions,
) -> Result<String, TransferError> {
    let mut temp_path = None;
    match plan_and_upload(fs, source, dest_dir, desired_name, options, &mut temp_path) {
        Ok(final_name) => {
            info!(dest = %join(dest_dir, &final_name), "successfully wrote file");
            Ok(final_name)
        }
        Err(err) => {
            // Make sure a deliverable source keeps its origin intact, no
            // matter which step failed.
            source.set_error_occurred();
            if let Some(path) = &temp_path {
                if let Err(cleanup) = fs.remove_file(path) {
                    warn!(
                        path = %path,
                        error = %cleanup,
                        "could not delete in-flight file from the temp directory"
                    );
                }
            }
            Err(err)
        }
    }
}

fn plan_and_upload(
    fs: &mut dyn RemoteFs,
    source: &mut dyn SourceStream,
    dest_dir: &str,
    desired_name: &str,
    options: &SendOptions,
    temp_path: &mut Option<String>,
) -> Result<String, TransferError> {
    let existing = fs.list_files(dest_dir)?;
    let final_name = resolve_name(dest_dir, desired_name, options.duplicate_policy, &existing)?;

    let mut transfer_name = final_name.clone();
    let upload_path = if let Some(temp_dir) = &options.temp_dir {
        let temp_dir_abs = ensure_remote_dir(fs, dest_dir, temp_dir)?;
        if options.add_timestamp_suffix {
            transfer_name = timestamp_suffix_now(&transfer_name);
        }
        let path = join(&temp_dir_abs, &transfer_name);
        *temp_path = Some(path.clone());
        path
    } else {
        join(dest_dir, &final_name)
    };
    debug!(upload_path = %upload_path, final_name = %final_name, "transfer plan computed");

    fs.put(&upload_path, source)
        .map_err(|source| TransferError::Upload {
            path: upload_path.clone(),
            source,
        })?;

    if temp_path.is_some() {
        let final_path = join(dest_dir, &final_name);
        fs.rename(&upload_path, &final_path)
            .map_err(|source| TransferError::Commit {
                from: upload_path.clone(),
                to: final_path,
                source,
            })?;
    }
    Ok(final_name)
}

/// Scoped send: always closes the source stream and then releases the
/// session, on success and on every failure path.
///
/// Closing the source runs its close-time side effects — for a forwarded
/// inbound deliverable that is what settles the origin file. A send failure
/// flags the stream first, so the close on that path runs no side effects.
/// Session release failures are logged, never allowed to replace the
/// transfer outcome.
pub fn dispatch(
    mut fs: Box<dyn RemoteFs>,
    mut source: Box<dyn SourceStream>,
    dest_dir: &str,
    desired_name: &str,
    options: &SendOptions,
) -> Result<String, TransferError> {
    let result = send(fs.as_mut(), source.as_mut(), dest_dir, desired_name, options);
    // Stream first, then session.
    let close_result = source.close();
    if let Err(err) = fs.close() {
        warn!(error = %err, "failed to release the transfer session");
    }
    match (result, close_result) {
        (Ok(final_name), Ok(())) => Ok(final_name),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), close_result) => {
            if let Err(close_err) = close_result {
                warn!(error = %close_err, "error while closing the source stream");
            }
            Err(err)
        }
    }
}
