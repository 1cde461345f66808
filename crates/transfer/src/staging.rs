#![deny(unsafe_code)]

//! Remote temp-directory preparation.
//!
//! Probing is `cd`-shaped: try to enter the directory, and only on failure
//! create it (enter parent, mkdir, enter again). Creation is serialized
//! per destination path within this process; nothing guards against another
//! process or host racing the same mkdir, which is a documented limitation
//! of the protocol.

use std::sync::{Arc, LazyLock, Mutex};

use dashmap::DashMap;
use tracing::info;

use client::resolve::join;
use client::RemoteFs;

use crate::error::TransferError;

static DIR_LOCKS: LazyLock<DashMap<String, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

fn lock_for(path: &str) -> Arc<Mutex<()>> {
    DIR_LOCKS
        .entry(path.to_owned())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Ensures `parent/dir` exists remotely, returning its absolute path.
///
/// Both `parent` and the result are absolute paths.
pub(crate) fn ensure_remote_dir(
    fs: &mut dyn RemoteFs,
    parent: &str,
    dir: &str,
) -> Result<String, TransferError> {
    let path = join(parent, dir);
    let lock = lock_for(&path);
    let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

    if let Err(probe) = fs.change_dir(&path) {
        info!(
            path = %path,
            error = %probe,
            "temp directory not enterable, attempting to create it"
        );
        fs.change_dir(parent).map_err(|source| TransferError::TempDir {
            path: parent.to_owned(),
            source,
        })?;
        fs.make_dir(&path).map_err(|source| TransferError::TempDir {
            path: path.clone(),
            source,
        })?;
        // Now it should exist.
        fs.change_dir(&path).map_err(|source| TransferError::TempDir {
            path: path.clone(),
            source,
        })?;
    }
    Ok(path)
}
