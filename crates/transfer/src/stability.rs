#![deny(unsafe_code)]

//! Write-completion heuristics for remote candidate files.
//!
//! Neither check materializes file content: both are stat-based, trading
//! exactness (server-side write atomicity is outside this system's control)
//! for cheap polling.

use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use client::RemoteFs;

use crate::error::TransferError;

/// Thresholds for the stability heuristics. A zero duration disables the
/// corresponding check; with both disabled every listed file is considered
/// settled immediately.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StabilityPolicy {
    /// Minimum age: the file's last-modified time must be at least this far
    /// in the past. Requires the local and server clocks to be synchronized;
    /// a skewed clock making the file appear modified in the future defers
    /// the file exactly like one that is too young.
    pub min_age: Duration,
    /// Delay between two size observations; the file is deferred while the
    /// sizes differ.
    pub size_check_delay: Duration,
}

impl StabilityPolicy {
    /// Builds a policy from millisecond thresholds, the unit the
    /// configuration surface uses.
    #[must_use]
    pub const fn from_millis(min_age_ms: u64, size_check_delay_ms: u64) -> Self {
        Self {
            min_age: Duration::from_millis(min_age_ms),
            size_check_delay: Duration::from_millis(size_check_delay_ms),
        }
    }

    /// Whether any check is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.min_age.is_zero() || !self.size_check_delay.is_zero()
    }
}

/// Reports whether `name` still appears to be written to.
///
/// The age check short-circuits: a file that is too young is deferred
/// without paying for the size check on this poll. Any stat failure is a
/// hard error for the poll attempt, never a silent "not ready".
pub fn is_still_changing(
    fs: &mut dyn RemoteFs,
    path: &str,
    policy: &StabilityPolicy,
) -> Result<bool, TransferError> {
    if !policy.min_age.is_zero() {
        let modified = fs.stat(path)?.modified;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < policy.min_age {
            debug!(
                path = %path,
                age_ms = age.as_millis() as u64,
                min_age_ms = policy.min_age.as_millis() as u64,
                "file has not aged enough yet, deferring"
            );
            return Ok(true);
        }
    }

    if !policy.size_check_delay.is_zero() {
        info!(
            path = %path,
            delay_ms = policy.size_check_delay.as_millis() as u64,
            "performing delayed size check"
        );
        let first = fs.stat(path)?.size;
        thread::sleep(policy.size_check_delay);
        let second = fs.stat(path)?.size;

        if first == second {
            info!(path = %path, size = first, "file is stable, ready for retrieval");
        } else {
            info!(path = %path, first, second, "file is growing, deferring retrieval");
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::MemoryRemoteFs;

    #[test]
    fn no_checks_means_always_settled() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"data");
        let policy = StabilityPolicy::default();
        assert!(!policy.is_enabled());
        assert!(!is_still_changing(&mut fs, "/in/a.txt", &policy).unwrap());
    }

    #[test]
    fn young_file_is_still_changing() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"data");
        fs.set_modified("/in/a.txt", SystemTime::now());
        let policy = StabilityPolicy::from_millis(60_000, 0);
        assert!(is_still_changing(&mut fs, "/in/a.txt", &policy).unwrap());
    }

    #[test]
    fn aged_file_is_settled() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"data");
        fs.set_modified(
            "/in/a.txt",
            SystemTime::now() - Duration::from_secs(3600),
        );
        let policy = StabilityPolicy::from_millis(60_000, 0);
        assert!(!is_still_changing(&mut fs, "/in/a.txt", &policy).unwrap());
    }

    #[test]
    fn future_mtime_defers_like_a_young_file() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"data");
        fs.set_modified(
            "/in/a.txt",
            SystemTime::now() + Duration::from_secs(3600),
        );
        let policy = StabilityPolicy::from_millis(60_000, 0);
        assert!(is_still_changing(&mut fs, "/in/a.txt", &policy).unwrap());
    }

    #[test]
    fn stable_size_is_settled() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"constant");
        let policy = StabilityPolicy::from_millis(0, 1);
        assert!(!is_still_changing(&mut fs, "/in/a.txt", &policy).unwrap());
    }

    #[test]
    fn growing_size_is_still_changing() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"data");
        // Each stat grows the file by the configured amount.
        fs.grow_on_stat("/in/a.txt", 16);
        let policy = StabilityPolicy::from_millis(0, 1);
        assert!(is_still_changing(&mut fs, "/in/a.txt", &policy).unwrap());
    }

    #[test]
    fn stat_failure_is_a_hard_error() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        let policy = StabilityPolicy::from_millis(1, 0);
        let result = is_still_changing(&mut fs, "/in/missing.txt", &policy);
        assert!(result.is_err());
    }
}
