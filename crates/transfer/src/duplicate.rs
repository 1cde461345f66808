#![deny(unsafe_code)]

//! Duplicate-name resolution against a destination listing.

use tracing::{debug, info};

use settings::DuplicatePolicy;

use crate::error::TransferError;
use crate::naming::split_extension;

/// Decides the final destination name for `desired` under `policy`, given a
/// point-in-time listing of the destination directory.
///
/// The listing is a snapshot taken once at the start of resolution; a
/// concurrent writer placing a colliding name between the listing and the
/// upload is a known limitation of this scheme, mitigated only by the
/// optional timestamp-suffix uniqueness strategy.
///
/// `dir` is used for error context only.
pub fn resolve_name(
    dir: &str,
    desired: &str,
    policy: DuplicatePolicy,
    existing: &[String],
) -> Result<String, TransferError> {
    match policy {
        DuplicatePolicy::ThrowException => {
            if existing.iter().any(|name| name == desired) {
                return Err(TransferError::DuplicateExists {
                    name: desired.to_owned(),
                    dir: dir.to_owned(),
                });
            }
            Ok(desired.to_owned())
        }
        DuplicatePolicy::Overwrite => Err(TransferError::OverwriteUnsupported),
        DuplicatePolicy::AppendSequenceNumber => Ok(unique_name(desired, existing)),
    }
}

/// Probes `stem`, `stem_1`, `stem_2`, ... until a non-colliding candidate is
/// found, then re-appends the original extension. No upper bound on the
/// sequence number.
fn unique_name(desired: &str, existing: &[String]) -> String {
    let (stem, ext) = split_extension(desired);
    debug!(desired = %desired, stem = %stem, ext = %ext, "searching for a unique name");

    let mut candidate = stem.to_owned();
    let mut index = 1u64;
    while existing.iter().any(|name| {
        let full = format!("{candidate}{ext}");
        name == &full
    }) {
        candidate = format!("{stem}_{index}");
        index += 1;
    }

    let unique = format!("{candidate}{ext}");
    if unique != desired {
        info!(desired = %desired, unique = %unique, "desired name taken, using sequence-numbered name");
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<String> {
        names.iter().map(|&n| n.to_owned()).collect()
    }

    #[test]
    fn throw_exception_passes_free_name() {
        let name = resolve_name(
            "/out",
            "a.txt",
            DuplicatePolicy::ThrowException,
            &listing(&["b.txt"]),
        )
        .unwrap();
        assert_eq!(name, "a.txt");
    }

    #[test]
    fn throw_exception_rejects_collision() {
        let err = resolve_name(
            "/out",
            "a.txt",
            DuplicatePolicy::ThrowException,
            &listing(&["a.txt"]),
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::DuplicateExists { .. }));
    }

    #[test]
    fn overwrite_fails_loudly() {
        let err = resolve_name("/out", "a.txt", DuplicatePolicy::Overwrite, &[]).unwrap_err();
        assert!(matches!(err, TransferError::OverwriteUnsupported));
    }

    #[test]
    fn sequence_number_skips_existing_variants() {
        let name = resolve_name(
            "/out",
            "a.txt",
            DuplicatePolicy::AppendSequenceNumber,
            &listing(&["a.txt", "a_1.txt"]),
        )
        .unwrap();
        assert_eq!(name, "a_2.txt");
    }

    #[test]
    fn sequence_number_keeps_free_name_unchanged() {
        let name = resolve_name(
            "/out",
            "a.txt",
            DuplicatePolicy::AppendSequenceNumber,
            &listing(&["other.txt"]),
        )
        .unwrap();
        assert_eq!(name, "a.txt");
    }

    #[test]
    fn sequence_number_handles_extensionless_names() {
        let name = resolve_name(
            "/out",
            "README",
            DuplicatePolicy::AppendSequenceNumber,
            &listing(&["README", "README_1"]),
        )
        .unwrap();
        assert_eq!(name, "README_2");
    }
}
