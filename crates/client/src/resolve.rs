#![deny(unsafe_code)]

//! Canonical absolute-path construction.
//!
//! Remote paths arrive in three notations: double-slash absolute
//! (`//opt/data`), home-relative with a tilde segment (`/~/inbound`), and
//! plain paths that are interpreted relative to the session home
//! (`/inbound`). [`PathResolver`] collapses all three into one absolute form.

/// Resolves configured path notations against the session home directory.
///
/// The home string is captured once at login and never changes for the
/// lifetime of the session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathResolver {
    home: String,
}

impl PathResolver {
    /// Creates a resolver for the given home directory.
    #[must_use]
    pub fn new(home: impl Into<String>) -> Self {
        Self { home: home.into() }
    }

    /// The session home directory this resolver was created with.
    #[must_use]
    pub fn home(&self) -> &str {
        &self.home
    }

    /// Converts a configured path into a canonical absolute path.
    ///
    /// - `//opt/data` is already absolute; exactly one leading `/` is
    ///   stripped.
    /// - `/~/inbound` re-anchors at the home directory.
    /// - Any other path not already under `home` gets `home` prepended.
    ///
    /// # Single application only
    ///
    /// Resolution is **not** idempotent: feeding an already-resolved
    /// double-slash path through again produces a different string (the
    /// `//`-marker is gone, so the home prefix is re-applied). Callers must
    /// resolve each logical path exactly once and keep the result.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        if let Some(absolute) = path.strip_prefix('/').filter(|rest| rest.starts_with('/')) {
            // Double slash marks an absolute path; drop one '/'.
            return absolute.to_owned();
        }

        if let Some(rest) = path.strip_prefix("/~") {
            return format!("{}{rest}", self.home);
        }

        if path.starts_with(&self.home) {
            path.to_owned()
        } else {
            format!("{}{path}", self.home)
        }
    }

    /// Joins a directory and a file name with a single separator and resolves
    /// the result.
    #[must_use]
    pub fn resolve_join(&self, dir: &str, name: &str) -> String {
        self.resolve(&join(dir, name))
    }
}

/// Joins two path segments with exactly one `/` between them.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Returns the last path segment of `path` (the part after the final `/`).
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new("/home/user")
    }

    #[test]
    fn plain_path_gets_home_prefix() {
        assert_eq!(resolver().resolve("/foo"), "/home/user/foo");
    }

    #[test]
    fn double_slash_is_absolute() {
        assert_eq!(resolver().resolve("//opt/x"), "/opt/x");
    }

    #[test]
    fn tilde_segment_reanchors_at_home() {
        assert_eq!(resolver().resolve("/~/x"), "/home/user/x");
    }

    #[test]
    fn path_already_under_home_is_unchanged() {
        assert_eq!(resolver().resolve("/home/user/inbound"), "/home/user/inbound");
    }

    #[test]
    fn resolution_is_not_idempotent_on_double_slash_input() {
        let first = resolver().resolve("//opt/x");
        assert_eq!(first, "/opt/x");
        // A second application no longer sees the '//' marker and re-prefixes
        // home. Single-application discipline is on the caller.
        assert_eq!(resolver().resolve(&first), "/home/user/opt/x");
    }

    #[test]
    fn join_inserts_single_separator() {
        assert_eq!(join("/data/in", "a.txt"), "/data/in/a.txt");
        assert_eq!(join("/data/in/", "a.txt"), "/data/in/a.txt");
    }

    #[test]
    fn file_name_takes_last_segment() {
        assert_eq!(file_name("/data/in/a.txt"), "a.txt");
        assert_eq!(file_name("a.txt"), "a.txt");
        assert_eq!(file_name("tmp/a.txt"), "a.txt");
    }

    #[test]
    fn resolve_join_combines_and_resolves() {
        assert_eq!(
            resolver().resolve_join("/inbound", "a.txt"),
            "/home/user/inbound/a.txt"
        );
    }
}
