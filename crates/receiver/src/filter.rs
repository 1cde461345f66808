#![deny(unsafe_code)]

//! Filename filtering for poll-cycle candidates.

/// Decides whether a listed file name is a transfer candidate.
pub trait FilenameFilter: Send + Sync {
    /// Returns `true` when `name` should be considered for transfer.
    fn accept(&self, name: &str) -> bool;
}

/// Accepts every name.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl FilenameFilter for AcceptAll {
    fn accept(&self, _name: &str) -> bool {
        true
    }
}

/// Glob-style name filter supporting `*` (any run) and `?` (any single
/// character).
#[derive(Clone, Debug)]
pub struct GlobFilter {
    pattern: String,
}

impl GlobFilter {
    /// Creates a filter from a glob pattern such as `*.csv`.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// The pattern this filter was built from.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl FilenameFilter for GlobFilter {
    fn accept(&self, name: &str) -> bool {
        wildcard_match(&self.pattern, name)
    }
}

/// Backtracking byte-wise matcher; only `*` and `?` are special.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p = pattern.as_bytes();
    let s = name.as_bytes();
    let (mut pi, mut si) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut match_i = 0usize;
    while si < s.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some(pi);
            pi += 1;
            match_i = si;
        } else if let Some(star_i) = star {
            pi = star_i + 1;
            match_i += 1;
            si = match_i;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        let filter = GlobFilter::new("*.csv");
        assert!(filter.accept("orders.csv"));
        assert!(filter.accept(".csv"));
        assert!(!filter.accept("orders.csv.bak"));
        assert!(!filter.accept("orders.txt"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let filter = GlobFilter::new("report_?.txt");
        assert!(filter.accept("report_1.txt"));
        assert!(!filter.accept("report_10.txt"));
        assert!(!filter.accept("report_.txt"));
    }

    #[test]
    fn literal_pattern_is_exact() {
        let filter = GlobFilter::new("exact.bin");
        assert!(filter.accept("exact.bin"));
        assert!(!filter.accept("exact.bin2"));
    }

    #[test]
    fn interior_star_backtracks() {
        let filter = GlobFilter::new("a*b*c");
        assert!(filter.accept("abc"));
        assert!(filter.accept("axxbyyc"));
        assert!(!filter.accept("axxbyy"));
    }

    #[test]
    fn accept_all_accepts_everything() {
        assert!(AcceptAll.accept("anything"));
        assert!(AcceptAll.accept(""));
    }
}
