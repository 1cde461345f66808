#![deny(unsafe_code)]

//! Transfer-name helpers: stem/extension splitting, timestamp suffixes, and
//! output-pattern rendering.

use chrono::{DateTime, Local};

/// Format of the uniqueness timestamp: `yyyyMMddHHmmssSSS`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Token in an output pattern replaced by the current timestamp.
const TIMESTAMP_TOKEN: &str = "#[timestamp]";

/// Splits a file name at the last `.` into stem and extension.
///
/// The extension keeps its leading dot; a name without a dot has an empty
/// extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    name.rfind('.')
        .map_or((name, ""), |idx| (&name[..idx], &name[idx..]))
}

/// Appends `_<yyyyMMddHHmmssSSS>` to the stem of `name`, keeping the
/// extension, guaranteeing uniqueness among concurrent writers even when
/// they share a temp directory.
#[must_use]
pub fn timestamp_suffix(name: &str, at: DateTime<Local>) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}_{}{ext}", at.format(TIMESTAMP_FORMAT))
}

/// Like [`timestamp_suffix`] with the current wall-clock time.
#[must_use]
pub fn timestamp_suffix_now(name: &str) -> String {
    timestamp_suffix(name, Local::now())
}

/// Renders an output filename pattern.
///
/// Only the `#[timestamp]` token is substituted; all other text, including
/// unrecognised tokens, is preserved literally.
#[must_use]
pub fn render_output_pattern(pattern: &str, at: DateTime<Local>) -> String {
    pattern.replace(TIMESTAMP_TOKEN, &at.format(TIMESTAMP_FORMAT).to_string())
}

/// Like [`render_output_pattern`] with the current wall-clock time.
#[must_use]
pub fn render_output_pattern_now(pattern: &str) -> String {
    render_output_pattern(pattern, Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 14, 30, 5).unwrap()
    }

    #[test]
    fn split_keeps_leading_dot_on_extension() {
        assert_eq!(split_extension("report.txt"), ("report", ".txt"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
    }

    #[test]
    fn split_without_dot_has_empty_extension() {
        assert_eq!(split_extension("README"), ("README", ""));
    }

    #[test]
    fn suffix_is_inserted_before_extension() {
        let name = timestamp_suffix("report.txt", fixed_time());
        assert!(name.starts_with("report_20240307143005"), "got: {name}");
        assert!(name.ends_with(".txt"), "got: {name}");
        // stem + '_' + 17 timestamp digits + extension
        assert_eq!(name.len(), "report".len() + 1 + 17 + ".txt".len());
    }

    #[test]
    fn suffix_on_extensionless_name() {
        let name = timestamp_suffix("README", fixed_time());
        assert!(name.starts_with("README_20240307143005"), "got: {name}");
        assert!(!name.contains('.'));
    }

    #[test]
    fn pattern_substitutes_timestamp_token() {
        let rendered = render_output_pattern("out-#[timestamp].dat", fixed_time());
        assert!(rendered.starts_with("out-20240307143005"), "got: {rendered}");
        assert!(rendered.ends_with(".dat"));
    }

    #[test]
    fn pattern_preserves_unknown_tokens() {
        assert_eq!(
            render_output_pattern("msg-#[uuid].xml", fixed_time()),
            "msg-#[uuid].xml"
        );
    }
}
