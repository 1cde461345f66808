#![deny(unsafe_code)]

//! Overlay structs and the first-non-null-wins resolution stack.

use std::path::PathBuf;

use serde::Deserialize;

use crate::policy::DuplicatePolicy;

/// Default poll interval when no layer configures one.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;

/// One configuration layer. Every field is optional; unset fields defer to
/// the next layer down the stack.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SettingsOverlay {
    /// Remote directory the endpoint operates in.
    pub directory: Option<String>,
    /// Poll interval for the inbound receiver, in milliseconds.
    pub polling_interval_ms: Option<u64>,
    /// Delete the remote source after successful downstream consumption.
    pub auto_delete: Option<bool>,
    /// Output filename pattern used when the caller names no file.
    pub output_pattern: Option<String>,
    /// Password credential.
    pub password: Option<String>,
    /// Identity-file credential.
    pub identity_file: Option<PathBuf>,
    /// Passphrase for the identity file.
    pub passphrase: Option<String>,
    /// Minimum file age before an inbound candidate is considered settled,
    /// in milliseconds. Zero disables the check.
    pub file_age_ms: Option<u64>,
    /// Delay between the two size observations of the stability check, in
    /// milliseconds. Zero disables the check.
    pub size_check_wait_ms: Option<u64>,
    /// Remote temp directory used to reserve inbound files before download.
    pub temp_dir_inbound: Option<String>,
    /// Remote temp directory outbound uploads are staged in.
    pub temp_dir_outbound: Option<String>,
    /// Add a timestamp suffix to in-flight transfer names.
    pub use_temp_file_timestamp_suffix: Option<bool>,
    /// Duplicate-handling policy at the outbound destination.
    pub duplicate_handling: Option<DuplicatePolicy>,
    /// Local archive directory for received files.
    pub archive_dir: Option<PathBuf>,
    /// Receiving-side temp directory under the archive directory.
    pub archive_temp_receiving_dir: Option<String>,
    /// Sending-side temp directory under the archive directory.
    pub archive_temp_sending_dir: Option<String>,
    /// Keep the source file in place when downstream processing fails.
    pub keep_file_on_error: Option<bool>,
}

macro_rules! first_set {
    ($layers:expr, $field:ident) => {
        $layers.iter().find_map(|layer| layer.$field.clone())
    };
}

/// Ordered stack of [`SettingsOverlay`]s, most specific first.
#[derive(Clone, Debug, Default)]
pub struct SettingsStack {
    layers: Vec<SettingsOverlay>,
}

impl SettingsStack {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends a layer below all layers added so far. The first call adds
    /// the highest-precedence layer.
    #[must_use]
    pub fn over(mut self, layer: SettingsOverlay) -> Self {
        self.layers.push(layer);
        self
    }

    /// Resolves every tunable: for each field, the first layer that sets it
    /// wins; built-in defaults apply when no layer does.
    #[must_use]
    pub fn resolve(&self) -> Settings {
        let layers = &self.layers;
        Settings {
            directory: first_set!(layers, directory).unwrap_or_default(),
            polling_interval_ms: first_set!(layers, polling_interval_ms)
                .unwrap_or(DEFAULT_POLLING_INTERVAL_MS),
            auto_delete: first_set!(layers, auto_delete).unwrap_or(true),
            output_pattern: first_set!(layers, output_pattern),
            password: first_set!(layers, password),
            identity_file: first_set!(layers, identity_file),
            passphrase: first_set!(layers, passphrase),
            file_age_ms: first_set!(layers, file_age_ms).unwrap_or(0),
            size_check_wait_ms: first_set!(layers, size_check_wait_ms).unwrap_or(0),
            temp_dir_inbound: first_set!(layers, temp_dir_inbound),
            temp_dir_outbound: first_set!(layers, temp_dir_outbound),
            use_temp_file_timestamp_suffix: first_set!(layers, use_temp_file_timestamp_suffix)
                .unwrap_or(false),
            duplicate_handling: first_set!(layers, duplicate_handling).unwrap_or_default(),
            archive_dir: first_set!(layers, archive_dir),
            archive_temp_receiving_dir: first_set!(layers, archive_temp_receiving_dir),
            archive_temp_sending_dir: first_set!(layers, archive_temp_sending_dir),
            keep_file_on_error: first_set!(layers, keep_file_on_error).unwrap_or(false),
        }
    }
}

/// Fully resolved settings with defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Remote directory the endpoint operates in.
    pub directory: String,
    /// Poll interval for the inbound receiver, in milliseconds.
    pub polling_interval_ms: u64,
    /// Delete the remote source after successful downstream consumption.
    pub auto_delete: bool,
    /// Output filename pattern used when the caller names no file.
    pub output_pattern: Option<String>,
    /// Password credential.
    pub password: Option<String>,
    /// Identity-file credential.
    pub identity_file: Option<PathBuf>,
    /// Passphrase for the identity file.
    pub passphrase: Option<String>,
    /// Minimum file age in milliseconds; zero disables the age check.
    pub file_age_ms: u64,
    /// Size-check delay in milliseconds; zero disables the size check.
    pub size_check_wait_ms: u64,
    /// Remote temp directory used to reserve inbound files before download.
    pub temp_dir_inbound: Option<String>,
    /// Remote temp directory outbound uploads are staged in.
    pub temp_dir_outbound: Option<String>,
    /// Add a timestamp suffix to in-flight transfer names.
    pub use_temp_file_timestamp_suffix: bool,
    /// Duplicate-handling policy at the outbound destination.
    pub duplicate_handling: DuplicatePolicy,
    /// Local archive directory for received files.
    pub archive_dir: Option<PathBuf>,
    /// Receiving-side temp directory under the archive directory.
    pub archive_temp_receiving_dir: Option<String>,
    /// Sending-side temp directory under the archive directory.
    pub archive_temp_sending_dir: Option<String>,
    /// Keep the source file in place when downstream processing fails.
    pub keep_file_on_error: bool,
}

impl Settings {
    /// Whether outbound uploads are staged through a temp directory.
    #[must_use]
    pub const fn use_temp_dir_outbound(&self) -> bool {
        self.temp_dir_outbound.is_some()
    }

    /// Whether inbound files are reserved through a temp directory.
    #[must_use]
    pub const fn use_temp_dir_inbound(&self) -> bool {
        self.temp_dir_inbound.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_on_empty_stack() {
        let settings = SettingsStack::new().resolve();
        assert!(settings.auto_delete);
        assert_eq!(settings.polling_interval_ms, DEFAULT_POLLING_INTERVAL_MS);
        assert_eq!(settings.file_age_ms, 0);
        assert_eq!(settings.duplicate_handling, DuplicatePolicy::ThrowException);
        assert!(!settings.use_temp_dir_outbound());
        assert!(!settings.keep_file_on_error);
    }

    #[test]
    fn endpoint_layer_overrides_connector_layer() {
        let endpoint = SettingsOverlay {
            file_age_ms: Some(30_000),
            temp_dir_outbound: Some("staging".to_owned()),
            ..SettingsOverlay::default()
        };
        let connector = SettingsOverlay {
            file_age_ms: Some(5_000),
            size_check_wait_ms: Some(250),
            duplicate_handling: Some(DuplicatePolicy::AppendSequenceNumber),
            ..SettingsOverlay::default()
        };

        let settings = SettingsStack::new().over(endpoint).over(connector).resolve();
        assert_eq!(settings.file_age_ms, 30_000);
        assert_eq!(settings.size_check_wait_ms, 250);
        assert_eq!(
            settings.duplicate_handling,
            DuplicatePolicy::AppendSequenceNumber
        );
        assert_eq!(settings.temp_dir_outbound.as_deref(), Some("staging"));
        assert!(settings.use_temp_dir_outbound());
    }

    #[test]
    fn overlay_deserializes_from_json() {
        let overlay: SettingsOverlay = serde_json::from_str(
            r#"{
                "directory": "/data/inbound",
                "autoDelete": false,
                "duplicateHandling": "addSeqNo",
                "archiveDir": "/var/archive",
                "sizeCheckWaitMs": 100
            }"#,
        )
        .expect("valid overlay");
        let settings = SettingsStack::new().over(overlay).resolve();
        assert_eq!(settings.directory, "/data/inbound");
        assert!(!settings.auto_delete);
        assert_eq!(
            settings.duplicate_handling,
            DuplicatePolicy::AppendSequenceNumber
        );
        assert_eq!(settings.archive_dir.as_deref(), Some(std::path::Path::new("/var/archive")));
        assert_eq!(settings.size_check_wait_ms, 100);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<SettingsOverlay>(r#"{"dir": "/x"}"#);
        assert!(parsed.is_err());
    }
}
