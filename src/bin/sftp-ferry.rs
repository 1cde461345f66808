#![deny(unsafe_code)]

//! `sftp-ferry` command-line entry point.
//!
//! Two subcommands wire the library crates together: `send` pushes one local
//! file through the staged outbound protocol, `poll` runs the inbound
//! polling receiver and writes fetched files into a local directory.
//! Settings resolve through a layered stack: command-line flags override the
//! optional JSON settings file, which overrides built-in defaults.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use client::{
    ClientError, EndpointSessionFactory, PathResolver, RemoteEndpoint, RemoteFs, SftpSession,
};
use receiver::{Delivery, DeliveryError, GlobFilter, PollingReceiver, ReceiverError};
use settings::{Settings, SettingsOverlay, SettingsStack};
use transfer::naming::render_output_pattern_now;
use transfer::{dispatch, Deliverable, ErrorFlaggable, PlainSource, SendOptions, TransferError};

#[derive(Parser)]
#[command(name = "sftp-ferry", version, about = "Reliable SFTP file transfer")]
struct Cli {
    /// JSON settings file providing a base configuration layer.
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. `debug`, `transfer=trace`).
    #[arg(long, global = true, default_value = "info", value_name = "FILTER")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one local file through the staged outbound protocol.
    Send {
        #[command(flatten)]
        connect: ConnectArgs,
        #[command(flatten)]
        overlay: OverlayArgs,
        /// Destination filename; defaults to the configured output pattern,
        /// then to the local file's name.
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
        /// Local file to upload.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Poll the remote directory and fetch settled files.
    Poll {
        #[command(flatten)]
        connect: ConnectArgs,
        #[command(flatten)]
        overlay: OverlayArgs,
        /// Glob filter applied to listed names (`*` and `?`).
        #[arg(long, value_name = "PATTERN")]
        pattern: Option<String>,
        /// Local directory fetched files are written into.
        #[arg(long, default_value = ".", value_name = "DIR")]
        output_dir: PathBuf,
        /// Run a single poll cycle and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Args)]
struct ConnectArgs {
    /// Remote host name or address.
    #[arg(long)]
    host: String,

    /// Remote SSH port.
    #[arg(long, default_value_t = client::endpoint::DEFAULT_PORT)]
    port: u16,

    /// Login user.
    #[arg(long)]
    user: String,
}

/// Settings fields exposed as flags; each one set becomes the topmost
/// configuration layer.
#[derive(Args, Default)]
struct OverlayArgs {
    /// Remote directory to operate in.
    #[arg(long, value_name = "PATH")]
    directory: Option<String>,

    /// Password credential.
    #[arg(long)]
    password: Option<String>,

    /// Identity-file credential.
    #[arg(long, value_name = "FILE")]
    identity_file: Option<PathBuf>,

    /// Passphrase for the identity file.
    #[arg(long)]
    passphrase: Option<String>,

    /// Remote temp directory for staged uploads (outbound).
    #[arg(long, value_name = "DIR")]
    temp_dir_outbound: Option<String>,

    /// Remote temp directory for reserving inbound files.
    #[arg(long, value_name = "DIR")]
    temp_dir_inbound: Option<String>,

    /// Timestamp-suffix in-flight transfer names.
    #[arg(long)]
    timestamp_suffix: bool,

    /// Duplicate-handling policy (throwException, overwrite, addSeqNo).
    #[arg(long, value_name = "POLICY")]
    duplicate_handling: Option<settings::DuplicatePolicy>,

    /// Local archive directory for received files.
    #[arg(long, value_name = "DIR")]
    archive_dir: Option<PathBuf>,

    /// Keep the remote source file after successful consumption.
    #[arg(long)]
    no_auto_delete: bool,

    /// Move a reserve-moved file back to the source directory when delivery
    /// fails, so the next poll sees it again.
    #[arg(long)]
    keep_file_on_error: bool,

    /// Minimum candidate age in milliseconds.
    #[arg(long, value_name = "MS")]
    file_age_ms: Option<u64>,

    /// Size-stability check delay in milliseconds.
    #[arg(long, value_name = "MS")]
    size_check_wait_ms: Option<u64>,

    /// Poll interval in milliseconds.
    #[arg(long, value_name = "MS")]
    polling_interval_ms: Option<u64>,

    /// Output filename pattern (`#[timestamp]` is substituted).
    #[arg(long, value_name = "PATTERN")]
    output_pattern: Option<String>,
}

impl OverlayArgs {
    fn into_overlay(self) -> SettingsOverlay {
        SettingsOverlay {
            directory: self.directory,
            polling_interval_ms: self.polling_interval_ms,
            auto_delete: self.no_auto_delete.then_some(false),
            output_pattern: self.output_pattern,
            password: self.password,
            identity_file: self.identity_file,
            passphrase: self.passphrase,
            file_age_ms: self.file_age_ms,
            size_check_wait_ms: self.size_check_wait_ms,
            temp_dir_inbound: self.temp_dir_inbound,
            temp_dir_outbound: self.temp_dir_outbound,
            use_temp_file_timestamp_suffix: self.timestamp_suffix.then_some(true),
            duplicate_handling: self.duplicate_handling,
            archive_dir: self.archive_dir,
            archive_temp_receiving_dir: None,
            archive_temp_sending_dir: None,
            keep_file_on_error: self.keep_file_on_error.then_some(true),
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not read settings file {}: {source}", path.display())]
    SettingsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no credential configured: set a password or an identity file")]
    MissingCredential,

    #[error("no destination filename: pass --name, configure an output pattern, or use a named local file")]
    MissingFilename,

    #[error("could not read local file {}: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Receiver(#[from] ReceiverError),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::SettingsFile { .. }
            | Self::SettingsParse { .. }
            | Self::MissingCredential
            | Self::MissingFilename
            | Self::LocalFile { .. } => ExitCode::from(2),
            Self::Client(_) => ExitCode::from(3),
            Self::Transfer(_) => ExitCode::from(4),
            Self::Receiver(_) => ExitCode::from(5),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("sftp-ferry: {err}");
            err.exit_code()
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let file_layer = load_settings_file(cli.settings.as_deref())?;

    match cli.command {
        Command::Send {
            connect,
            overlay,
            name,
            file,
        } => {
            let settings = resolve_settings(overlay, file_layer);
            run_send(&connect, &settings, name, &file)
        }
        Command::Poll {
            connect,
            overlay,
            pattern,
            output_dir,
            once,
        } => {
            let settings = resolve_settings(overlay, file_layer);
            run_poll(&connect, &settings, pattern, &output_dir, once)
        }
    }
}

fn load_settings_file(path: Option<&Path>) -> Result<SettingsOverlay, CliError> {
    let Some(path) = path else {
        return Ok(SettingsOverlay::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::SettingsFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::SettingsParse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_settings(cli_layer: OverlayArgs, file_layer: SettingsOverlay) -> Settings {
    SettingsStack::new()
        .over(cli_layer.into_overlay())
        .over(file_layer)
        .resolve()
}

fn endpoint_for(connect: &ConnectArgs, settings: &Settings) -> Result<RemoteEndpoint, CliError> {
    let builder = RemoteEndpoint::builder()
        .host(&connect.host)
        .port(connect.port)
        .user(&connect.user)
        .root_path(&settings.directory);

    let builder = if let Some(password) = &settings.password {
        builder.password(password)
    } else if let Some(identity) = &settings.identity_file {
        builder.identity_file(identity, settings.passphrase.clone())
    } else {
        return Err(CliError::MissingCredential);
    };

    builder.build().ok_or(CliError::MissingCredential)
}

fn run_send(
    connect: &ConnectArgs,
    settings: &Settings,
    name: Option<String>,
    file: &Path,
) -> Result<(), CliError> {
    let desired_name = match name {
        Some(name) => name,
        None => match &settings.output_pattern {
            Some(pattern) => render_output_pattern_now(pattern),
            None => file
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned)
                .ok_or(CliError::MissingFilename)?,
        },
    };

    let local = File::open(file).map_err(|source| CliError::LocalFile {
        path: file.to_path_buf(),
        source,
    })?;

    let endpoint = endpoint_for(connect, settings)?;
    let session: Box<dyn RemoteFs> = Box::new(SftpSession::connect(&endpoint)?);
    let dest_dir = PathResolver::new(session.home()).resolve(&settings.directory);
    let options = SendOptions::from_settings(settings);

    let final_name = dispatch(
        session,
        Box::new(PlainSource::new(local)),
        &dest_dir,
        &desired_name,
        &options,
    )?;
    info!(final_name = %final_name, dest_dir = %dest_dir, "file sent");
    println!("{final_name}");
    Ok(())
}

/// Writes each fetched file into a local directory under its original name.
struct LocalDirDelivery {
    output_dir: PathBuf,
}

impl Delivery for LocalDirDelivery {
    fn deliver(
        &mut self,
        mut stream: Deliverable,
        original_filename: &str,
    ) -> Result<(), DeliveryError> {
        let target = self.output_dir.join(original_filename);
        let result = File::create(&target).and_then(|mut out| io::copy(&mut stream, &mut out));
        match result {
            Ok(bytes) => {
                info!(file = original_filename, bytes, "file received");
                stream.close().map_err(DeliveryError::from)?;
                Ok(())
            }
            Err(err) => {
                // The bytes never landed; the remote source must survive.
                stream.set_error_occurred();
                if let Err(close_err) = stream.close() {
                    error!(error = %close_err, "error while closing rejected stream");
                }
                Err(err.into())
            }
        }
    }
}

fn run_poll(
    connect: &ConnectArgs,
    settings: &Settings,
    pattern: Option<String>,
    output_dir: &Path,
    once: bool,
) -> Result<(), CliError> {
    let endpoint = endpoint_for(connect, settings)?;
    let factory = Arc::new(EndpointSessionFactory::new(endpoint));
    let mut poller = PollingReceiver::from_settings(factory, settings);
    if let Some(pattern) = pattern {
        poller = poller.with_filter(Box::new(GlobFilter::new(pattern)));
    }

    let mut delivery = LocalDirDelivery {
        output_dir: output_dir.to_path_buf(),
    };

    if once {
        let report = poller.poll(&mut delivery)?;
        for failure in &report.failures {
            error!(error = %failure, "file processing failed");
        }
        info!(delivered = report.delivered, "poll cycle complete");
        return match report.failures.into_iter().next() {
            None => Ok(()),
            Some(failure) => Err(failure.into()),
        };
    }

    // Runs until the process is terminated; the sender stays alive so the
    // loop never sees a disconnect.
    let (_shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    poller.run(&mut delivery, &shutdown_rx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::MemoryRemoteFs;
    use transfer::{fetch_for_delivery, FetchOptions};

    #[test]
    fn failed_local_write_keeps_the_remote_source() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"payload");
        let handle = fs.handle();
        let options = FetchOptions {
            auto_delete: true,
            ..FetchOptions::default()
        };
        let deliverable = fetch_for_delivery(Box::new(fs), "/in", "a.txt", &options).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut delivery = LocalDirDelivery {
            // A missing parent directory makes the local create fail.
            output_dir: dir.path().join("missing"),
        };
        assert!(delivery.deliver(deliverable, "a.txt").is_err());

        // Auto-delete must not run after a failed delivery.
        assert!(handle.has_file("/in/a.txt"));
        assert!(handle.is_closed());
    }
}
