#![deny(unsafe_code)]

//! The `ssh2`-backed production session.
//!
//! One [`SftpSession`] owns one TCP connection, one SSH session, and one SFTP
//! channel. Construction performs connect + login + channel setup and
//! captures the remote home directory, after which the session is handed to
//! exactly one logical operation and then released.

use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::endpoint::{Credential, RemoteEndpoint};
use crate::error::ClientError;
use crate::fs::{FileAttrs, RemoteFs, SessionFactory};
use crate::resolve::PathResolver;

/// A single authenticated SFTP session.
///
/// Not shareable: use from one thread for one logical operation, then
/// [`close`](RemoteFs::close). Dropping an unclosed session disconnects
/// best-effort.
pub struct SftpSession {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
    resolver: PathResolver,
    current_dir: String,
    host: String,
    closed: bool,
}

impl SftpSession {
    /// Connects, authenticates, opens the SFTP channel, and captures the
    /// session home directory.
    pub fn connect(endpoint: &RemoteEndpoint) -> Result<Self, ClientError> {
        let host = endpoint.host().to_owned();
        let stream =
            TcpStream::connect((host.as_str(), endpoint.port())).map_err(|source| {
                ClientError::Connect {
                    host: host.clone(),
                    port: endpoint.port(),
                    source,
                }
            })?;

        let mut session = ssh2::Session::new().map_err(|source| ClientError::Handshake {
            host: host.clone(),
            source,
        })?;
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|source| ClientError::Handshake {
                host: host.clone(),
                source,
            })?;

        authenticate(&session, endpoint, &host)?;

        let sftp = session.sftp().map_err(|source| ClientError::Handshake {
            host: host.clone(),
            source,
        })?;

        let home = sftp
            .realpath(Path::new("."))
            .map_err(|source| ClientError::op("realpath", ".", &source))?
            .to_string_lossy()
            .into_owned();
        debug!(host = %host, home = %home, "sftp session established");

        Ok(Self {
            session,
            sftp,
            resolver: PathResolver::new(home),
            current_dir: String::new(),
            host,
            closed: false,
        })
    }

    /// The path resolver anchored at this session's home directory.
    #[must_use]
    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Remote host this session is connected to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn list_entries(
        &mut self,
        path: &str,
        want_dirs: bool,
    ) -> Result<Vec<String>, ClientError> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|source| ClientError::op("list", path, &source))?;

        let mut names = Vec::with_capacity(entries.len());
        for (entry_path, stat) in entries {
            if stat.is_dir() != want_dirs {
                continue;
            }
            if let Some(name) = entry_path.file_name() {
                names.push(name.to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

fn authenticate(
    session: &ssh2::Session,
    endpoint: &RemoteEndpoint,
    host: &str,
) -> Result<(), ClientError> {
    let user = endpoint.user();
    match endpoint.credential() {
        Credential::Password(password) => session
            .userauth_password(user, password)
            .map_err(|source| ClientError::Auth {
                user: user.to_owned(),
                host: host.to_owned(),
                source,
            }),
        Credential::IdentityFile { path, passphrase } => {
            if !path.exists() {
                return Err(ClientError::IdentityFileMissing { path: path.clone() });
            }
            let passphrase = passphrase.as_deref().filter(|p| !p.is_empty());
            session
                .userauth_pubkey_file(user, None, path, passphrase)
                .map_err(|source| ClientError::Auth {
                    user: user.to_owned(),
                    host: host.to_owned(),
                    source,
                })
        }
    }
}

impl RemoteFs for SftpSession {
    fn home(&self) -> &str {
        self.resolver.home()
    }

    fn current_dir(&self) -> &str {
        &self.current_dir
    }

    fn change_dir(&mut self, path: &str) -> Result<(), ClientError> {
        debug!(path = %path, "attempting to cwd");
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|source| ClientError::ChangeDir {
                path: path.to_owned(),
                reason: source.to_string(),
            })?;
        if !stat.is_dir() {
            return Err(ClientError::ChangeDir {
                path: path.to_owned(),
                reason: "not a directory".to_owned(),
            });
        }
        self.current_dir = path.to_owned();
        Ok(())
    }

    fn list_files(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        self.list_entries(path, false)
    }

    fn list_directories(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        self.list_entries(path, true)
    }

    fn stat(&mut self, path: &str) -> Result<FileAttrs, ClientError> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|source| ClientError::op("stat", path, &source))?;
        let mtime = stat.mtime.unwrap_or(0);
        Ok(FileAttrs {
            size: stat.size.unwrap_or(0),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(mtime),
        })
    }

    fn open_read(&mut self, path: &str) -> Result<Box<dyn Read + Send>, ClientError> {
        let file = self
            .sftp
            .open(Path::new(path))
            .map_err(|source| ClientError::op("get", path, &source))?;
        Ok(Box::new(file))
    }

    fn put(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, ClientError> {
        debug!(path = %path, "streaming payload to remote");
        let mut remote = self
            .sftp
            .create(Path::new(path))
            .map_err(|source| ClientError::op("put", path, &source))?;
        let written =
            std::io::copy(reader, &mut remote).map_err(|source| ClientError::Operation {
                op: "put",
                path: path.to_owned(),
                reason: source.to_string(),
            })?;
        Ok(written)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), ClientError> {
        debug!(from = %from, to = %to, "renaming remote file");
        self.sftp
            .rename(Path::new(from), Path::new(to), None)
            .map_err(|source| ClientError::op("rename", from, &source))
    }

    fn remove_file(&mut self, path: &str) -> Result<(), ClientError> {
        debug!(path = %path, "deleting remote file");
        self.sftp
            .unlink(Path::new(path))
            .map_err(|source| ClientError::op("delete", path, &source))
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), ClientError> {
        self.sftp
            .rmdir(Path::new(path))
            .map_err(|source| ClientError::op("rmdir", path, &source))
    }

    fn make_dir(&mut self, path: &str) -> Result<(), ClientError> {
        debug!(path = %path, "creating remote directory");
        self.sftp
            .mkdir(Path::new(path), 0o755)
            .map_err(|source| ClientError::Mkdir {
                path: path.to_owned(),
                reason: source.to_string(),
            })
    }

    fn set_permissions(&mut self, path: &str, mode: u32) -> Result<(), ClientError> {
        let stat = ssh2::FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode),
            atime: None,
            mtime: None,
        };
        self.sftp
            .setstat(Path::new(path), stat)
            .map_err(|source| ClientError::op("chmod", path, &source))
    }

    fn connected(&self) -> bool {
        !self.closed && self.session.authenticated()
    }

    fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session
            .disconnect(None, "session released", None)
            .map_err(|source| ClientError::Operation {
                op: "disconnect",
                path: self.host.clone(),
                reason: source.to_string(),
            })
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        if !self.closed {
            // Best-effort release; errors cannot propagate from drop.
            let _ = self.session.disconnect(None, "session released", None);
        }
    }
}

/// [`SessionFactory`] that opens [`SftpSession`]s for a fixed endpoint.
#[derive(Clone, Debug)]
pub struct EndpointSessionFactory {
    endpoint: RemoteEndpoint,
}

impl EndpointSessionFactory {
    /// Creates a factory for `endpoint`.
    #[must_use]
    pub const fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }

    /// The endpoint this factory connects to.
    #[must_use]
    pub const fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }
}

impl SessionFactory for EndpointSessionFactory {
    fn open(&self) -> Result<Box<dyn RemoteFs>, ClientError> {
        Ok(Box::new(SftpSession::connect(&self.endpoint)?))
    }
}
