#![deny(unsafe_code)]

//! Immutable connection descriptors.
//!
//! A [`RemoteEndpoint`] captures everything needed to open one session: host,
//! port, user, credential, and the remote root path the endpoint operates
//! under. Endpoints are constructed from configuration via the builder and
//! never mutated afterwards.

use std::path::PathBuf;

/// Default SSH port used when the configuration does not name one.
pub const DEFAULT_PORT: u16 = 22;

/// Authentication material for a [`RemoteEndpoint`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Credential {
    /// Plain password authentication.
    Password(String),
    /// Public-key authentication with a private-key file and an optional
    /// passphrase.
    IdentityFile {
        /// Path to the private-key file on the local filesystem.
        path: PathBuf,
        /// Passphrase protecting the key, if any. An empty string is treated
        /// the same as no passphrase.
        passphrase: Option<String>,
    },
}

/// Immutable descriptor for one logical SFTP connection target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteEndpoint {
    host: String,
    port: u16,
    user: String,
    credential: Credential,
    root_path: String,
}

impl RemoteEndpoint {
    /// Creates a new [`RemoteEndpointBuilder`].
    #[must_use]
    pub fn builder() -> RemoteEndpointBuilder {
        RemoteEndpointBuilder::default()
    }

    /// Remote host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// User name presented at login.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Authentication material.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Remote root path the endpoint operates under, as configured (possibly
    /// relative; resolved against the session home after login).
    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }
}

/// Builder assembling a [`RemoteEndpoint`].
#[derive(Clone, Debug, Default)]
pub struct RemoteEndpointBuilder {
    host: String,
    port: Option<u16>,
    user: String,
    credential: Option<Credential>,
    root_path: String,
}

impl RemoteEndpointBuilder {
    /// Sets the remote host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the remote port. Defaults to [`DEFAULT_PORT`].
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the login user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets password authentication.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::Password(password.into()));
        self
    }

    /// Sets identity-file authentication.
    #[must_use]
    pub fn identity_file(
        mut self,
        path: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        self.credential = Some(Credential::IdentityFile {
            path: path.into(),
            passphrase,
        });
        self
    }

    /// Sets the remote root path.
    #[must_use]
    pub fn root_path(mut self, path: impl Into<String>) -> Self {
        self.root_path = path.into();
        self
    }

    /// Finalizes the descriptor.
    ///
    /// Returns `None` when host, user, or credential is missing.
    #[must_use]
    pub fn build(self) -> Option<RemoteEndpoint> {
        if self.host.is_empty() || self.user.is_empty() {
            return None;
        }
        Some(RemoteEndpoint {
            host: self.host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            user: self.user,
            credential: self.credential?,
            root_path: self.root_path,
        })
    }
}
