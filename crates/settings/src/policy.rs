#![deny(unsafe_code)]

//! Duplicate-handling policy names.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Strategy applied when the desired outbound file name already exists at the
/// destination.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
pub enum DuplicatePolicy {
    /// Fail the transfer with a descriptive error (the default).
    #[default]
    #[serde(rename = "throwException")]
    ThrowException,
    /// Overwrite the existing file. Deliberately unimplemented: selecting it
    /// fails loudly instead of silently clobbering data.
    #[serde(rename = "overwrite")]
    Overwrite,
    /// Probe `stem`, `stem_1`, `stem_2`, ... until a free name is found.
    #[serde(rename = "addSeqNo")]
    AppendSequenceNumber,
}

impl DuplicatePolicy {
    /// The configuration name of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThrowException => "throwException",
            Self::Overwrite => "overwrite",
            Self::AppendSequenceNumber => "addSeqNo",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throwException" => Ok(Self::ThrowException),
            "overwrite" => Ok(Self::Overwrite),
            "addSeqNo" => Ok(Self::AppendSequenceNumber),
            other => Err(UnknownPolicy(other.to_owned())),
        }
    }
}

/// Error produced when a configured policy name is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown duplicate-handling policy: {0}")]
pub struct UnknownPolicy(pub String);
