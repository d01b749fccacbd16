// SPDX-License-Identifier: MIT

use core::fmt;

use rimio::errors::*;

/// Unified error type for partition table decoding (GPT, MBR).
#[derive(Debug, Clone)]
pub enum PartError {
    /// Seek/read failure on the device. Never retried.
    IO(RimIOError),
    /// Checksum or structure mismatch in a GPT copy.
    Corrupt(&'static str),
    /// Sector 0 matches neither the MBR nor the GPT convention.
    Unsupported(&'static str),
    /// Structurally impossible table (e.g. an extended chain that loops).
    Invalid(&'static str),
}

impl PartError {
    pub fn msg(&self) -> &'static str {
        match self {
            PartError::IO(e) => e.msg(),
            PartError::Corrupt(msg) => msg,
            PartError::Unsupported(msg) => msg,
            PartError::Invalid(msg) => msg,
        }
    }

    #[inline]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, PartError::Corrupt(_))
    }
}

impl From<RimIOError> for PartError {
    fn from(e: RimIOError) -> Self {
        PartError::IO(e)
    }
}

impl fmt::Display for PartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartError::IO(e) => write!(f, "{e}"),
            PartError::Unsupported(msg) => write!(f, "Unsupported partition table: {msg}"),
            _ => write!(f, "{}", self.msg()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PartError::IO(e) => Some(e),
            _ => None,
        }
    }
}

pub type PartResult<T = ()> = Result<T, PartError>;
