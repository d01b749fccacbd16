// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for RimIO operations.
pub type RimIOResult<T = ()> = core::result::Result<T, RimIOError>;

/// Error type for RimIO operations.
#[derive(Debug, Clone)]
pub enum RimIOError {
    Other(&'static str),
    /// The requested range ends past the device (short read).
    OutOfBounds,
    /// Seek or read failure reported by the OS.
    #[cfg(feature = "std")]
    Io(std::sync::Arc<std::io::Error>),
}

impl RimIOError {
    pub fn msg(&self) -> &'static str {
        match self {
            RimIOError::Other(msg) => msg,
            RimIOError::OutOfBounds => "Out of bounds",
            #[cfg(feature = "std")]
            RimIOError::Io(_) => "I/O error",
        }
    }
}

impl fmt::Display for RimIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "std")]
            RimIOError::Io(e) => write!(f, "{}: {e}", self.msg()),
            _ => write!(f, "{}", self.msg()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RimIOError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RimIOError::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for RimIOError {
    #[cold]
    #[inline(never)]
    fn from(e: std::io::Error) -> Self {
        // read_exact reports a short read as UnexpectedEof
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return RimIOError::OutOfBounds;
        }
        RimIOError::Io(std::sync::Arc::new(e))
    }
}
