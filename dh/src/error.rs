//! Structured error type for the DH engine.
//!
//! Replaces the original engine's per-process `dh_err`/`os_error` globals
//! (see the design notes in `SPEC_FULL.md`) with a single error carrying
//! enough context (subfile, group, byte offset, underlying OS error) for a
//! caller to log or report without re-deriving it.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which subfile an operation was touching when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subfile {
    Primary,
    Overflow,
    Index(u8),
}

impl fmt::Display for Subfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "~0"),
            Self::Overflow => write!(f, "~1"),
            Self::Index(n) => write!(f, "~{}", n + 2),
        }
    }
}

/// Context attached to a structural or resource failure: where in the file
/// the problem was observed.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub subfile: Option<Subfile>,
    pub group: Option<u32>,
    pub offset: Option<u64>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subfile(mut self, s: Subfile) -> Self {
        self.subfile = Some(s);
        self
    }

    pub fn group(mut self, g: u32) -> Self {
        self.group = Some(g);
        self
    }

    pub fn offset(mut self, o: u64) -> Self {
        self.offset = Some(o);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut any = false;
        if let Some(s) = self.subfile {
            write!(f, "subfile {}", s)?;
            any = true;
        }
        if let Some(g) = self.group {
            write!(f, "{}group {}", if any { ", " } else { "" }, g)?;
            any = true;
        }
        if let Some(o) = self.offset {
            write!(f, "{}offset {}", if any { ", " } else { "" }, o)?;
        }
        Ok(())
    }
}

/// Every failure mode the engine can report, grouped per the error
/// taxonomy in `spec.md` §7 (structural / resource / policy / not-found).
#[derive(Debug, Error)]
pub enum DhError {
    /// Invalid `used_bytes`, unknown `block_type`, bad magic, version
    /// mismatch, or a loop in a block chain. Fatal to the in-progress
    /// operation.
    #[error("structural error in {ctx}: {reason}")]
    Structural { reason: &'static str, ctx: ErrorContext },

    /// The requested record does not exist. Not an error condition by
    /// itself; callers of `read`/`exists`/`delete` distinguish it from
    /// `Structural`.
    #[error("record not found")]
    NotFound,

    /// I/O failure reading or writing a subfile.
    #[error("I/O error in {ctx}: {source}")]
    Io { source: io::Error, ctx: ErrorContext },

    /// The group-lock table or file table ran out of slots.
    #[error("resource exhausted: {0}")]
    Resource(&'static str),

    /// Illegal argument to `create_file`, or the directory already exists.
    #[error("policy violation: {0}")]
    Policy(&'static str),

    /// The directory for a DH file could not be created or removed.
    #[error("path error for {path}: {source}")]
    Path { path: PathBuf, source: io::Error },
}

impl DhError {
    pub fn io(source: io::Error, ctx: ErrorContext) -> Self {
        Self::Io { source, ctx }
    }

    pub fn structural(reason: &'static str, ctx: ErrorContext) -> Self {
        Self::Structural { reason, ctx }
    }

    /// True for the one error kind that callers of read/exists/delete treat
    /// as a plain boolean result rather than as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type DhResult<T> = Result<T, DhError>;
