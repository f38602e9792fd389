//! Error taxonomy shared by every layer of the crate.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field is absent from the metadata.
    #[error("couldn't read '{field}' for segment '{segment}'")]
    ConfigMissing { field: String, segment: String },

    /// A field is present but cannot be interpreted.
    #[error("couldn't read '{field}' for segment {segment} of logical volume {lv}: {reason}")]
    ConfigMalformed {
        field: String,
        segment: String,
        lv: String,
        reason: String,
    },

    /// A referenced logical volume does not exist in the volume group.
    #[error("couldn't find volume '{name}' for segment '{segment}'")]
    Lookup { name: String, segment: String },

    /// The area list disagrees with the declared device count.
    #[error("incorrect number of areas in area array for segment '{segment}': {detail}")]
    CountMismatch { segment: String, detail: String },

    /// A parameter required to build a kernel target is unset.
    #[error("{0}")]
    State(String),

    /// A kernel status line could not be parsed.
    #[error("failed to parse {segtype} status fraction: {text}")]
    Parse { segtype: String, text: String },

    /// The metadata text itself is not well formed.
    #[error("metadata syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// The segment type named in the metadata is not registered.
    #[error("unknown segment type '{0}'")]
    UnknownSegmentType(String),

    /// The running kernel lacks a required device-mapper target.
    #[error("kernel does not support device-mapper target '{0}'")]
    KernelFeatureMissing(String),

    #[error("{op} failed on {device}: {source}")]
    Io {
        op: &'static str,
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("device '{0}' has already been opened")]
    AlreadyOpen(String),

    #[error("attempt to use unopened device {0}")]
    NotOpen(String),

    /// A zero fill stopped before covering the requested range.
    #[error("partial write on {device}: {remaining} of {requested} bytes not written")]
    PartialWrite {
        device: String,
        requested: u64,
        remaining: u64,
    },

    /// An invariant was violated by the caller; this is a programming defect.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Emits the error at the point of detection and hands it back for `?`.
    #[must_use]
    pub fn logged(self) -> Self {
        tracing::error!("{self}");
        self
    }

    pub(crate) fn io(op: &'static str, device: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            op,
            device: device.into(),
            source,
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
