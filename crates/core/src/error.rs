//! Core error types for chwire
//!
//! Every failure in the codec and framing layers is a [`ProtocolError`]: an
//! [`ErrorKind`] callers can match on, plus the path of fields that were being
//! processed when it happened. Each layer prepends its own segment on the way
//! out, so `query.settings.value` reads outermost first.

use std::io;

/// What went wrong, independent of where
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fewer bytes were available than the step required.
    #[error("short read: need {needed} bytes, have {available}")]
    ShortRead { needed: usize, available: usize },

    /// A value was decoded but violates a closed set or a format constraint.
    #[error("malformed field: {0}")]
    MalformedField(String),

    /// Block checksum did not match its contents.
    #[error("checksum mismatch: expected {expected:032x}, got {actual:032x}")]
    ChecksumMismatch { expected: u128, actual: u128 },

    /// The negotiated revision lacks a feature this path requires.
    #[error("unsupported revision {revision}: requires {feature}")]
    UnsupportedRevision { revision: u64, feature: &'static str },

    /// The compression transform itself failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The underlying byte source failed.
    #[error("io error: {0:?}")]
    Io(io::ErrorKind),
}

/// An [`ErrorKind`] attributed to a field path
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{kind}", path_prefix(.path))]
pub struct ProtocolError {
    path: Vec<&'static str>,
    kind: ErrorKind,
}

fn path_prefix(path: &[&'static str]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}: ", path.join("."))
    }
}

impl ProtocolError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { path: Vec::new(), kind }
    }

    pub fn short_read(needed: usize, available: usize) -> Self {
        Self::new(ErrorKind::ShortRead { needed, available })
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedField(msg.into()))
    }

    pub fn checksum_mismatch(expected: u128, actual: u128) -> Self {
        Self::new(ErrorKind::ChecksumMismatch { expected, actual })
    }

    pub fn unsupported_revision(revision: u64, feature: &'static str) -> Self {
        Self::new(ErrorKind::UnsupportedRevision { revision, feature })
    }

    pub fn compression(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compression(msg.into()))
    }

    /// Prepend one path segment (the field enclosing the failed step).
    pub fn context(mut self, field: &'static str) -> Self {
        self.path.insert(0, field);
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Field path, outermost first
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    pub fn is_short_read(&self) -> bool {
        matches!(self.kind, ErrorKind::ShortRead { .. })
    }

    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::ChecksumMismatch { .. })
    }
}

impl From<ErrorKind> for ProtocolError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        // A wrapped ProtocolError (e.g. from a framing reader) keeps its kind and path.
        if err.get_ref().is_some_and(|inner| inner.is::<ProtocolError>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<ProtocolError>()) {
                Some(Ok(inner)) => *inner,
                _ => Self::new(ErrorKind::Io(kind)),
            };
        }
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::short_read(1, 0),
            kind => Self::new(ErrorKind::Io(kind)),
        }
    }
}

impl From<ProtocolError> for io::Error {
    fn from(err: ProtocolError) -> Self {
        let kind = match err.kind {
            ErrorKind::ShortRead { .. } => io::ErrorKind::UnexpectedEof,
            ErrorKind::Io(kind) => kind,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// Attach field context to a fallible step
pub trait ResultExt<T> {
    fn field(self, field: &'static str) -> Result<T>;
}

impl<T, E: Into<ProtocolError>> ResultExt<T> for std::result::Result<T, E> {
    fn field(self, field: &'static str) -> Result<T> {
        self.map_err(|e| e.into().context(field))
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_path() {
        let err = ProtocolError::short_read(1, 0).context("secret").context("query");
        assert_eq!(err.path(), &["query", "secret"]);
        assert_eq!(err.to_string(), "query.secret: short read: need 1 bytes, have 0");
    }

    #[test]
    fn test_display_without_path() {
        let err = ProtocolError::malformed("unknown stage 9");
        assert_eq!(err.to_string(), "malformed field: unknown stage 9");
    }

    #[test]
    fn test_result_ext() {
        let res: Result<()> = Err(ProtocolError::malformed("bad")).field("stage");
        let err = res.unwrap_err();
        assert_eq!(err.path(), &["stage"]);
        assert!(matches!(err.kind(), ErrorKind::MalformedField(_)));
    }

    #[test]
    fn test_io_roundtrip_keeps_kind_and_path() {
        let err = ProtocolError::checksum_mismatch(1, 2).context("block");
        let io_err: io::Error = err.clone().into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let back = ProtocolError::from(io_err);
        assert_eq!(back, err);
    }

    #[test]
    fn test_short_read_maps_to_unexpected_eof() {
        let io_err: io::Error = ProtocolError::short_read(16, 3).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);

        let plain = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(ProtocolError::from(plain).is_short_read());
    }
}
