// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache group operations.

use std::fmt::Display;

/// The category of a failed cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The caller passed an unusable argument or made a configuration mistake, such as an empty
    /// key or a second peer registration.
    InvalidArgument,
    /// The origin or a peer reported that the key or group does not exist.
    NotFound,
    /// A remote peer could not be reached or returned an unusable response.
    PeerUnavailable,
    /// The origin data source failed to produce a value.
    OriginFailure,
}

impl ErrorKind {
    /// Returns a short, stable label for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
            Self::PeerUnavailable => "peer unavailable",
            Self::OriginFailure => "origin failure",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a cache group operation.
///
/// Every error carries an [`ErrorKind`] and, usually, the underlying cause as its source.
/// Errors are cheap to clone, so one failed load can be reported to every caller that was
/// waiting on it.
///
/// # Example
///
/// ```
/// use meshcache::{Error, ErrorKind};
///
/// let error = Error::not_found("no score recorded for Bob");
/// assert_eq!(error.kind(), ErrorKind::NotFound);
/// assert!(error.to_string().contains("no score recorded for Bob"));
/// ```
#[ohno::error]
#[derive(Clone)]
#[display("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates an error of the given kind wrapping `cause`.
    pub fn with_kind(kind: ErrorKind, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(kind, cause)
    }

    /// Creates an [`ErrorKind::InvalidArgument`] error.
    pub fn invalid_argument(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::InvalidArgument, cause)
    }

    /// Creates an [`ErrorKind::NotFound`] error.
    pub fn not_found(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::NotFound, cause)
    }

    /// Creates an [`ErrorKind::PeerUnavailable`] error.
    pub fn peer_unavailable(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::PeerUnavailable, cause)
    }

    /// Creates an [`ErrorKind::OriginFailure`] error.
    pub fn origin(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::OriginFailure, cause)
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A specialized [`Result`] type for cache group operations.
pub type Result<T> = std::result::Result<T, Error>;
