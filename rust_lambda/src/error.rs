use std::fmt;

use aws_sdk_s3::error::DisplayErrorContext;
use thiserror::Error;

/// Broad category of a failed copy, used for log fields and failure summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    MalformedEvent,
    Read,
    Write,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MalformedEvent => "malformed_event",
            ErrorKind::Read => "read",
            ErrorKind::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub(crate) enum CopyError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("failed to read s3://{bucket}/{key}: {detail}")]
    Read {
        bucket: String,
        key: String,
        detail: String,
    },

    #[error("failed to write s3://{bucket}/{key}: {detail}")]
    Write {
        bucket: String,
        key: String,
        detail: String,
    },
}

impl CopyError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CopyError::MalformedEvent(msg.into())
    }

    /// SDK errors only print "service error" through `Display`, so the full
    /// source chain is rendered into the detail.
    pub(crate) fn read<E: std::error::Error>(bucket: &str, key: &str, err: E) -> Self {
        CopyError::Read {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            detail: DisplayErrorContext(err).to_string(),
        }
    }

    pub(crate) fn write<E: std::error::Error>(bucket: &str, key: &str, err: E) -> Self {
        CopyError::Write {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            detail: DisplayErrorContext(err).to_string(),
        }
    }

    pub(crate) fn write_detail(bucket: &str, key: &str, detail: impl Into<String>) -> Self {
        CopyError::Write {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            detail: detail.into(),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            CopyError::MalformedEvent(_) => ErrorKind::MalformedEvent,
            CopyError::Read { .. } => ErrorKind::Read,
            CopyError::Write { .. } => ErrorKind::Write,
        }
    }
}

/// Returned to the runtime when copies failed and failures are propagated.
#[derive(Debug, Error)]
#[error("{failed} of {total} object copies failed, first failure ({}): {first}", .first.kind())]
pub(crate) struct CopyFailures {
    pub(crate) failed: usize,
    pub(crate) total: usize,
    pub(crate) first: CopyError,
}
