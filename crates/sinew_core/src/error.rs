//! # Pose Error Types
//!
//! All errors that can occur while sizing, configuring or evaluating a pose.
//!
//! Every fallible operation returns its own error value. There is no
//! thread-local "last error" slot to poll.

use std::borrow::Cow;

use thiserror::Error;

use crate::kernel::KernelError;

/// Errors that can occur in the pose evaluation system.
#[derive(Error, Debug)]
pub enum PoseError {
    /// A structural precondition was violated: absent reference, undersized
    /// or misaligned buffer, joint index outside `[0, N)`, skeleton mismatch
    /// between Instance and Workspace, or no qualifying base pose.
    #[error("invalid argument: {0}")]
    InvalidArgument(Cow<'static, str>),

    /// Reading or decoding an asset failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A pose kernel job reported failure.
    #[error("pose kernel failure: {0}")]
    KernelFailure(#[from] KernelError),

    /// Anything that does not fit the categories above.
    #[error("unclassified failure: {0}")]
    Unknown(Cow<'static, str>),
}

impl PoseError {
    /// Builds an [`PoseError::InvalidArgument`] from a static or owned message.
    #[inline]
    pub fn invalid(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Returns the numeric result code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Io(_) => ErrorCode::Io,
            Self::KernelFailure(_) => ErrorCode::KernelFailure,
            Self::Unknown(_) => ErrorCode::Unknown,
        }
    }
}

/// Stable numeric result codes for callers that marshal errors across a
/// language boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Success.
    Ok = 0,
    /// Unclassified failure.
    Unknown = 1,
    /// Structural precondition violated.
    InvalidArgument = 2,
    /// Asset load failure.
    Io = 3,
    /// Pose kernel failure.
    KernelFailure = 4,
}

impl ErrorCode {
    /// Maps a result onto its code.
    #[must_use]
    pub fn of<T>(result: &PoseResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(err) => err.code(),
        }
    }
}

/// Result type for pose operations.
pub type PoseResult<T> = Result<T, PoseError>;
