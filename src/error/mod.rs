// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!                      GitError
//!                         |
//!     +---------+--------+---------+----------+--------+
//!     |         |        |         |          |        |
//!     v         v        v         v          v        v
//!  Command    Lib   Interrupted  Unsupported  Remoting  Io/Sink/Remote
//!   (CLI)    (git2)   (cancel)  (engine gap)    Box         Box
//!
//! Taxonomy, kept distinct end to end (including across a channel):
//!   operation failure  CommandFailed, CloneFailed, MergeFailed, Lib, ...
//!   interruption       Interrupted
//!   remoting failure   RemotingError (NoChannel, ChannelClosed, ...)
//!
//! Large payloads (git2, serde_json, io) are boxed to keep GitError
//! cheap to move around.
//! ```

use thiserror::Error;

/// Convenience alias for `anyhow::Result`, used by integration tests.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`GitError`].
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Top-level error type for every client operation.
///
/// Operation failures, interruption, and remoting failures are separate
/// variants so callers can always tell cancellation apart from a failed
/// git operation.
#[derive(Debug, Error)]
pub enum GitError {
    /// A git CLI invocation failed.
    #[error("git command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    /// Clone operation failed.
    #[error("failed to clone {url}: {message}")]
    CloneFailed { url: String, message: String },

    /// Checkout operation failed.
    #[error("failed to checkout {what}: {message}")]
    CheckoutFailed { what: String, message: String },

    /// Merge operation failed (conflicts, bad revision, ...).
    #[error("failed to merge {revision}: {message}")]
    MergeFailed { revision: String, message: String },

    /// Error from the libgit2 engine.
    #[error("libgit2 error: {0}")]
    Lib(#[from] Box<git2::Error>),

    /// The calling thread asked for the operation to be aborted.
    ///
    /// Always distinct from an operation failure; cleanup has still run
    /// when this is returned.
    #[error("operation interrupted")]
    Interrupted,

    /// The bound engine cannot perform the requested operation.
    #[error("unsupported by this engine: {0}")]
    Unsupported(Box<str>),

    /// Writing changelog output to the caller's sink failed.
    #[error("failed to write changelog output: {0}")]
    Sink(Box<str>),

    /// Operation failure relayed from the far side of a channel.
    #[error("remote operation failed: {0}")]
    Remote(Box<str>),

    /// Remoting layer failure (channel, export, codec).
    #[error("remoting error: {0}")]
    Remoting(#[from] Box<RemotingError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),
}

// --- From implementations for boxing ---

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for GitError {
                fn from(err: $error) -> Self {
                    GitError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    git2::Error => Lib,
    RemotingError => Remoting,
    std::io::Error => Io,
}

// --- Remoting Errors ---

/// Errors from the execution-channel layer.
#[derive(Debug, Error)]
pub enum RemotingError {
    /// Export was attempted with no current execution channel.
    ///
    /// Fails fast at export time; a proxy is never produced without a
    /// live channel behind it.
    #[error("no current execution channel; a client can only be exported inside a channel scope")]
    NoChannel,

    /// The channel's service loop is gone.
    #[error("execution channel closed")]
    ChannelClosed,

    /// Repository handles are engine-local and never cross a channel.
    #[error("repository handle cannot cross an execution channel")]
    HandleNotPortable,

    /// A wire frame could not be encoded or decoded.
    #[error("wire codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The far side replied with an unexpected frame.
    #[error("protocol error: {0}")]
    Protocol(Box<str>),
}
