// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command builder protocol.
//!
//! ```text
//! client.clone_()              client.checkout()            client.changelog()
//!   .url(u).shallow(true)        .ref_("origin/main")         .excludes(a)
//!   .execute()                   .branch("main")              .includes(b)
//!        |                       .execute()                   .to(&mut w)
//!        v                            |                       .execute()
//!   backend.run_clone(&opts)          v                            |
//!                                backend.run_checkout(&opts)       v
//!                                                   backend.run_changelog(&opts)
//! ```
//!
//! Every builder accumulates options (last write wins), chains by value,
//! and has exactly one terminal `execute`. `execute(self)` consumes the
//! builder, so a spent request cannot be reissued. Option structs derive
//! serde and double as the wire payload for remoted calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

use crate::client::GitBackend;
use crate::client::types::ObjectId;
use crate::error::GitResult;

// --- Option payloads ---

/// Options for repository initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitOpts {
    pub bare: bool,
}

/// Options for a clone request.
///
/// Defaults: no origin name override, no reference repository (no
/// alternate object-transfer optimization), full history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneOpts {
    pub url: String,
    pub origin: Option<String>,
    pub reference: Option<String>,
    pub shallow: bool,
}

/// Options for a checkout request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOpts {
    pub ref_name: String,
    pub branch: Option<String>,
    pub delete_branch_if_exist: bool,
}

/// Options for a merge request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOpts {
    pub revision: Option<ObjectId>,
}

/// Options for a submodule update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleUpdateOpts {
    pub recursive: bool,
    pub reference: Option<String>,
    pub remote_tracking: bool,
}

/// Options for a changelog request. An empty include set means HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogOpts {
    pub excludes: Vec<String>,
    pub includes: Vec<String>,
    pub max_count: Option<usize>,
}

// --- Builders ---

/// Builder for repository initialization.
#[derive(Debug)]
pub struct InitCommand<'a, B: GitBackend + ?Sized> {
    backend: &'a B,
    opts: InitOpts,
}

impl<'a, B: GitBackend + ?Sized> InitCommand<'a, B> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            backend,
            opts: InitOpts::default(),
        }
    }

    #[must_use]
    pub fn bare(mut self, bare: bool) -> Self {
        self.opts.bare = bare;
        self
    }

    /// # Errors
    ///
    /// Returns a `GitError` if the engine cannot initialize the workspace.
    pub fn execute(self) -> GitResult<()> {
        self.backend.run_init(&self.opts)
    }
}

/// Builder for a clone request.
#[derive(Debug)]
pub struct CloneCommand<'a, B: GitBackend + ?Sized> {
    backend: &'a B,
    opts: CloneOpts,
}

impl<'a, B: GitBackend + ?Sized> CloneCommand<'a, B> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            backend,
            opts: CloneOpts::default(),
        }
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.opts.url = url.into();
        self
    }

    /// Name for the remote the clone fetches from. Defaults to `origin`.
    #[must_use]
    pub fn repository_name(mut self, origin: impl Into<String>) -> Self {
        self.opts.origin = Some(origin.into());
        self
    }

    /// Local reference repository used for the alternates optimization.
    /// `None` leaves the option unset.
    #[must_use]
    pub fn reference(mut self, reference: Option<String>) -> Self {
        self.opts.reference = reference;
        self
    }

    /// Shallow clone (depth 1). Default is full history.
    #[must_use]
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.opts.shallow = shallow;
        self
    }

    /// # Errors
    ///
    /// Returns a `GitError` if the clone fails, or `GitError::Interrupted`
    /// if the calling thread asked for the operation to abort.
    pub fn execute(self) -> GitResult<()> {
        self.backend.run_clone(&self.opts)
    }
}

/// Builder for a checkout request.
#[derive(Debug)]
pub struct CheckoutCommand<'a, B: GitBackend + ?Sized> {
    backend: &'a B,
    opts: CheckoutOpts,
}

impl<'a, B: GitBackend + ?Sized> CheckoutCommand<'a, B> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            backend,
            opts: CheckoutOpts::default(),
        }
    }

    /// The commit-ish to check out.
    #[must_use]
    pub fn ref_(mut self, ref_name: impl Into<String>) -> Self {
        self.opts.ref_name = ref_name.into();
        self
    }

    /// Destination branch to create at the target ref.
    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.opts.branch = Some(branch.into());
        self
    }

    /// Delete and recreate the destination branch if it already exists.
    #[must_use]
    pub fn delete_branch_if_exist(mut self, delete: bool) -> Self {
        self.opts.delete_branch_if_exist = delete;
        self
    }

    /// # Errors
    ///
    /// Returns a `GitError` if the checkout fails, or
    /// `GitError::Interrupted` on abort.
    pub fn execute(self) -> GitResult<()> {
        self.backend.run_checkout(&self.opts)
    }
}

/// Builder for a merge request.
#[derive(Debug)]
pub struct MergeCommand<'a, B: GitBackend + ?Sized> {
    backend: &'a B,
    opts: MergeOpts,
}

impl<'a, B: GitBackend + ?Sized> MergeCommand<'a, B> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            backend,
            opts: MergeOpts::default(),
        }
    }

    #[must_use]
    pub fn revision_to_merge(mut self, revision: ObjectId) -> Self {
        self.opts.revision = Some(revision);
        self
    }

    /// # Errors
    ///
    /// Returns a `GitError` if the merge fails (conflicts included), or
    /// `GitError::Interrupted` on abort.
    pub fn execute(self) -> GitResult<()> {
        self.backend.run_merge(&self.opts)
    }
}

/// Builder for a submodule update request.
#[derive(Debug)]
pub struct SubmoduleUpdateCommand<'a, B: GitBackend + ?Sized> {
    backend: &'a B,
    opts: SubmoduleUpdateOpts,
}

impl<'a, B: GitBackend + ?Sized> SubmoduleUpdateCommand<'a, B> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            backend,
            opts: SubmoduleUpdateOpts::default(),
        }
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.opts.recursive = recursive;
        self
    }

    /// Reference repository for the alternates optimization.
    #[must_use]
    pub fn ref_(mut self, reference: impl Into<String>) -> Self {
        self.opts.reference = Some(reference.into());
        self
    }

    /// Update submodules to the tip of their tracked remote branch.
    #[must_use]
    pub fn remote_tracking(mut self, remote_tracking: bool) -> Self {
        self.opts.remote_tracking = remote_tracking;
        self
    }

    /// # Errors
    ///
    /// Returns a `GitError` if the update fails, `GitError::Unsupported`
    /// when the engine cannot honor a requested flag, or
    /// `GitError::Interrupted` on abort.
    pub fn execute(self) -> GitResult<()> {
        self.backend.run_submodule_update(&self.opts)
    }
}

/// Builder for a changelog request.
///
/// The sink is a text sink; byte streams are adapted by
/// [`GitClient::changelog_stream`](crate::client::GitClient::changelog_stream).
pub struct ChangelogCommand<'a, B: GitBackend + ?Sized> {
    backend: &'a B,
    opts: ChangelogOpts,
    sink: Option<&'a mut dyn fmt::Write>,
}

impl<'a, B: GitBackend + ?Sized> ChangelogCommand<'a, B> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            backend,
            opts: ChangelogOpts::default(),
            sink: None,
        }
    }

    /// Exclude a revision and its ancestry from the log.
    #[must_use]
    pub fn excludes(mut self, rev: impl Into<String>) -> Self {
        self.opts.excludes.push(rev.into());
        self
    }

    /// Include a revision and its ancestry in the log.
    #[must_use]
    pub fn includes(mut self, rev: impl Into<String>) -> Self {
        self.opts.includes.push(rev.into());
        self
    }

    /// Cap the number of reported commits.
    #[must_use]
    pub fn max(mut self, max_count: usize) -> Self {
        self.opts.max_count = Some(max_count);
        self
    }

    /// Text sink receiving the formatted log.
    #[must_use]
    pub fn to(mut self, sink: &'a mut dyn fmt::Write) -> Self {
        self.sink = Some(sink);
        self
    }

    /// # Errors
    ///
    /// Returns `GitError::Sink` when no sink was configured, or a
    /// `GitError` if the log cannot be produced or the sink rejects the
    /// output.
    pub fn execute(self) -> GitResult<()> {
        // A changelog with nowhere to go is a caller bug; fail before
        // doing the walk.
        let Some(sink) = self.sink else {
            return Err(crate::error::GitError::Sink(
                "changelog executed without an output sink".into(),
            ));
        };
        let text = self.backend.run_changelog(&self.opts)?;
        sink.write_str(&text)
            .map_err(|_| crate::error::GitError::Sink("sink rejected changelog text".into()))?;
        Ok(())
    }
}

// --- Byte-stream adapter ---

/// Platform default text encoding for changelog byte streams.
pub(crate) const DEFAULT_TEXT_ENCODING: &encoding_rs::Encoding = encoding_rs::UTF_8;

/// Adapts a byte stream into a text sink using a fixed encoding.
///
/// fmt::Error carries no payload, so the underlying io error is parked
/// here and recovered by the caller after the request completes.
pub(crate) struct EncodedSink<'a> {
    out: &'a mut dyn io::Write,
    encoding: &'static encoding_rs::Encoding,
    pub(crate) error: Option<io::Error>,
}

impl<'a> EncodedSink<'a> {
    pub(crate) fn new(out: &'a mut dyn io::Write) -> Self {
        Self {
            out,
            encoding: DEFAULT_TEXT_ENCODING,
            error: None,
        }
    }
}

impl fmt::Write for EncodedSink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let (bytes, _, _) = self.encoding.encode(s);
        match self.out.write_all(&bytes) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error = Some(err);
                Err(fmt::Error)
            }
        }
    }
}
