// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Capability interface and the common base shared by every engine.
//!
//! ```text
//!            GitClient (blanket, the bridge)
//!     legacy fixed-signature ops -> builders -> execute
//!                       |
//!                       v
//!            GitBackend (per-engine contract)
//!            /          |            \
//!           v           v             v
//!      ShellGit      LibGit     RemoteGitClient
//!     (git CLI)     (libgit2)   (channel proxy)
//! ```
//!
//! `GitBackend` is the object-safe per-engine contract: one primitive per
//! operation, taking the option payload a builder accumulated. `GitClient`
//! is blanket-implemented for every backend and carries the legacy bridge
//! exactly once, so the CLI engine, the library engine, and a channel
//! proxy all translate identically. Bridged methods add no validation and
//! no error translation of their own.

pub mod command;
pub mod types;

use std::fmt;
use std::io;

use tracing::warn;

use crate::error::{GitError, GitResult};
pub use command::{
    ChangelogCommand, ChangelogOpts, CheckoutCommand, CheckoutOpts, CloneCommand, CloneOpts,
    InitCommand, InitOpts, MergeCommand, MergeOpts, SubmoduleUpdateCommand, SubmoduleUpdateOpts,
};
pub use types::{Credential, GitObject, Identity, Locality, ObjectId, ProxyConfig};

/// Per-engine contract: every operation a version-control engine must
/// support, in primitive form.
///
/// Implementors are the process engine, the library engine, and the
/// remoting proxy. Callers normally use [`GitClient`] instead.
pub trait GitBackend {
    /// Initialize the bound workspace as a repository.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if initialization fails.
    fn run_init(&self, opts: &InitOpts) -> GitResult<()>;

    /// Clone into the bound workspace. Never checks a worktree out;
    /// callers follow up with a checkout.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the clone fails.
    fn run_clone(&self, opts: &CloneOpts) -> GitResult<()>;

    /// Check out a ref, optionally creating (or recreating) a branch.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the checkout fails.
    fn run_checkout(&self, opts: &CheckoutOpts) -> GitResult<()>;

    /// Merge a revision into HEAD.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the merge fails or conflicts.
    fn run_merge(&self, opts: &MergeOpts) -> GitResult<()>;

    /// Update registered submodules.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the update fails, or
    /// `GitError::Unsupported` for flags the engine cannot honor.
    fn run_submodule_update(&self, opts: &SubmoduleUpdateOpts) -> GitResult<()>;

    /// Produce the formatted changelog text for the requested revision
    /// ranges.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if a revision cannot be resolved or the walk
    /// fails.
    fn run_changelog(&self, opts: &ChangelogOpts) -> GitResult<String>;

    /// Stage a path.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the path cannot be staged.
    fn add(&self, path: &str) -> GitResult<()>;

    /// Commit staged changes with the currently installed identities.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the commit fails.
    fn commit(&self, message: &str) -> GitResult<()>;

    /// Install the author identity used by subsequent commits.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` only when relayed over a channel.
    fn set_author(&self, name: &str, email: &str) -> GitResult<()>;

    /// Install the committer identity used by subsequent commits.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` only when relayed over a channel.
    fn set_committer(&self, name: &str, email: &str) -> GitResult<()>;

    /// Create (or move) an annotated tag at HEAD.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the tag cannot be created.
    fn tag(&self, name: &str, message: &str) -> GitResult<()>;

    /// Enumerate all tags with the commits they point at, peeling
    /// annotated tags and reading packed refs.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if refs cannot be read.
    fn get_tags(&self) -> GitResult<Vec<GitObject>>;

    /// List commit ids reachable from a revision, newest first.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the revision cannot be resolved.
    fn rev_list(&self, rev: &str) -> GitResult<Vec<ObjectId>>;

    /// Open the engine's repository handle for the bound workspace.
    ///
    /// The handle is engine-local; it never crosses an execution channel.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the workspace is not a repository, or
    /// `RemotingError::HandleNotPortable` on a proxy.
    fn repository(&self) -> GitResult<git2::Repository>;

    /// Drop every credential associated with this client.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` only when relayed over a channel.
    fn clear_credentials(&self) -> GitResult<()>;

    /// Associate a credential as the default for this client.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` only when relayed over a channel.
    fn add_default_credentials(&self, credential: Credential) -> GitResult<()>;

    /// Replace the network proxy configuration. No merging.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` only when relayed over a channel.
    fn set_proxy(&self, proxy: ProxyConfig) -> GitResult<()>;
}

/// The full client surface: builder accessors plus the legacy
/// fixed-signature operations, bridged onto the builder protocol.
///
/// Blanket-implemented for every [`GitBackend`], so the bridge exists in
/// exactly one place and every engine inherits identical translation.
pub trait GitClient: GitBackend {
    // --- Builder accessors (a fresh builder per call) ---

    fn init_(&self) -> InitCommand<'_, Self> {
        InitCommand::new(self)
    }

    fn clone_(&self) -> CloneCommand<'_, Self> {
        CloneCommand::new(self)
    }

    fn checkout(&self) -> CheckoutCommand<'_, Self> {
        CheckoutCommand::new(self)
    }

    fn merge(&self) -> MergeCommand<'_, Self> {
        MergeCommand::new(self)
    }

    fn submodule_update(&self) -> SubmoduleUpdateCommand<'_, Self> {
        SubmoduleUpdateCommand::new(self)
    }

    fn changelog(&self) -> ChangelogCommand<'_, Self> {
        ChangelogCommand::new(self)
    }

    // --- Legacy bridge ---

    /// Clone with the classic fixed signature. Shallow is only enabled
    /// when requested; an absent reference stays unset.
    ///
    /// # Errors
    ///
    /// Whatever the clone builder produces, unchanged.
    fn clone_repository(
        &self,
        url: &str,
        origin: &str,
        use_shallow_clone: bool,
        reference: Option<&str>,
    ) -> GitResult<()> {
        let mut c = self
            .clone_()
            .url(url)
            .repository_name(origin)
            .reference(reference.map(str::to_owned));
        if use_shallow_clone {
            c = c.shallow(true);
        }
        c.execute()
    }

    /// Check out a commit-ish with a detached HEAD.
    ///
    /// # Errors
    ///
    /// Whatever the checkout builder produces, unchanged.
    fn checkout_ref(&self, ref_name: &str) -> GitResult<()> {
        self.checkout().ref_(ref_name).execute()
    }

    /// Check out a commit-ish into a named branch. Fails if the branch
    /// already exists; see [`GitClient::checkout_branch`] for the
    /// delete-and-recreate variant.
    ///
    /// # Errors
    ///
    /// Whatever the checkout builder produces, unchanged.
    fn checkout_with_branch(&self, ref_name: &str, branch: &str) -> GitResult<()> {
        self.checkout().ref_(ref_name).branch(branch).execute()
    }

    /// Check out a commit-ish into a named branch, deleting the branch
    /// first if it already exists. Observably different from
    /// [`GitClient::checkout_with_branch`] for the same arguments.
    ///
    /// # Errors
    ///
    /// Whatever the checkout builder produces, unchanged.
    fn checkout_branch(&self, branch: &str, ref_name: &str) -> GitResult<()> {
        self.checkout()
            .ref_(ref_name)
            .branch(branch)
            .delete_branch_if_exist(true)
            .execute()
    }

    /// Merge a revision into HEAD.
    ///
    /// # Errors
    ///
    /// Whatever the merge builder produces, unchanged.
    fn merge_rev(&self, rev: &ObjectId) -> GitResult<()> {
        self.merge().revision_to_merge(rev.clone()).execute()
    }

    /// # Errors
    ///
    /// Whatever the submodule-update builder produces, unchanged.
    fn submodule_update_recursive(&self, recursive: bool) -> GitResult<()> {
        self.submodule_update().recursive(recursive).execute()
    }

    /// # Errors
    ///
    /// Whatever the submodule-update builder produces, unchanged.
    fn submodule_update_with_ref(&self, recursive: bool, reference: &str) -> GitResult<()> {
        self.submodule_update()
            .recursive(recursive)
            .ref_(reference)
            .execute()
    }

    /// # Errors
    ///
    /// Whatever the submodule-update builder produces, unchanged.
    fn submodule_update_with_tracking(
        &self,
        recursive: bool,
        remote_tracking: bool,
    ) -> GitResult<()> {
        self.submodule_update()
            .recursive(recursive)
            .remote_tracking(remote_tracking)
            .execute()
    }

    /// # Errors
    ///
    /// Whatever the submodule-update builder produces, unchanged.
    fn submodule_update_full(
        &self,
        recursive: bool,
        remote_tracking: bool,
        reference: &str,
    ) -> GitResult<()> {
        self.submodule_update()
            .recursive(recursive)
            .remote_tracking(remote_tracking)
            .ref_(reference)
            .execute()
    }

    /// Write the changelog between two revisions to a text sink.
    ///
    /// # Errors
    ///
    /// Whatever the changelog builder produces, unchanged.
    fn changelog_writer(
        &self,
        rev_from: &str,
        rev_to: &str,
        writer: &mut dyn fmt::Write,
    ) -> GitResult<()> {
        self.changelog()
            .excludes(rev_from)
            .includes(rev_to)
            .to(writer)
            .execute()
    }

    /// Write the changelog between two revisions to a byte stream,
    /// encoding with the platform default text encoding.
    ///
    /// # Errors
    ///
    /// Whatever the changelog builder produces; a sink write failure
    /// surfaces the underlying io error.
    fn changelog_stream(
        &self,
        rev_from: &str,
        rev_to: &str,
        stream: &mut dyn io::Write,
    ) -> GitResult<()> {
        let mut sink = command::EncodedSink::new(stream);
        let result = self.changelog_writer(rev_from, rev_to, &mut sink);
        match result {
            Err(GitError::Sink(msg)) => match sink.error.take() {
                Some(io_err) => Err(io_err.into()),
                None => Err(GitError::Sink(msg)),
            },
            other => other,
        }
    }

    /// Install the author identity. A `None` identity is a no-op, never
    /// an error.
    ///
    /// # Errors
    ///
    /// Whatever [`GitBackend::set_author`] produces.
    fn set_author_identity(&self, identity: Option<&Identity>) -> GitResult<()> {
        match identity {
            Some(p) => self.set_author(p.name(), p.email()),
            None => Ok(()),
        }
    }

    /// Install the committer identity. A `None` identity is a no-op,
    /// never an error.
    ///
    /// # Errors
    ///
    /// Whatever [`GitBackend::set_committer`] produces.
    fn set_committer_identity(&self, identity: Option<&Identity>) -> GitResult<()> {
        match identity {
            Some(p) => self.set_committer(p.name(), p.email()),
            None => Ok(()),
        }
    }

    /// Commit with explicit identities. `None` leaves the corresponding
    /// installed identity untouched.
    ///
    /// # Errors
    ///
    /// Whatever [`GitBackend::commit`] produces.
    fn commit_with_identities(
        &self,
        message: &str,
        author: Option<&Identity>,
        committer: Option<&Identity>,
    ) -> GitResult<()> {
        self.set_author_identity(author)?;
        self.set_committer_identity(committer)?;
        self.commit(message)
    }

    /// Replace the credential set: clear everything, then install the
    /// new credential as the sole default.
    ///
    /// # Errors
    ///
    /// Whatever the backend produces.
    fn set_credentials(&self, credential: Credential) -> GitResult<()> {
        self.clear_credentials()?;
        self.add_default_credentials(credential)
    }

    /// Run a callback against the engine's repository handle.
    ///
    /// The handle is released and the library engine's process-wide
    /// caches are reset on every exit path, including a failing callback;
    /// the callback's error is then rethrown untouched. The reset bounds
    /// libgit2 file-handle growth across repeated invocations. It is
    /// process-global, so concurrent repository-scoped operations on
    /// other instances race on it; that is an accepted property of the
    /// engine caches, not something this layer papers over.
    ///
    /// # Errors
    ///
    /// Whatever the callback or the handle acquisition produces.
    fn with_repository<T, F>(&self, callable: F) -> GitResult<T>
    where
        F: FnOnce(&git2::Repository, Locality) -> GitResult<T>,
    {
        let _reset = CacheResetGuard;
        let repo = self.repository()?;
        callable(&repo, Locality::Local)
    }
}

impl<T: GitBackend + ?Sized> GitClient for T {}

/// Runs the engine cache reset when a repository-scoped call unwinds or
/// returns, whichever comes first.
struct CacheResetGuard;

impl Drop for CacheResetGuard {
    fn drop(&mut self) {
        crate::backend::cache::clear_repository_cache();
        if let Err(err) = crate::backend::cache::reset_window_cache() {
            warn!(error = %err, "failed to reset libgit2 window cache");
        }
    }
}

#[cfg(test)]
mod tests;
