// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Engine implementations.
//!
//! ```text
//!          GitBackend (client::GitBackend)
//!              /                \
//!             v                  v
//!        ShellGit             LibGit
//!      git CLI, spawn       libgit2 in-process
//!      env hardening        repository cache
//!      SSH/system git       window cache reset
//!              \                /
//!               v              v
//!            cache (process-wide, library engine hooks)
//! ```
//!
//! **`ShellGit`** — external `git` process, full CLI compatibility.
//! **`LibGit`** — pure in-process libgit2, no subprocess.
//!
//! Both engines are bound to one workspace, keep their mutable client
//! state behind a mutex, and honor a cooperative interrupt flag at their
//! blocking points.

pub mod cache;
pub mod libgit;
pub mod shell;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::types::{Credential, Identity, ProxyConfig};
use crate::client::GitBackend;
use crate::error::{GitError, GitResult};

pub use libgit::LibGit;
pub use shell::ShellGit;

/// Which engine a client is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// External `git` process.
    Shell,
    /// In-process libgit2.
    Library,
}

/// Construct a client for a workspace, bound to the chosen engine.
#[must_use]
pub fn client(workspace: impl Into<PathBuf>, engine: Engine) -> Box<dyn GitBackend + Send + Sync> {
    match engine {
        Engine::Shell => Box::new(ShellGit::new(workspace)),
        Engine::Library => Box::new(LibGit::new(workspace)),
    }
}

/// Cooperative cancellation flag, shared between a client and whoever
/// may interrupt it.
///
/// Engines poll this at their blocking points; a raised flag surfaces as
/// [`GitError::Interrupted`], distinct from any operation failure, and
/// resource cleanup still runs.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Ask in-flight and future operations to abort.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Re-arm the handle after an interruption was observed.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> GitResult<()> {
        if self.is_interrupted() {
            Err(GitError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Mutable per-client state shared by both engines: installed
/// identities, the default credential, and the proxy descriptor.
#[derive(Debug, Default)]
pub(crate) struct ClientState {
    pub(crate) author: Option<Identity>,
    pub(crate) committer: Option<Identity>,
    pub(crate) credential: Option<Credential>,
    pub(crate) proxy: Option<ProxyConfig>,
}

/// Lock a state mutex, riding through poisoning (state stays usable
/// after a panicked caller thread).
pub(crate) fn lock_state(state: &Mutex<ClientState>) -> MutexGuard<'_, ClientState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
