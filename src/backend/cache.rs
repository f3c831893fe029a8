// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process-wide caches owned by the library engine.
//!
//! ```text
//! LibGit ops ----> with_repository(path, f)   open-through handle cache
//! GitClient::with_repository (release path)
//!          \---> clear_repository_cache()     drop every cached handle
//!           \--> reset_window_cache()         mwindow file limit -> boot value
//! ```
//!
//! libgit2 keeps pack windows (and their file descriptors) open per
//! repository handle; repeated repository-scoped operations in one
//! process grow that set without bound. The reset hooks drop every
//! cached handle and put the mwindow file limit back to its boot value,
//! bounding the growth. Both hooks are process-global: concurrent
//! repository-scoped operations on other instances race on them. That
//! race is a property of the engine caches and is accepted here, not
//! fixed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, OnceLock, PoisonError};

use tracing::trace;

use crate::error::GitResult;

static REPOSITORIES: LazyLock<Mutex<HashMap<PathBuf, git2::Repository>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// mwindow file limit in effect before any reset ran.
static BOOT_MWINDOW_FILE_LIMIT: OnceLock<usize> = OnceLock::new();

/// Run a closure against the cached repository handle for `path`,
/// opening and caching it on first use.
///
/// The cache lock is held for the duration of the closure, so
/// library-engine operations in one process serialize here.
///
/// # Errors
///
/// Returns a `GitError` if the repository cannot be opened.
pub(crate) fn with_repository<T>(
    path: &Path,
    f: impl FnOnce(&git2::Repository) -> GitResult<T>,
) -> GitResult<T> {
    let mut map = REPOSITORIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let repo = match map.entry(path.to_path_buf()) {
        std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
        std::collections::hash_map::Entry::Vacant(entry) => {
            trace!(path = %path.display(), "opening repository into cache");
            entry.insert(git2::Repository::open(path).map_err(Box::new)?)
        }
    };
    f(repo)
}

/// Drop every cached repository handle.
pub fn clear_repository_cache() {
    let mut map = REPOSITORIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let dropped = map.len();
    map.clear();
    trace!(dropped, "cleared repository cache");
}

/// Number of repository handles currently cached. Exposed for tests and
/// diagnostics.
#[must_use]
pub fn cached_repository_count() -> usize {
    REPOSITORIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}

/// Put the libgit2 mwindow file limit back to its boot value.
///
/// # Errors
///
/// Returns a `GitError` if libgit2 rejects the option.
pub fn reset_window_cache() -> GitResult<()> {
    let boot = *BOOT_MWINDOW_FILE_LIMIT
        .get_or_init(|| unsafe { git2::opts::get_mwindow_file_limit() }.unwrap_or(0));
    unsafe { git2::opts::set_mwindow_file_limit(boot) }.map_err(Box::new)?;
    trace!(limit = boot, "reset mwindow file limit");
    Ok(())
}
