// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library root.
//!
//! # Crate Architecture
//!
//! ```text
//!                        caller
//!                           |
//!                           v
//!              ,---------------------------,
//!              |    client::GitClient      |
//!              |  legacy bridge + builders |
//!              '------------+--------------'
//!                           |
//!                           v
//!              ,---------------------------,
//!              |    client::GitBackend     |
//!              |   per-engine primitives   |
//!              '--+-----------+--------+---'
//!                 |           |        |
//!                 v           v        v
//!             ShellGit     LibGit   remoting
//!             git CLI     libgit2   channel proxy
//!                 \          |
//!                  \         v
//!                   \   backend::cache
//!                    \  handle + window reset
//!                     v
//!                 workspace
//!
//!   +-----------------------------------------+
//!   |  foundation   error (GitError taxonomy) |
//!   +-----------------------------------------+
//! ```
//!
//! One client surface, two interchangeable engines. [`client::GitClient`]
//! carries the classic fixed-signature operations and bridges them onto
//! the builder protocol; [`client::GitBackend`] is what an engine (or a
//! channel proxy) actually implements. Pick an engine with
//! [`backend::client`], or relay one across an execution boundary with
//! [`remoting::export`].

pub mod backend;
pub mod client;
pub mod error;
pub mod remoting;
