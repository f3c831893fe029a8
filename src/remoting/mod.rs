// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Execution channels and the remote client proxy.
//!
//! ```text
//! caller thread                      service thread
//!   channel.enter() guard              service_loop(rx, exports)
//!   export(backend) -> RemoteGitClient     |
//!   proxy.run_clone(opts)                  v
//!     -> Frame { export, json } --tx--> dispatch -> real backend
//!     <- json Result<GitReply, WireError> via the frame's reply sender
//! ```
//!
//! A [`Channel`] is an execution boundary: backends registered on it via
//! [`export`] are replaced by a [`RemoteGitClient`] proxy that relays
//! every operation as a serde frame. Export fails fast with
//! [`RemotingError::NoChannel`](crate::error::RemotingError::NoChannel)
//! when no channel scope is active, so a proxy never exists without a
//! live channel behind it.
//!
//! The error taxonomy survives the wire: a far-side interruption comes
//! back as [`GitError::Interrupted`], any other far-side failure as
//! [`GitError::Remote`], and transport problems as their own
//! [`RemotingError`] values. Repository handles never cross; calling
//! `repository()` on a proxy reports `HandleNotPortable`.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::client::command::{
    ChangelogOpts, CheckoutOpts, CloneOpts, InitOpts, MergeOpts, SubmoduleUpdateOpts,
};
use crate::client::types::{Credential, GitObject, ObjectId, ProxyConfig};
use crate::client::GitBackend;
use crate::error::{GitError, GitResult, RemotingError};

type SharedBackend = Arc<dyn GitBackend + Send + Sync>;

// --- Wire protocol ---

/// One backend operation in wire form. Mirrors the primitives of
/// [`GitBackend`] exactly; the bridge methods never appear here because
/// they are translated before the channel.
#[derive(Debug, Serialize, Deserialize)]
enum GitRequest {
    Init(InitOpts),
    Clone(CloneOpts),
    Checkout(CheckoutOpts),
    Merge(MergeOpts),
    SubmoduleUpdate(SubmoduleUpdateOpts),
    Changelog(ChangelogOpts),
    Add { path: String },
    Commit { message: String },
    SetAuthor { name: String, email: String },
    SetCommitter { name: String, email: String },
    Tag { name: String, message: String },
    GetTags,
    RevList { rev: String },
    ClearCredentials,
    AddDefaultCredentials(Credential),
    SetProxy(ProxyConfig),
}

/// Successful reply payloads.
#[derive(Debug, Serialize, Deserialize)]
enum GitReply {
    Unit,
    Text(String),
    Tags(Vec<GitObject>),
    Revs(Vec<ObjectId>),
}

/// Far-side failure in wire form. `interrupted` keeps cancellation
/// distinguishable from an operation failure after the round trip.
#[derive(Debug, Serialize, Deserialize)]
struct WireError {
    interrupted: bool,
    message: String,
}

impl From<&GitError> for WireError {
    fn from(err: &GitError) -> Self {
        Self {
            interrupted: matches!(err, GitError::Interrupted),
            message: err.to_string(),
        }
    }
}

/// One in-flight call: an export slot, a JSON-encoded [`GitRequest`],
/// and a single-use reply sender.
struct Frame {
    export: usize,
    body: String,
    reply: flume::Sender<String>,
}

// --- Channel ---

thread_local! {
    /// Stack of channels the current thread has entered; export binds to
    /// the innermost one.
    static CURRENT: RefCell<Vec<Weak<Channel>>> = const { RefCell::new(Vec::new()) };
}

/// An execution boundary with a service thread on its far side.
///
/// Dropping every handle (channel and proxies alike) closes the
/// transport and ends the service thread.
pub struct Channel {
    tx: flume::Sender<Frame>,
    exports: Arc<Mutex<Vec<SharedBackend>>>,
}

impl Channel {
    /// Open a channel and start its service thread.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the service thread cannot be spawned.
    pub fn open() -> GitResult<Arc<Self>> {
        let (tx, rx) = flume::unbounded::<Frame>();
        let exports: Arc<Mutex<Vec<SharedBackend>>> = Arc::new(Mutex::new(Vec::new()));
        let loop_exports = Arc::clone(&exports);
        thread::Builder::new()
            .name("gitbridge-channel".to_string())
            .spawn(move || service_loop(&rx, &loop_exports))?;
        Ok(Arc::new(Self { tx, exports }))
    }

    /// Make this the current channel for the calling thread until the
    /// returned guard drops.
    #[must_use]
    pub fn enter(self: &Arc<Self>) -> ChannelGuard {
        let entry = Arc::downgrade(self);
        CURRENT.with(|current| current.borrow_mut().push(entry.clone()));
        ChannelGuard { entry }
    }

    /// Register a backend on this channel and hand back its proxy.
    pub fn export(self: &Arc<Self>, backend: SharedBackend) -> RemoteGitClient {
        let mut exports = self
            .exports
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = exports.len();
        exports.push(backend);
        debug!(slot, "exported backend on channel");
        RemoteGitClient {
            channel: Arc::clone(self),
            export: slot,
        }
    }

    fn call(&self, export: usize, request: &GitRequest) -> GitResult<GitReply> {
        let body = serde_json::to_string(request).map_err(RemotingError::from)?;
        trace!(export, "sending frame");
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.tx
            .send(Frame {
                export,
                body,
                reply: reply_tx,
            })
            .map_err(|_| RemotingError::ChannelClosed)?;
        let raw = reply_rx.recv().map_err(|_| RemotingError::ChannelClosed)?;
        let response: Result<GitReply, WireError> =
            serde_json::from_str(&raw).map_err(RemotingError::from)?;
        response.map_err(|wire| {
            if wire.interrupted {
                GitError::Interrupted
            } else {
                GitError::Remote(wire.message.into())
            }
        })
    }
}

/// Removes its channel from the thread's stack on drop.
///
/// Each guard tracks the entry it pushed, so guards dropped out of
/// declaration order still remove their own channel, never another
/// guard's.
pub struct ChannelGuard {
    entry: Weak<Channel>,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| {
            let mut stack = current.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|w| w.ptr_eq(&self.entry)) {
                stack.remove(pos);
            }
        });
    }
}

/// The channel the calling thread is currently inside, if any.
#[must_use]
pub fn current_channel() -> Option<Arc<Channel>> {
    CURRENT.with(|current| {
        current
            .borrow()
            .iter()
            .rev()
            .find_map(std::sync::Weak::upgrade)
    })
}

/// Export a backend on the calling thread's current channel.
///
/// This is the substitution point: the real client stays on the channel's
/// far side, and callers receive a proxy relaying every operation.
///
/// # Errors
///
/// Returns [`RemotingError::NoChannel`] when the calling thread is not
/// inside a channel scope.
pub fn export(backend: SharedBackend) -> GitResult<RemoteGitClient> {
    let channel = current_channel().ok_or(RemotingError::NoChannel)?;
    Ok(channel.export(backend))
}

// --- Service side ---

fn service_loop(rx: &flume::Receiver<Frame>, exports: &Arc<Mutex<Vec<SharedBackend>>>) {
    while let Ok(frame) = rx.recv() {
        let response = dispatch(exports, frame.export, &frame.body);
        let encoded = serde_json::to_string(&response).or_else(|err| {
            serde_json::to_string(&Err::<GitReply, WireError>(WireError {
                interrupted: false,
                message: format!("reply encoding failed: {err}"),
            }))
        });
        match encoded {
            Ok(encoded) => {
                // A caller that gave up on the reply is not an error here.
                let _ = frame.reply.send(encoded);
            }
            Err(err) => warn!(error = %err, "dropping unencodable reply"),
        }
    }
    trace!("channel service loop ended");
}

fn dispatch(
    exports: &Arc<Mutex<Vec<SharedBackend>>>,
    export: usize,
    body: &str,
) -> Result<GitReply, WireError> {
    let request: GitRequest = serde_json::from_str(body).map_err(|err| WireError {
        interrupted: false,
        message: format!("request decoding failed: {err}"),
    })?;
    let backend = exports
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(export)
        .cloned()
        .ok_or_else(|| WireError {
            interrupted: false,
            message: format!("unknown export slot {export}"),
        })?;

    let result = match request {
        GitRequest::Init(opts) => backend.run_init(&opts).map(|()| GitReply::Unit),
        GitRequest::Clone(opts) => backend.run_clone(&opts).map(|()| GitReply::Unit),
        GitRequest::Checkout(opts) => backend.run_checkout(&opts).map(|()| GitReply::Unit),
        GitRequest::Merge(opts) => backend.run_merge(&opts).map(|()| GitReply::Unit),
        GitRequest::SubmoduleUpdate(opts) => {
            backend.run_submodule_update(&opts).map(|()| GitReply::Unit)
        }
        GitRequest::Changelog(opts) => backend.run_changelog(&opts).map(GitReply::Text),
        GitRequest::Add { path } => backend.add(&path).map(|()| GitReply::Unit),
        GitRequest::Commit { message } => backend.commit(&message).map(|()| GitReply::Unit),
        GitRequest::SetAuthor { name, email } => {
            backend.set_author(&name, &email).map(|()| GitReply::Unit)
        }
        GitRequest::SetCommitter { name, email } => {
            backend.set_committer(&name, &email).map(|()| GitReply::Unit)
        }
        GitRequest::Tag { name, message } => backend.tag(&name, &message).map(|()| GitReply::Unit),
        GitRequest::GetTags => backend.get_tags().map(GitReply::Tags),
        GitRequest::RevList { rev } => backend.rev_list(&rev).map(GitReply::Revs),
        GitRequest::ClearCredentials => backend.clear_credentials().map(|()| GitReply::Unit),
        GitRequest::AddDefaultCredentials(credential) => backend
            .add_default_credentials(credential)
            .map(|()| GitReply::Unit),
        GitRequest::SetProxy(proxy) => backend.set_proxy(proxy).map(|()| GitReply::Unit),
    };
    result.map_err(|err| WireError::from(&err))
}

// --- Proxy ---

/// Proxy standing in for a backend exported on a [`Channel`].
///
/// Implements [`GitBackend`], so the whole [`GitClient`] bridge works on
/// it unchanged; every primitive becomes a wire round trip.
///
/// [`GitClient`]: crate::client::GitClient
#[derive(Clone)]
pub struct RemoteGitClient {
    channel: Arc<Channel>,
    export: usize,
}

impl std::fmt::Debug for RemoteGitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGitClient")
            .field("export", &self.export)
            .finish_non_exhaustive()
    }
}

impl RemoteGitClient {
    fn call_unit(&self, request: &GitRequest) -> GitResult<()> {
        match self.channel.call(self.export, request)? {
            GitReply::Unit => Ok(()),
            other => Err(unexpected_reply(&other)),
        }
    }
}

fn unexpected_reply(reply: &GitReply) -> GitError {
    RemotingError::Protocol(format!("unexpected reply frame: {reply:?}").into()).into()
}

impl GitBackend for RemoteGitClient {
    fn run_init(&self, opts: &InitOpts) -> GitResult<()> {
        self.call_unit(&GitRequest::Init(opts.clone()))
    }

    fn run_clone(&self, opts: &CloneOpts) -> GitResult<()> {
        self.call_unit(&GitRequest::Clone(opts.clone()))
    }

    fn run_checkout(&self, opts: &CheckoutOpts) -> GitResult<()> {
        self.call_unit(&GitRequest::Checkout(opts.clone()))
    }

    fn run_merge(&self, opts: &MergeOpts) -> GitResult<()> {
        self.call_unit(&GitRequest::Merge(opts.clone()))
    }

    fn run_submodule_update(&self, opts: &SubmoduleUpdateOpts) -> GitResult<()> {
        self.call_unit(&GitRequest::SubmoduleUpdate(opts.clone()))
    }

    fn run_changelog(&self, opts: &ChangelogOpts) -> GitResult<String> {
        match self
            .channel
            .call(self.export, &GitRequest::Changelog(opts.clone()))?
        {
            GitReply::Text(text) => Ok(text),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn add(&self, path: &str) -> GitResult<()> {
        self.call_unit(&GitRequest::Add {
            path: path.to_string(),
        })
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        self.call_unit(&GitRequest::Commit {
            message: message.to_string(),
        })
    }

    fn set_author(&self, name: &str, email: &str) -> GitResult<()> {
        self.call_unit(&GitRequest::SetAuthor {
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    fn set_committer(&self, name: &str, email: &str) -> GitResult<()> {
        self.call_unit(&GitRequest::SetCommitter {
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    fn tag(&self, name: &str, message: &str) -> GitResult<()> {
        self.call_unit(&GitRequest::Tag {
            name: name.to_string(),
            message: message.to_string(),
        })
    }

    fn get_tags(&self) -> GitResult<Vec<GitObject>> {
        match self.channel.call(self.export, &GitRequest::GetTags)? {
            GitReply::Tags(tags) => Ok(tags),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn rev_list(&self, rev: &str) -> GitResult<Vec<ObjectId>> {
        match self.channel.call(
            self.export,
            &GitRequest::RevList {
                rev: rev.to_string(),
            },
        )? {
            GitReply::Revs(revs) => Ok(revs),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn repository(&self) -> GitResult<git2::Repository> {
        Err(RemotingError::HandleNotPortable.into())
    }

    fn clear_credentials(&self) -> GitResult<()> {
        self.call_unit(&GitRequest::ClearCredentials)
    }

    fn add_default_credentials(&self, credential: Credential) -> GitResult<()> {
        self.call_unit(&GitRequest::AddDefaultCredentials(credential))
    }

    fn set_proxy(&self, proxy: ProxyConfig) -> GitResult<()> {
        self.call_unit(&GitRequest::SetProxy(proxy))
    }
}

#[cfg(test)]
mod tests;
