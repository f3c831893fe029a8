// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library engine: in-process libgit2.
//!
//! ```text
//! LibGit op --> cache::with_repository(workspace, |repo| ...)
//!                  revparse / revwalk / index / merge / tag
//! ```
//!
//! Repository access goes through the process-wide handle cache; the
//! post-operation reset in `GitClient::with_repository` bounds the file
//! descriptors those handles hold open.
//!
//! Engine gaps versus the CLI: remote-tracking submodule update is
//! reported as `GitError::Unsupported`, and a submodule reference
//! repository is ignored.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::backend::{cache, lock_state, ClientState, InterruptHandle};
use crate::client::command::{
    ChangelogOpts, CheckoutOpts, CloneOpts, InitOpts, MergeOpts, SubmoduleUpdateOpts,
};
use crate::client::types::{Credential, GitObject, Identity, ObjectId, ProxyConfig};
use crate::client::GitBackend;
use crate::error::{GitError, GitResult};

/// Client bound to one workspace, executing in-process through libgit2.
#[derive(Debug)]
pub struct LibGit {
    workspace: PathBuf,
    state: Mutex<ClientState>,
    interrupt: InterruptHandle,
}

impl LibGit {
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            state: Mutex::new(ClientState::default()),
            interrupt: InterruptHandle::default(),
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Handle other threads can use to abort this client's operations.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        lock_state(&self.state)
    }

    fn with_repo<T>(&self, f: impl FnOnce(&git2::Repository) -> GitResult<T>) -> GitResult<T> {
        self.interrupt.check()?;
        cache::with_repository(&self.workspace, f)
    }

    /// Identity from client state, falling back to repository config.
    fn signature_from(
        identity: Option<&Identity>,
        repo: &git2::Repository,
    ) -> GitResult<git2::Signature<'static>> {
        match identity {
            Some(p) => git2::Signature::now(p.name(), p.email()).map_err(Into::into),
            None => repo.signature().map_err(Into::into),
        }
    }

    fn update_submodules(&self, repo: &git2::Repository, recursive: bool) -> GitResult<()> {
        for mut submodule in repo.submodules().map_err(Box::new)? {
            self.interrupt.check()?;
            trace!(
                submodule = submodule.name().unwrap_or("<non-utf8>"),
                "updating submodule"
            );
            let mut opts = git2::SubmoduleUpdateOptions::new();
            submodule.update(true, Some(&mut opts)).map_err(Box::new)?;
            if recursive {
                if let Ok(child) = submodule.open() {
                    self.update_submodules(&child, true)?;
                }
            }
        }
        Ok(())
    }
}

impl GitBackend for LibGit {
    fn run_init(&self, opts: &InitOpts) -> GitResult<()> {
        self.interrupt.check()?;
        std::fs::create_dir_all(&self.workspace)?;
        if opts.bare {
            let mut init = git2::RepositoryInitOptions::new();
            init.bare(true);
            git2::Repository::init_opts(&self.workspace, &init).map_err(Box::new)?;
        } else {
            git2::Repository::init(&self.workspace).map_err(Box::new)?;
        }
        Ok(())
    }

    fn run_clone(&self, opts: &CloneOpts) -> GitResult<()> {
        self.interrupt.check()?;
        std::fs::create_dir_all(&self.workspace)?;
        let origin = opts.origin.as_deref().unwrap_or("origin");
        debug!(url = %opts.url, origin, shallow = opts.shallow, "cloning");

        let repo = git2::Repository::init(&self.workspace).map_err(Box::new)?;
        if let Some(reference) = &opts.reference {
            super::shell::write_alternates(repo.path(), Path::new(reference))?;
        }

        let refspec = format!("+refs/heads/*:refs/remotes/{origin}/*");
        let mut remote = repo
            .remote_with_fetch(origin, &opts.url, &refspec)
            .map_err(Box::new)?;

        let mut callbacks = git2::RemoteCallbacks::new();
        let mut fetch = git2::FetchOptions::new();
        {
            let state = self.state();
            if let Some(credential) = state.credential.clone() {
                callbacks.credentials(move |_url, username_from_url, _allowed| {
                    git2::Cred::userpass_plaintext(
                        username_from_url.unwrap_or(&credential.username),
                        &credential.secret,
                    )
                });
            }
            if let Some(proxy) = &state.proxy {
                let mut proxy_opts = git2::ProxyOptions::new();
                proxy_opts.url(&proxy.url());
                fetch.proxy_options(proxy_opts);
            }
        }
        fetch.remote_callbacks(callbacks);
        fetch.download_tags(git2::AutotagOption::All);
        if opts.shallow {
            fetch.depth(1);
        }

        remote
            .fetch::<&str>(&[], Some(&mut fetch), None)
            .map_err(|err| GitError::CloneFailed {
                url: opts.url.clone(),
                message: err.message().to_string(),
            })?;
        Ok(())
    }

    fn run_checkout(&self, opts: &CheckoutOpts) -> GitResult<()> {
        self.with_repo(|repo| {
            let failed = |err: &git2::Error| GitError::CheckoutFailed {
                what: opts.ref_name.clone(),
                message: err.message().to_string(),
            };
            let object = repo
                .revparse_single(&opts.ref_name)
                .map_err(|e| failed(&e))?;
            let commit = object.peel_to_commit().map_err(|e| failed(&e))?;

            match &opts.branch {
                Some(branch) => {
                    if opts.delete_branch_if_exist {
                        if let Ok(mut existing) = repo.find_branch(branch, git2::BranchType::Local)
                        {
                            debug!(branch, "deleting existing branch before checkout");
                            existing.delete().map_err(Box::new)?;
                        }
                    }
                    repo.branch(branch, &commit, false).map_err(|e| failed(&e))?;
                    repo.set_head(&format!("refs/heads/{branch}"))
                        .map_err(Box::new)?;
                }
                None => {
                    repo.set_head_detached(commit.id()).map_err(Box::new)?;
                }
            }

            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.force();
            repo.checkout_head(Some(&mut checkout)).map_err(Box::new)?;
            Ok(())
        })
    }

    fn run_merge(&self, opts: &MergeOpts) -> GitResult<()> {
        let revision = opts.revision.as_ref().ok_or_else(|| GitError::MergeFailed {
            revision: "<unset>".to_string(),
            message: "no revision to merge was set".to_string(),
        })?;
        self.with_repo(|repo| {
            let oid = git2::Oid::from_str(revision.as_str()).map_err(Box::new)?;
            let theirs = repo.find_annotated_commit(oid).map_err(Box::new)?;
            let (analysis, _) = repo.merge_analysis(&[&theirs]).map_err(Box::new)?;

            if analysis.is_up_to_date() {
                return Ok(());
            }

            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.force();

            if analysis.is_fast_forward() {
                match repo.head() {
                    Ok(head) if head.is_branch() => {
                        let name = head.name().unwrap_or("HEAD").to_string();
                        repo.reference(&name, oid, true, "merge: fast-forward")
                            .map_err(Box::new)?;
                        repo.set_head(&name).map_err(Box::new)?;
                    }
                    _ => {
                        repo.set_head_detached(oid).map_err(Box::new)?;
                    }
                }
                repo.checkout_head(Some(&mut checkout)).map_err(Box::new)?;
                return Ok(());
            }

            repo.merge(&[&theirs], None, Some(&mut checkout))
                .map_err(Box::new)?;
            let mut index = repo.index().map_err(Box::new)?;
            if index.has_conflicts() {
                repo.cleanup_state().map_err(Box::new)?;
                return Err(GitError::MergeFailed {
                    revision: revision.to_string(),
                    message: "merge produced conflicts".to_string(),
                });
            }

            let tree_id = index.write_tree().map_err(Box::new)?;
            let tree = repo.find_tree(tree_id).map_err(Box::new)?;
            let head_commit = repo
                .head()
                .and_then(|head| head.peel_to_commit())
                .map_err(Box::new)?;
            let their_commit = repo.find_commit(oid).map_err(Box::new)?;

            let (author, committer) = {
                let state = self.state();
                (
                    Self::signature_from(state.author.as_ref(), repo)?,
                    Self::signature_from(state.committer.as_ref(), repo)?,
                )
            };
            let message = format!("Merge commit '{revision}'");
            repo.commit(
                Some("HEAD"),
                &author,
                &committer,
                &message,
                &tree,
                &[&head_commit, &their_commit],
            )
            .map_err(Box::new)?;
            repo.cleanup_state().map_err(Box::new)?;
            Ok(())
        })
    }

    fn run_submodule_update(&self, opts: &SubmoduleUpdateOpts) -> GitResult<()> {
        if opts.remote_tracking {
            return Err(GitError::Unsupported(
                "remote tracking submodule update is not available in the libgit2 engine".into(),
            ));
        }
        if opts.reference.is_some() {
            debug!("libgit2 engine ignores submodule reference repositories");
        }
        self.with_repo(|repo| self.update_submodules(repo, opts.recursive))
    }

    fn run_changelog(&self, opts: &ChangelogOpts) -> GitResult<String> {
        self.with_repo(|repo| {
            let mut walk = repo.revwalk().map_err(Box::new)?;
            walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
                .map_err(Box::new)?;
            if opts.includes.is_empty() {
                walk.push_head().map_err(Box::new)?;
            } else {
                for include in &opts.includes {
                    let commit = repo
                        .revparse_single(include)
                        .and_then(|obj| obj.peel_to_commit())
                        .map_err(Box::new)?;
                    walk.push(commit.id()).map_err(Box::new)?;
                }
            }
            for exclude in &opts.excludes {
                let commit = repo
                    .revparse_single(exclude)
                    .and_then(|obj| obj.peel_to_commit())
                    .map_err(Box::new)?;
                walk.hide(commit.id()).map_err(Box::new)?;
            }

            let mut text = String::new();
            let mut emitted = 0usize;
            for oid in walk {
                if opts.max_count.is_some_and(|max| emitted >= max) {
                    break;
                }
                self.interrupt.check()?;
                let commit = repo.find_commit(oid.map_err(Box::new)?).map_err(Box::new)?;
                format_raw_commit(&mut text, &commit);
                emitted += 1;
            }
            Ok(text)
        })
    }

    fn add(&self, path: &str) -> GitResult<()> {
        self.with_repo(|repo| {
            let mut index = repo.index().map_err(Box::new)?;
            index
                .add_all([path], git2::IndexAddOption::DEFAULT, None)
                .map_err(Box::new)?;
            index.write().map_err(Box::new)?;
            Ok(())
        })
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        self.with_repo(|repo| {
            let (author, committer) = {
                let state = self.state();
                (
                    Self::signature_from(state.author.as_ref(), repo)?,
                    Self::signature_from(state.committer.as_ref(), repo)?,
                )
            };
            let mut index = repo.index().map_err(Box::new)?;
            let tree_id = index.write_tree().map_err(Box::new)?;
            let tree = repo.find_tree(tree_id).map_err(Box::new)?;
            // Unborn HEAD means this is the initial commit.
            let parent = repo.head().and_then(|head| head.peel_to_commit()).ok();
            let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
            repo.commit(Some("HEAD"), &author, &committer, message, &tree, &parents)
                .map_err(Box::new)?;
            Ok(())
        })
    }

    fn set_author(&self, name: &str, email: &str) -> GitResult<()> {
        self.state().author = Some(Identity::new(name, email));
        Ok(())
    }

    fn set_committer(&self, name: &str, email: &str) -> GitResult<()> {
        self.state().committer = Some(Identity::new(name, email));
        Ok(())
    }

    fn tag(&self, name: &str, message: &str) -> GitResult<()> {
        self.with_repo(|repo| {
            let tagger = {
                let state = self.state();
                Self::signature_from(state.committer.as_ref().or(state.author.as_ref()), repo)?
            };
            let head = repo
                .head()
                .and_then(|head| head.peel_to_commit())
                .map_err(Box::new)?;
            repo.tag(name, head.as_object(), &tagger, message, true)
                .map_err(Box::new)?;
            Ok(())
        })
    }

    fn get_tags(&self) -> GitResult<Vec<GitObject>> {
        self.with_repo(|repo| {
            let mut tags = Vec::new();
            for reference in repo.references_glob("refs/tags/*").map_err(Box::new)? {
                let reference = reference.map_err(Box::new)?;
                let Some(name) = reference.shorthand().map(str::to_owned) else {
                    continue;
                };
                // Peels annotated tag objects and packed refs alike, so a
                // packed lightweight tag resolves like any other.
                let commit = reference.peel_to_commit().map_err(Box::new)?;
                tags.push(GitObject {
                    name,
                    sha1: commit.id().into(),
                });
            }
            tags.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(tags)
        })
    }

    fn rev_list(&self, rev: &str) -> GitResult<Vec<ObjectId>> {
        self.with_repo(|repo| {
            let commit = repo
                .revparse_single(rev)
                .and_then(|obj| obj.peel_to_commit())
                .map_err(Box::new)?;
            let mut walk = repo.revwalk().map_err(Box::new)?;
            walk.push(commit.id()).map_err(Box::new)?;
            let mut revs = Vec::new();
            for oid in walk {
                revs.push(oid.map_err(Box::new)?.into());
            }
            Ok(revs)
        })
    }

    fn repository(&self) -> GitResult<git2::Repository> {
        git2::Repository::open(&self.workspace).map_err(Into::into)
    }

    fn clear_credentials(&self) -> GitResult<()> {
        self.state().credential = None;
        Ok(())
    }

    fn add_default_credentials(&self, credential: Credential) -> GitResult<()> {
        self.state().credential = Some(credential);
        Ok(())
    }

    fn set_proxy(&self, proxy: ProxyConfig) -> GitResult<()> {
        self.state().proxy = Some(proxy);
        Ok(())
    }
}

/// Append one commit in `git log --pretty=raw` shape.
fn format_raw_commit(out: &mut String, commit: &git2::Commit<'_>) {
    let _ = writeln!(out, "commit {}", commit.id());
    let _ = writeln!(out, "tree {}", commit.tree_id());
    for parent in commit.parent_ids() {
        let _ = writeln!(out, "parent {parent}");
    }
    let _ = writeln!(out, "author {}", format_signature(&commit.author()));
    let _ = writeln!(out, "committer {}", format_signature(&commit.committer()));
    let _ = writeln!(out);
    for line in commit.message().unwrap_or("").trim_end().lines() {
        let _ = writeln!(out, "    {line}");
    }
    let _ = writeln!(out);
}

fn format_signature(signature: &git2::Signature<'_>) -> String {
    let when = signature.when();
    let offset = when.offset_minutes();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "{} <{}> {} {sign}{:02}{:02}",
        signature.name().unwrap_or(""),
        signature.email().unwrap_or(""),
        when.seconds(),
        offset / 60,
        offset % 60
    )
}
