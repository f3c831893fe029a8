// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process engine: the external `git` executable.
//!
//! ```text
//! ShellGit::run --> git.exe / git
//!   GCM_INTERACTIVE=never  GIT_TERMINAL_PROMPT=0
//!   GIT_AUTHOR_* / GIT_COMMITTER_* from client state
//!   -c http.proxy=...        from proxy descriptor
//!   -c credential.username=  from default credential
//! ```
//!
//! Child waits poll the interrupt flag; an interrupted wait kills the
//! child and surfaces `GitError::Interrupted`. A child killed by a
//! signal is reported the same way.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::backend::{lock_state, ClientState, InterruptHandle};
use crate::client::command::{
    ChangelogOpts, CheckoutOpts, CloneOpts, InitOpts, MergeOpts, SubmoduleUpdateOpts,
};
use crate::client::types::{Credential, GitObject, Identity, ObjectId, ProxyConfig};
use crate::client::GitBackend;
use crate::error::{GitError, GitResult};

/// Client bound to one workspace, executing through the `git` CLI.
#[derive(Debug)]
pub struct ShellGit {
    workspace: PathBuf,
    state: Mutex<ClientState>,
    interrupt: InterruptHandle,
}

impl ShellGit {
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

    /// Locate the git executable once per process.
    fn git_executable() -> GitResult<&'static Path> {
        static GIT: OnceLock<Option<PathBuf>> = OnceLock::new();
        GIT.get_or_init(|| which::which("git").ok())
            .as_deref()
            .ok_or_else(|| GitError::CommandFailed {
                command: "git".to_string(),
                message: "git executable not found in PATH".to_string(),
            })
    }

    /// Execute a git command in the workspace. ALWAYS sets
    /// `GCM_INTERACTIVE=never` and `GIT_TERMINAL_PROMPT=0`.
    fn run<S: AsRef<str>>(&self, args: &[S]) -> GitResult<String> {
        self.interrupt.check()?;
        let command_line = format!(
            "git {}",
            args.iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut cmd = Command::new(Self::git_executable()?);
        {
            let state = self.state();
            if let Some(proxy) = &state.proxy {
                cmd.arg("-c").arg(format!("http.proxy={}", proxy.url()));
            }
            if let Some(credential) = &state.credential {
                cmd.arg("-c")
                    .arg(format!("credential.username={}", credential.username));
            }
            if let Some(author) = &state.author {
                cmd.env("GIT_AUTHOR_NAME", author.name())
                    .env("GIT_AUTHOR_EMAIL", author.email());
            }
            if let Some(committer) = &state.committer {
                cmd.env("GIT_COMMITTER_NAME", committer.name())
                    .env("GIT_COMMITTER_EMAIL", committer.email());
            }
        }
        for arg in args {
            cmd.arg(arg.as_ref());
        }
        cmd.current_dir(&self.workspace)
            .env("GCM_INTERACTIVE", "never")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        trace!(command = %command_line, cwd = %self.workspace.display(), "spawning git");
        let mut child = cmd.spawn().map_err(|err| GitError::CommandFailed {
            command: command_line.clone(),
            message: format!("failed to spawn git: {err}"),
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // Poll so an interrupt can abort the child mid-operation.
        let status = loop {
            if self.interrupt.is_interrupted() {
                let _ = child.kill();
                let _ = child.wait();
                debug!(command = %command_line, "git child killed on interrupt");
                return Err(GitError::Interrupted);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                Err(err) => return Err(err.into()),
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            // Killed by a signal: treat as interruption, not failure.
            if status.code().is_none() {
                return Err(GitError::Interrupted);
            }
            return Err(GitError::CommandFailed {
                command: command_line,
                message: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

/// Collect a child pipe on its own thread so the poll loop never
/// deadlocks on a full pipe buffer.
fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl GitBackend for ShellGit {
    fn run_init(&self, opts: &InitOpts) -> GitResult<()> {
        std::fs::create_dir_all(&self.workspace)?;
        let mut args = vec!["init", "--quiet"];
        if opts.bare {
            args.push("--bare");
        }
        self.run(&args)?;
        Ok(())
    }

    fn run_clone(&self, opts: &CloneOpts) -> GitResult<()> {
        std::fs::create_dir_all(&self.workspace)?;
        let origin = opts.origin.as_deref().unwrap_or("origin");
        debug!(url = %opts.url, origin, shallow = opts.shallow, "cloning");

        self.run(&["init", "--quiet"])?;
        if let Some(reference) = &opts.reference {
            write_alternates(&self.workspace.join(".git"), Path::new(reference))?;
        }
        self.run(&["remote", "add", origin, &opts.url])?;

        let refspec = format!("+refs/heads/*:refs/remotes/{origin}/*");
        let mut args: Vec<String> = vec!["fetch".into(), "--tags".into(), "--quiet".into()];
        if opts.shallow {
            args.push("--depth".into());
            args.push("1".into());
        }
        args.push(origin.into());
        args.push(refspec);
        self.run(&args).map_err(|err| match err {
            GitError::CommandFailed { message, .. } => GitError::CloneFailed {
                url: opts.url.clone(),
                message,
            },
            other => other,
        })?;
        Ok(())
    }

    fn run_checkout(&self, opts: &CheckoutOpts) -> GitResult<()> {
        if opts.delete_branch_if_exist {
            if let Some(branch) = &opts.branch {
                // Branch may not exist yet; that is fine.
                let _ = self.run(&["branch", "-D", branch]);
            }
        }
        let result = match &opts.branch {
            Some(branch) => self.run(&["checkout", "-q", "-b", branch, &opts.ref_name]),
            None => self.run(&[
                "-c",
                "advice.detachedHead=false",
                "checkout",
                "-q",
                "-f",
                &opts.ref_name,
            ]),
        };
        result.map_err(|err| match err {
            GitError::CommandFailed { message, .. } => GitError::CheckoutFailed {
                what: opts.ref_name.clone(),
                message,
            },
            other => other,
        })?;
        Ok(())
    }

    fn run_merge(&self, opts: &MergeOpts) -> GitResult<()> {
        let revision = opts.revision.as_ref().ok_or_else(|| GitError::MergeFailed {
            revision: "<unset>".to_string(),
            message: "no revision to merge was set".to_string(),
        })?;
        self.run(&["merge", "--no-edit", revision.as_str()])
            .map_err(|err| match err {
                GitError::CommandFailed { message, .. } => GitError::MergeFailed {
                    revision: revision.to_string(),
                    message,
                },
                other => other,
            })?;
        Ok(())
    }

    fn run_submodule_update(&self, opts: &SubmoduleUpdateOpts) -> GitResult<()> {
        let mut args: Vec<String> = vec!["submodule".into(), "update".into(), "--init".into()];
        if opts.recursive {
            args.push("--recursive".into());
        }
        if opts.remote_tracking {
            args.push("--remote".into());
        }
        if let Some(reference) = &opts.reference {
            args.push("--reference".into());
            args.push(reference.clone());
        }
        self.run(&args)?;
        Ok(())
    }

    fn run_changelog(&self, opts: &ChangelogOpts) -> GitResult<String> {
        let mut args: Vec<String> =
            vec!["log".into(), "--pretty=raw".into(), "--no-abbrev".into()];
        if let Some(max) = opts.max_count {
            args.push("-n".into());
            args.push(max.to_string());
        }
        if opts.includes.is_empty() {
            args.push("HEAD".into());
        } else {
            args.extend(opts.includes.iter().cloned());
        }
        for exclude in &opts.excludes {
            args.push(format!("^{exclude}"));
        }
        let text = self.run(&args)?;
        if text.is_empty() {
            Ok(text)
        } else {
            Ok(format!("{text}\n"))
        }
    }

    fn add(&self, path: &str) -> GitResult<()> {
        self.run(&["add", path])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        self.run(&["commit", "--quiet", "-m", message])?;
        Ok(())
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
        self.run(&["tag", "-a", "-f", "-m", message, name])?;
        Ok(())
    }

    fn get_tags(&self) -> GitResult<Vec<GitObject>> {
        let output = self.run(&[
            "for-each-ref",
            "--format=%(refname:short) %(objectname) %(*objectname)",
            "refs/tags",
        ])?;
        let mut tags: Vec<GitObject> = output
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let name = parts.next()?.to_string();
                let object = parts.next()?;
                // Annotated tags carry a peeled commit id in the third field.
                let sha1 = parts.next().unwrap_or(object);
                Some(GitObject {
                    name,
                    sha1: ObjectId::new(sha1),
                })
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    fn rev_list(&self, rev: &str) -> GitResult<Vec<ObjectId>> {
        let output = self.run(&["rev-list", rev])?;
        Ok(output
            .lines()
            .filter(|line| !line.is_empty())
            .map(ObjectId::new)
            .collect())
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

/// Point `objects/info/alternates` at a reference repository's object
/// store, if the reference exists.
pub(crate) fn write_alternates(git_dir: &Path, reference: &Path) -> GitResult<()> {
    // A reference repository is either bare (objects/) or not (.git/objects/).
    let mut objects = reference.join("objects");
    if !objects.is_dir() {
        objects = reference.join(".git").join("objects");
    }
    if !objects.is_dir() {
        warn!(reference = %reference.display(), "reference repository not found, ignoring");
        return Ok(());
    }
    let info = git_dir.join("objects").join("info");
    std::fs::create_dir_all(&info)?;
    std::fs::write(info.join("alternates"), format!("{}\n", objects.display()))?;
    Ok(())
}
