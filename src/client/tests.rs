// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io;
use std::sync::Mutex;

use crate::client::command::{
    ChangelogOpts, CheckoutOpts, CloneOpts, InitOpts, MergeOpts, SubmoduleUpdateOpts,
};
use crate::client::types::{Credential, GitObject, Identity, ObjectId, ProxyConfig};
use crate::client::{GitBackend, GitClient};
use crate::error::{GitError, GitResult};

/// Records every primitive call so bridge translation can be asserted
/// without touching a real repository.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    RunInit(InitOpts),
    RunClone(CloneOpts),
    RunCheckout(CheckoutOpts),
    RunMerge(MergeOpts),
    RunSubmoduleUpdate(SubmoduleUpdateOpts),
    RunChangelog(ChangelogOpts),
    Add(String),
    Commit(String),
    SetAuthor(String, String),
    SetCommitter(String, String),
    Tag(String, String),
    GetTags,
    RevList(String),
    ClearCredentials,
    AddDefaultCredentials(Credential),
    SetProxy(ProxyConfig),
}

#[derive(Debug, Default)]
struct RecordingGit {
    calls: Mutex<Vec<Call>>,
    changelog_text: String,
}

impl RecordingGit {
    fn with_changelog(text: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            changelog_text: text.to_string(),
        }
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .expect("test mutex should not be poisoned")
            .push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .expect("test mutex should not be poisoned")
            .clone()
    }
}

impl GitBackend for RecordingGit {
    fn run_init(&self, opts: &InitOpts) -> GitResult<()> {
        self.record(Call::RunInit(opts.clone()));
        Ok(())
    }

    fn run_clone(&self, opts: &CloneOpts) -> GitResult<()> {
        self.record(Call::RunClone(opts.clone()));
        Ok(())
    }

    fn run_checkout(&self, opts: &CheckoutOpts) -> GitResult<()> {
        self.record(Call::RunCheckout(opts.clone()));
        Ok(())
    }

    fn run_merge(&self, opts: &MergeOpts) -> GitResult<()> {
        self.record(Call::RunMerge(opts.clone()));
        Ok(())
    }

    fn run_submodule_update(&self, opts: &SubmoduleUpdateOpts) -> GitResult<()> {
        self.record(Call::RunSubmoduleUpdate(opts.clone()));
        Ok(())
    }

    fn run_changelog(&self, opts: &ChangelogOpts) -> GitResult<String> {
        self.record(Call::RunChangelog(opts.clone()));
        Ok(self.changelog_text.clone())
    }

    fn add(&self, path: &str) -> GitResult<()> {
        self.record(Call::Add(path.to_string()));
        Ok(())
    }

    fn commit(&self, message: &str) -> GitResult<()> {
        self.record(Call::Commit(message.to_string()));
        Ok(())
    }

    fn set_author(&self, name: &str, email: &str) -> GitResult<()> {
        self.record(Call::SetAuthor(name.to_string(), email.to_string()));
        Ok(())
    }

    fn set_committer(&self, name: &str, email: &str) -> GitResult<()> {
        self.record(Call::SetCommitter(name.to_string(), email.to_string()));
        Ok(())
    }

    fn tag(&self, name: &str, message: &str) -> GitResult<()> {
        self.record(Call::Tag(name.to_string(), message.to_string()));
        Ok(())
    }

    fn get_tags(&self) -> GitResult<Vec<GitObject>> {
        self.record(Call::GetTags);
        Ok(Vec::new())
    }

    fn rev_list(&self, rev: &str) -> GitResult<Vec<ObjectId>> {
        self.record(Call::RevList(rev.to_string()));
        Ok(Vec::new())
    }

    fn repository(&self) -> GitResult<git2::Repository> {
        Err(GitError::Unsupported("no repository in this fake".into()))
    }

    fn clear_credentials(&self) -> GitResult<()> {
        self.record(Call::ClearCredentials);
        Ok(())
    }

    fn add_default_credentials(&self, credential: Credential) -> GitResult<()> {
        self.record(Call::AddDefaultCredentials(credential));
        Ok(())
    }

    fn set_proxy(&self, proxy: ProxyConfig) -> GitResult<()> {
        self.record(Call::SetProxy(proxy));
        Ok(())
    }
}

#[test]
fn test_clone_repository_shallow_only_when_requested() {
    let git = RecordingGit::default();
    git.clone_repository("https://example.com/repo.git", "origin", false, None)
        .expect("clone should succeed");
    git.clone_repository("https://example.com/repo.git", "upstream", true, Some("/cache"))
        .expect("clone should succeed");

    let calls = git.calls();
    assert_eq!(
        calls[0],
        Call::RunClone(CloneOpts {
            url: "https://example.com/repo.git".to_string(),
            origin: Some("origin".to_string()),
            reference: None,
            shallow: false,
        }),
        "plain clone must leave shallow and reference unset"
    );
    assert_eq!(
        calls[1],
        Call::RunClone(CloneOpts {
            url: "https://example.com/repo.git".to_string(),
            origin: Some("upstream".to_string()),
            reference: Some("/cache".to_string()),
            shallow: true,
        }),
        "requested options must all reach the engine"
    );
}

#[test]
fn test_checkout_variants_translate_distinctly() {
    let git = RecordingGit::default();
    git.checkout_ref("v1.0").expect("checkout_ref should succeed");
    git.checkout_with_branch("origin/main", "main")
        .expect("checkout_with_branch should succeed");
    git.checkout_branch("main", "origin/main")
        .expect("checkout_branch should succeed");

    let calls = git.calls();
    assert_eq!(
        calls[0],
        Call::RunCheckout(CheckoutOpts {
            ref_name: "v1.0".to_string(),
            branch: None,
            delete_branch_if_exist: false,
        })
    );
    assert_eq!(
        calls[1],
        Call::RunCheckout(CheckoutOpts {
            ref_name: "origin/main".to_string(),
            branch: Some("main".to_string()),
            delete_branch_if_exist: false,
        })
    );
    // Same ref and branch, but the branch-first variant deletes first.
    assert_eq!(
        calls[2],
        Call::RunCheckout(CheckoutOpts {
            ref_name: "origin/main".to_string(),
            branch: Some("main".to_string()),
            delete_branch_if_exist: true,
        })
    );
}

#[test]
fn test_submodule_overloads_map_to_expected_options() {
    let git = RecordingGit::default();
    git.submodule_update_recursive(true)
        .expect("overload should succeed");
    git.submodule_update_with_ref(false, "/cache")
        .expect("overload should succeed");
    git.submodule_update_with_tracking(true, true)
        .expect("overload should succeed");
    git.submodule_update_full(true, false, "/cache")
        .expect("overload should succeed");

    let expected = [
        SubmoduleUpdateOpts {
            recursive: true,
            reference: None,
            remote_tracking: false,
        },
        SubmoduleUpdateOpts {
            recursive: false,
            reference: Some("/cache".to_string()),
            remote_tracking: false,
        },
        SubmoduleUpdateOpts {
            recursive: true,
            reference: None,
            remote_tracking: true,
        },
        SubmoduleUpdateOpts {
            recursive: true,
            reference: Some("/cache".to_string()),
            remote_tracking: false,
        },
    ];
    let calls = git.calls();
    for (i, want) in expected.iter().enumerate() {
        assert_eq!(
            calls[i],
            Call::RunSubmoduleUpdate(want.clone()),
            "overload {i} produced the wrong options"
        );
    }
}

#[test]
fn test_merge_rev_passes_revision() {
    let git = RecordingGit::default();
    let rev = ObjectId::new("deadbeef");
    git.merge_rev(&rev).expect("merge_rev should succeed");
    assert_eq!(
        git.calls(),
        vec![Call::RunMerge(MergeOpts {
            revision: Some(rev),
        })]
    );
}

#[test]
fn test_none_identity_is_a_no_op() {
    let git = RecordingGit::default();
    git.set_author_identity(Some(&Identity::new("A", "a@example.com")))
        .expect("set_author_identity should succeed");
    git.set_author_identity(None)
        .expect("None identity should be a no-op, not an error");
    git.set_committer_identity(None)
        .expect("None identity should be a no-op, not an error");

    // Only the Some() call reached the backend; prior identities stand.
    assert_eq!(
        git.calls(),
        vec![Call::SetAuthor("A".to_string(), "a@example.com".to_string())]
    );
}

#[test]
fn test_commit_with_identities_installs_then_commits() {
    let git = RecordingGit::default();
    git.commit_with_identities(
        "msg",
        Some(&Identity::new("A", "a@example.com")),
        Some(&Identity::new("C", "c@example.com")),
    )
    .expect("commit_with_identities should succeed");
    assert_eq!(
        git.calls(),
        vec![
            Call::SetAuthor("A".to_string(), "a@example.com".to_string()),
            Call::SetCommitter("C".to_string(), "c@example.com".to_string()),
            Call::Commit("msg".to_string()),
        ]
    );

    let git = RecordingGit::default();
    git.commit_with_identities("msg", None, None)
        .expect("commit_with_identities should succeed");
    assert_eq!(
        git.calls(),
        vec![Call::Commit("msg".to_string())],
        "None identities must leave installed identities untouched"
    );
}

#[test]
fn test_set_credentials_clears_before_adding() {
    let git = RecordingGit::default();
    let credential = Credential {
        username: "bot".to_string(),
        secret: "hunter2".to_string(),
    };
    git.set_credentials(credential.clone())
        .expect("set_credentials should succeed");
    assert_eq!(
        git.calls(),
        vec![
            Call::ClearCredentials,
            Call::AddDefaultCredentials(credential),
        ],
        "replacement must clear first, then add"
    );
}

#[test]
fn test_changelog_writer_maps_range_and_fills_sink() {
    let git = RecordingGit::with_changelog("commit abc\n\n    msg\n\n");
    let mut out = String::new();
    git.changelog_writer("base", "tip", &mut out)
        .expect("changelog_writer should succeed");

    assert_eq!(
        git.calls(),
        vec![Call::RunChangelog(ChangelogOpts {
            excludes: vec!["base".to_string()],
            includes: vec!["tip".to_string()],
            max_count: None,
        })]
    );
    assert_eq!(out, "commit abc\n\n    msg\n\n");
}

#[test]
fn test_changelog_stream_matches_writer_output() {
    let text = "commit abc\n\n    héllo\n\n";
    let git = RecordingGit::with_changelog(text);

    let mut via_writer = String::new();
    git.changelog_writer("base", "tip", &mut via_writer)
        .expect("changelog_writer should succeed");

    let mut via_stream: Vec<u8> = Vec::new();
    git.changelog_stream("base", "tip", &mut via_stream)
        .expect("changelog_stream should succeed");

    assert_eq!(
        via_stream,
        via_writer.as_bytes(),
        "stream and writer variants must produce identical bytes"
    );
}

#[test]
fn test_changelog_without_sink_fails_before_the_walk() {
    let git = RecordingGit::with_changelog("commit abc\n");
    let result = git.changelog().includes("HEAD").execute();
    assert!(
        matches!(result, Err(GitError::Sink(_))),
        "a changelog with no sink is a caller bug, got: {result:?}"
    );
    assert_eq!(
        git.calls(),
        Vec::new(),
        "the backend must not be asked for a log nobody receives"
    );
}

#[test]
fn test_changelog_stream_surfaces_io_error() {
    struct FailingStream;
    impl io::Write for FailingStream {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let git = RecordingGit::with_changelog("commit abc\n");
    let result = git.changelog_stream("base", "tip", &mut FailingStream);
    match result {
        Err(GitError::Io(err)) => {
            assert_eq!(err.to_string(), "disk full", "the original io error survives");
        }
        other => panic!("expected the io error back, got: {other:?}"),
    }
}

#[test]
fn test_builder_accessors_start_fresh() {
    let git = RecordingGit::default();
    git.clone_()
        .url("https://example.com/a.git")
        .shallow(true)
        .execute()
        .expect("clone should succeed");
    // A second builder from the same client carries none of the first
    // request's options.
    git.clone_()
        .url("https://example.com/b.git")
        .execute()
        .expect("clone should succeed");

    let calls = git.calls();
    assert_eq!(
        calls[1],
        Call::RunClone(CloneOpts {
            url: "https://example.com/b.git".to_string(),
            origin: None,
            reference: None,
            shallow: false,
        })
    );
}

#[test]
fn test_with_repository_propagates_acquisition_error() {
    let git = RecordingGit::default();
    let result = git.with_repository(|_, _| Ok(()));
    assert!(
        matches!(result, Err(GitError::Unsupported(_))),
        "handle acquisition failure must be rethrown, got: {result:?}"
    );
}
