// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use crate::backend::ShellGit;
use crate::client::{GitBackend, GitClient};
use crate::error::{GitError, RemotingError};
use crate::remoting::{current_channel, export, Channel};

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

fn seed_repo(engine: &dyn GitBackend, workspace: &Path) {
    engine.run_init(&Default::default()).expect("init failed");
    engine
        .set_author("Test", "test@example.com")
        .expect("set_author failed");
    engine
        .set_committer("Test", "test@example.com")
        .expect("set_committer failed");
    std::fs::write(workspace.join("readme.txt"), "hello\n").expect("failed to write file");
    engine.add("readme.txt").expect("add failed");
    engine.commit("Initial commit").expect("commit failed");
}

fn assert_remoting(result: &GitError, want: fn(&RemotingError) -> bool) {
    match result {
        GitError::Remoting(inner) if want(inner) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_export_without_channel_fails_fast() {
    let temp = temp_dir();
    let backend: Arc<dyn GitBackend + Send + Sync> = Arc::new(ShellGit::new(temp.path()));
    let result = export(backend);
    match result {
        Err(err) => assert_remoting(&err, |e| matches!(e, RemotingError::NoChannel)),
        Ok(_) => panic!("export outside a channel scope must fail"),
    }
}

#[test]
fn test_channel_guard_scopes_the_current_channel() {
    assert!(current_channel().is_none(), "no channel before entering");
    let channel = Channel::open().expect("channel should open");
    {
        let _guard = channel.enter();
        assert!(
            current_channel().is_some(),
            "channel should be current inside the scope"
        );
    }
    assert!(
        current_channel().is_none(),
        "dropping the guard must pop the channel"
    );
}

#[test]
fn test_proxy_operations_reach_the_real_backend() {
    let temp = temp_dir();
    let real = Arc::new(ShellGit::new(temp.path()));
    seed_repo(real.as_ref(), temp.path());

    let channel = Channel::open().expect("channel should open");
    let _guard = channel.enter();
    let proxy = export(real.clone()).expect("export should succeed inside the scope");

    proxy
        .tag("via-proxy", "tag created through the channel")
        .expect("proxied tag should succeed");

    // Visible through a direct query against the real backend.
    let tags = real.get_tags().expect("get_tags should succeed");
    assert_eq!(tags.len(), 1, "expected the proxied tag, got: {tags:?}");
    assert_eq!(tags[0].name, "via-proxy");

    // Replies carry data back too.
    let proxied_tags = proxy.get_tags().expect("proxied get_tags should succeed");
    assert_eq!(proxied_tags, tags, "both sides must see the same tags");
}

#[test]
fn test_bridge_methods_work_on_a_proxy() {
    let temp = temp_dir();
    let real = Arc::new(ShellGit::new(temp.path()));
    seed_repo(real.as_ref(), temp.path());

    let channel = Channel::open().expect("channel should open");
    let _guard = channel.enter();
    let proxy = export(real).expect("export should succeed");

    // The legacy bridge is blanket-implemented, so it translates on the
    // proxy exactly as it does on a local client.
    proxy
        .checkout_branch("work", "HEAD")
        .expect("bridged checkout should relay");
    let mut out = String::new();
    proxy
        .changelog()
        .max(1)
        .to(&mut out)
        .execute()
        .expect("proxied changelog should succeed");
    assert!(
        out.contains("Initial commit"),
        "changelog text should cross the wire, got:\n{out}"
    );
}

#[test]
fn test_interruption_survives_the_wire() {
    let temp = temp_dir();
    let real = Arc::new(ShellGit::new(temp.path()));
    real.interrupt_handle().interrupt();

    let channel = Channel::open().expect("channel should open");
    let _guard = channel.enter();
    let proxy = export(real).expect("export should succeed");

    let result = proxy.init_().execute();
    assert!(
        matches!(result, Err(GitError::Interrupted)),
        "far-side interruption must come back as Interrupted, got: {result:?}"
    );
}

#[test]
fn test_operation_failure_comes_back_as_remote() {
    let temp = temp_dir();
    // Workspace is not a repository, so rev_list fails on the far side.
    let real = Arc::new(ShellGit::new(temp.path()));

    let channel = Channel::open().expect("channel should open");
    let _guard = channel.enter();
    let proxy = export(real).expect("export should succeed");

    let result = proxy.rev_list("HEAD");
    assert!(
        matches!(result, Err(GitError::Remote(_))),
        "far-side operation failure must come back as Remote, got: {result:?}"
    );
}

#[test]
fn test_repository_handle_never_crosses() {
    let temp = temp_dir();
    let real = Arc::new(ShellGit::new(temp.path()));
    seed_repo(real.as_ref(), temp.path());

    let channel = Channel::open().expect("channel should open");
    let _guard = channel.enter();
    let proxy = export(real).expect("export should succeed");

    match proxy.repository() {
        Err(err) => assert_remoting(&err, |e| matches!(e, RemotingError::HandleNotPortable)),
        Ok(_) => panic!("a repository handle must not cross the channel"),
    }
}

#[test]
fn test_guards_dropped_out_of_order_remove_their_own_channel() {
    let first = Channel::open().expect("channel should open");
    let second = Channel::open().expect("channel should open");
    let first_guard = first.enter();
    let second_guard = second.enter();

    // Dropping the outer guard first must not evict the inner channel.
    drop(first_guard);
    let current = current_channel().expect("a channel should still be current");
    assert!(
        Arc::ptr_eq(&current, &second),
        "the surviving guard's channel must stay current"
    );

    drop(second_guard);
    assert!(
        current_channel().is_none(),
        "no channel should remain after both guards drop"
    );
}

#[test]
fn test_innermost_channel_wins() {
    let outer = Channel::open().expect("channel should open");
    let inner = Channel::open().expect("channel should open");
    let _outer_guard = outer.enter();
    let _inner_guard = inner.enter();

    let current = current_channel().expect("a channel should be current");
    assert!(
        Arc::ptr_eq(&current, &inner),
        "export must bind to the innermost entered channel"
    );
}
