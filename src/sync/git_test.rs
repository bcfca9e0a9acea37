use crate::sync::git::*;
use crate::sync::test_support::{git, git_available, init_bare};
use mockall::predicate::*;
use std::path::Path;
use tempfile::TempDir;

fn auth() -> GitAuth {
    GitAuth::Basic {
        username: "git".to_string(),
        password: "unused".to_string(),
    }
}

#[test]
fn test_mock_git_init_failure() {
    let mut mock = MockGitOps::new();

    mock.expect_init()
        .with(eq(Path::new("/tmp/test")), eq("master"))
        .times(1)
        .returning(|_, _| Err(GitError::GitNotFound));

    let result = mock.init(Path::new("/tmp/test"), "master");
    assert!(matches!(result.unwrap_err(), GitError::GitNotFound));
}

#[test]
fn test_mock_push_rejected() {
    let mut mock = MockGitOps::new();

    mock.expect_push()
        .with(
            eq(Path::new("/tmp/test")),
            eq("origin"),
            eq("master"),
            always(),
        )
        .times(1)
        .returning(|_, _, _, _| Err(GitError::NonFastForward));

    let result = mock.push(Path::new("/tmp/test"), "origin", "master", &auth());
    assert!(matches!(result, Err(GitError::NonFastForward)));
}

#[test]
fn test_real_init_sets_unborn_branch() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let git_ops = RealGit::new();

    git_ops.init(temp_dir.path(), "master").unwrap();

    let head = git(temp_dir.path(), &["symbolic-ref", "HEAD"]);
    assert_eq!(head.trim(), "refs/heads/master");
    assert_eq!(git_ops.resolve_ref(temp_dir.path(), "HEAD").unwrap(), None);
}

#[test]
fn test_real_remote_url_roundtrip() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let git_ops = RealGit::new();
    git_ops.init(temp_dir.path(), "master").unwrap();

    assert_eq!(git_ops.remote_url(temp_dir.path(), "origin").unwrap(), None);

    git_ops
        .add_remote(temp_dir.path(), "origin", "/srv/a.git")
        .unwrap();
    assert_eq!(
        git_ops.remote_url(temp_dir.path(), "origin").unwrap(),
        Some("/srv/a.git".to_string())
    );

    git_ops.remove_remote(temp_dir.path(), "origin").unwrap();
    assert_eq!(git_ops.remote_url(temp_dir.path(), "origin").unwrap(), None);
}

#[test]
fn test_real_staged_changes_and_commit() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let git_ops = RealGit::new();
    git_ops.init(temp_dir.path(), "master").unwrap();
    std::fs::write(temp_dir.path().join("documents.jsonl"), "{}\n").unwrap();

    assert!(!git_ops.has_staged_changes(temp_dir.path()).unwrap());
    git_ops
        .add_files(temp_dir.path(), &["documents.jsonl".to_string()])
        .unwrap();
    assert!(git_ops.has_staged_changes(temp_dir.path()).unwrap());

    git_ops.commit(temp_dir.path(), "first").unwrap();

    assert!(!git_ops.has_staged_changes(temp_dir.path()).unwrap());
    assert!(git_ops.resolve_ref(temp_dir.path(), "HEAD").unwrap().is_some());
    let author = git(temp_dir.path(), &["log", "-1", "--format=%an <%ae>"]);
    assert_eq!(author.trim(), "draftsync <backup@draftsync.local>");
}

#[test]
fn test_real_push_to_empty_bare_then_up_to_date() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let remote = temp_dir.path().join("remote.git");
    let work = temp_dir.path().join("work");
    init_bare(&remote);
    std::fs::create_dir_all(&work).unwrap();
    let git_ops = RealGit::new();
    git_ops.init(&work, "master").unwrap();
    git_ops
        .add_remote(&work, "origin", remote.to_str().unwrap())
        .unwrap();

    assert!(git_ops.list_remote(&work, "origin", &auth()).unwrap().is_empty());

    std::fs::write(work.join("themes.jsonl"), "{}\n").unwrap();
    git_ops
        .add_files(&work, &["themes.jsonl".to_string()])
        .unwrap();
    git_ops.commit(&work, "first").unwrap();

    assert_eq!(
        git_ops.push(&work, "origin", "master", &auth()).unwrap(),
        PushOutcome::Pushed
    );
    assert_eq!(
        git_ops.push(&work, "origin", "master", &auth()).unwrap(),
        PushOutcome::UpToDate
    );
    assert_eq!(
        git_ops.list_remote(&work, "origin", &auth()).unwrap(),
        vec!["refs/heads/master".to_string()]
    );
}

#[test]
fn test_real_divergent_push_is_non_fast_forward_and_merge_conflicts() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let remote = temp_dir.path().join("remote.git");
    init_bare(&remote);
    let git_ops = RealGit::new();

    let mut clones = Vec::new();
    for name in ["a", "b"] {
        let work = temp_dir.path().join(name);
        std::fs::create_dir_all(&work).unwrap();
        git_ops.init(&work, "master").unwrap();
        git_ops
            .add_remote(&work, "origin", remote.to_str().unwrap())
            .unwrap();
        clones.push(work);
    }
    let (a, b) = (&clones[0], &clones[1]);

    std::fs::write(a.join("documents.jsonl"), "{\"uuid\":\"1\",\"title\":\"a\"}\n").unwrap();
    git_ops.add_files(a, &["documents.jsonl".to_string()]).unwrap();
    git_ops.commit(a, "from a").unwrap();
    git_ops.push(a, "origin", "master", &auth()).unwrap();

    std::fs::write(b.join("documents.jsonl"), "{\"uuid\":\"1\",\"title\":\"b\"}\n").unwrap();
    git_ops.add_files(b, &["documents.jsonl".to_string()]).unwrap();
    git_ops.commit(b, "from b").unwrap();

    let pushed = git_ops.push(b, "origin", "master", &auth());
    assert!(matches!(pushed, Err(GitError::NonFastForward)));

    git_ops.fetch(b, "origin", &auth()).unwrap();
    let remote_head = git_ops
        .resolve_ref(b, "refs/remotes/origin/master")
        .unwrap()
        .unwrap();
    assert!(!git_ops.is_ancestor(b, &remote_head, "HEAD").unwrap());

    let outcome = git_ops.merge(b, "refs/remotes/origin/master", false).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Conflicted(vec!["documents.jsonl".to_string()])
    );
    let content = std::fs::read_to_string(b.join("documents.jsonl")).unwrap();
    assert!(content.contains("<<<<<<<"));
}

#[test]
fn test_ssh_command_keeps_host_key_checking() {
    let command = ssh_command("/home/me/.ssh/id ed25519");

    assert_eq!(
        command,
        "ssh -i '/home/me/.ssh/id ed25519' -o IdentitiesOnly=yes"
    );
    assert!(!command.contains("StrictHostKeyChecking"));
}
