use crate::config::{AuthMethod, SyncConfig};
use crate::sync::git::{GitAuth, GitError, MockGitOps};
use crate::sync::repository::*;
use mockall::predicate::*;
use tempfile::TempDir;

fn config(method: AuthMethod) -> SyncConfig {
    SyncConfig {
        enabled: true,
        repo_url: "https://example.com/notes.git".to_string(),
        auth_method: method,
        ..SyncConfig::default()
    }
}

#[test]
fn test_resolve_token_uses_fixed_username() {
    let config = SyncConfig {
        token: "ghp_abc".to_string(),
        ..config(AuthMethod::Token)
    };

    let auth = resolve_auth(&config).unwrap();

    assert_eq!(
        auth,
        GitAuth::Basic {
            username: "git".to_string(),
            password: "ghp_abc".to_string(),
        }
    );
}

#[test]
fn test_resolve_blank_token_fails() {
    let config = SyncConfig {
        token: "  ".to_string(),
        ..config(AuthMethod::Token)
    };

    let result = resolve_auth(&config);

    assert!(matches!(
        result,
        Err(AuthError::MissingField { field: "token", .. })
    ));
}

#[test]
fn test_resolve_user_pass_requires_both_fields() {
    let config = SyncConfig {
        username: "me".to_string(),
        ..config(AuthMethod::UserPass)
    };

    assert!(matches!(
        resolve_auth(&config),
        Err(AuthError::MissingField {
            field: "password",
            ..
        })
    ));
}

#[test]
fn test_resolve_ssh_key_checks_file_and_passphrase() {
    let temp_dir = TempDir::new().unwrap();
    let key = temp_dir.path().join("id_ed25519");
    std::fs::write(&key, "key").unwrap();
    let key_path = key.to_str().unwrap().to_string();

    let without = SyncConfig {
        ssh_key_path: key_path.clone(),
        ..config(AuthMethod::SshKey)
    };
    assert_eq!(
        resolve_auth(&without).unwrap(),
        GitAuth::SshKey {
            path: key_path.clone(),
            passphrase: None,
        }
    );

    let with = SyncConfig {
        ssh_key_passphrase: "pw".to_string(),
        ..without.clone()
    };
    assert_eq!(
        resolve_auth(&with).unwrap(),
        GitAuth::SshKey {
            path: key_path,
            passphrase: Some("pw".to_string()),
        }
    );

    let missing = SyncConfig {
        ssh_key_path: temp_dir.path().join("nope").to_str().unwrap().to_string(),
        ..config(AuthMethod::SshKey)
    };
    assert!(matches!(
        resolve_auth(&missing),
        Err(AuthError::KeyNotFound { .. })
    ));
}

#[test]
fn test_ensure_repository_creates_dir_gitignore_and_repo() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("backup");

    let mut mock_git = MockGitOps::new();
    mock_git
        .expect_init()
        .with(eq(dir.clone()), eq("master"))
        .times(1)
        .returning(|_, _| Ok(()));

    let manager = RepoManager::new(mock_git, dir.clone());
    let result = manager.ensure_repository().unwrap();

    assert_eq!(result, InitResult::Created);
    assert_eq!(
        std::fs::read_to_string(dir.join(".gitignore")).unwrap(),
        "*.tmp\n*.log\n"
    );
}

#[test]
fn test_ensure_repository_opens_existing_and_keeps_gitignore() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
    std::fs::write(temp_dir.path().join(".gitignore"), "custom\n").unwrap();

    let mut mock_git = MockGitOps::new();
    mock_git.expect_init().times(0);

    let manager = RepoManager::new(mock_git, temp_dir.path().to_path_buf());

    assert_eq!(manager.ensure_repository().unwrap(), InitResult::Opened);
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join(".gitignore")).unwrap(),
        "custom\n"
    );
}

#[test]
fn test_reconcile_remote_adds_missing_origin() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();

    let mut mock_git = MockGitOps::new();
    mock_git
        .expect_remote_url()
        .with(eq(dir.clone()), eq("origin"))
        .times(1)
        .returning(|_, _| Ok(None));
    mock_git
        .expect_add_remote()
        .with(eq(dir.clone()), eq("origin"), eq("/srv/a.git"))
        .times(1)
        .returning(|_, _, _| Ok(()));
    mock_git.expect_remove_remote().times(0);

    let manager = RepoManager::new(mock_git, dir);

    assert_eq!(
        manager.reconcile_remote("/srv/a.git").unwrap(),
        RemoteChange::Added
    );
}

#[test]
fn test_reconcile_remote_replaces_different_url() {
    let temp_dir = TempDir::new().unwrap();

    let mut mock_git = MockGitOps::new();
    mock_git
        .expect_remote_url()
        .returning(|_, _| Ok(Some("/srv/old.git".to_string())));
    mock_git
        .expect_remove_remote()
        .with(always(), eq("origin"))
        .times(1)
        .returning(|_, _| Ok(()));
    mock_git
        .expect_add_remote()
        .with(always(), eq("origin"), eq("/srv/new.git"))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let manager = RepoManager::new(mock_git, temp_dir.path().to_path_buf());

    assert_eq!(
        manager.reconcile_remote("/srv/new.git").unwrap(),
        RemoteChange::Replaced
    );
}

#[test]
fn test_reconcile_remote_same_url_is_noop() {
    let temp_dir = TempDir::new().unwrap();

    let mut mock_git = MockGitOps::new();
    mock_git
        .expect_remote_url()
        .returning(|_, _| Ok(Some("/srv/a.git".to_string())));
    mock_git.expect_add_remote().times(0);
    mock_git.expect_remove_remote().times(0);

    let manager = RepoManager::new(mock_git, temp_dir.path().to_path_buf());

    assert_eq!(
        manager.reconcile_remote("/srv/a.git").unwrap(),
        RemoteChange::Unchanged
    );
}

#[test]
fn test_verify_connectivity_accepts_empty_remote() {
    let temp_dir = TempDir::new().unwrap();

    let mut mock_git = MockGitOps::new();
    mock_git
        .expect_list_remote()
        .times(1)
        .returning(|_, _, _| Ok(vec![]));

    let manager = RepoManager::new(mock_git, temp_dir.path().to_path_buf());
    let auth = GitAuth::Basic {
        username: "git".to_string(),
        password: "t".to_string(),
    };

    assert!(manager.verify_connectivity(&auth).is_ok());
}

#[test]
fn test_verify_connectivity_surfaces_transport_errors() {
    let temp_dir = TempDir::new().unwrap();

    let mut mock_git = MockGitOps::new();
    mock_git.expect_list_remote().returning(|_, _, _| {
        Err(GitError::NonZeroExit {
            code: 128,
            output: "could not read from remote".to_string(),
        })
    });

    let manager = RepoManager::new(mock_git, temp_dir.path().to_path_buf());
    let auth = GitAuth::Basic {
        username: "git".to_string(),
        password: "t".to_string(),
    };

    assert!(matches!(
        manager.verify_connectivity(&auth),
        Err(GitError::NonZeroExit { code: 128, .. })
    ));
}
