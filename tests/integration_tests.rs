//! Integration tests for localid
//!
//! These exercise the CLI end to end against the simulated backend; the live
//! HTTP paths are covered by the registry's handler tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a localid Command with a complete environment rooted in
/// a temp directory (config keys present, session store isolated).
fn localid_in(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("localid").unwrap();
    cmd.current_dir(dir.path())
        .env("LOCALID_API_KEY", "test-key")
        .env("LOCALID_RANKING_URL", "http://127.0.0.1:1/rank")
        .env("LOCALID_GAME_API_BASE", "http://127.0.0.1:1/api")
        .env("XDG_CONFIG_HOME", dir.path().join("config"));
    cmd
}

fn login(dir: &TempDir) {
    localid_in(dir)
        .args([
            "--simulate",
            "login",
            "--username",
            "operator",
            "--email",
            "operator@example.com",
            "--password",
            "secret",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as operator"));
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_localid_help() {
        Command::cargo_bin("localid")
            .unwrap()
            .arg("--help")
            .assert()
            .success();
    }

    #[test]
    fn test_localid_version() {
        Command::cargo_bin("localid")
            .unwrap()
            .arg("--version")
            .assert()
            .success();
    }

    #[test]
    fn test_missing_required_config_is_fatal() {
        let dir = TempDir::new().unwrap();

        Command::cargo_bin("localid")
            .unwrap()
            .current_dir(dir.path())
            .env_clear()
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing required configuration"));
    }
}

mod session_lifecycle {
    use super::*;

    #[test]
    fn test_status_before_login() {
        let dir = TempDir::new().unwrap();

        localid_in(&dir)
            .args(["--simulate", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Not logged in"));
    }

    #[test]
    fn test_login_status_logout_round_trip() {
        let dir = TempDir::new().unwrap();
        login(&dir);

        localid_in(&dir)
            .args(["--simulate", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid"))
            .stdout(predicate::str::contains("modify-id: allowed"));

        localid_in(&dir)
            .args(["--simulate", "logout"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Logged out"));

        localid_in(&dir)
            .args(["--simulate", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Not logged in"));
    }
}

mod operations {
    use super::*;

    #[test]
    fn test_run_requires_login() {
        let dir = TempDir::new().unwrap();

        localid_in(&dir)
            .args([
                "--simulate",
                "--yes",
                "run",
                "modify-id",
                "--local-id",
                "NEW123",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not logged in"));
    }

    #[test]
    fn test_modify_id_end_to_end() {
        let dir = TempDir::new().unwrap();
        login(&dir);

        localid_in(&dir)
            .args([
                "--simulate",
                "--yes",
                "run",
                "modify-id",
                "--local-id",
                "NEW123",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Operation completed."))
            .stdout(predicate::str::contains("NEW123"));
    }

    #[test]
    fn test_clone_to_new_rejects_malformed_target_email() {
        let dir = TempDir::new().unwrap();
        login(&dir);

        localid_in(&dir)
            .args([
                "--simulate",
                "--yes",
                "run",
                "clone-to-new",
                "--local-id",
                "NEW123",
                "--target-email",
                "not-an-email",
                "--target-password",
                "pw",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("target email is malformed"));
    }

    #[test]
    fn test_clone_to_new_end_to_end() {
        let dir = TempDir::new().unwrap();
        login(&dir);

        localid_in(&dir)
            .args([
                "--simulate",
                "--yes",
                "run",
                "clone-to-new",
                "--local-id",
                "NEW123",
                "--target-email",
                "target@example.com",
                "--target-password",
                "pw",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Operation completed."));
    }
}
