//! Integration tests for Docforge

mod cli_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;

    fn docforge() -> Command {
        Command::cargo_bin("docforge").unwrap()
    }

    #[test]
    fn help_displays() {
        docforge()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Reproducible Documentation Build Pipeline"));
    }

    #[test]
    fn version_displays() {
        docforge()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("docforge"));
    }

    #[test]
    fn config_show() {
        docforge()
            .args(["--no-local", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[notes]"));
    }

    #[test]
    fn config_path() {
        docforge()
            .args(["--no-local", "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn init_creates_local_config() {
        let temp = tempfile::TempDir::new().unwrap();

        docforge()
            .args(["init", "--path"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains(".docforge.toml"));

        assert!(temp.path().join(".docforge.toml").exists());

        // A second init without --force refuses to overwrite
        docforge()
            .args(["init", "--path"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn verify_needs_a_comparison_target() {
        docforge()
            .args(["verify", "whatever.tar.gz"])
            .assert()
            .failure();
    }

    #[test]
    fn cache_clear_requires_confirmation() {
        docforge()
            .args(["--no-local", "cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--yes"));
    }
}

mod pipeline_e2e {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::path::Path;

    fn docforge() -> Command {
        Command::cargo_bin("docforge").unwrap()
    }

    /// Workspace with a local config whose docs command fabricates a
    /// small documentation tree. Offline, so the notes endpoint is
    /// never contacted.
    fn write_workspace_config(dir: &Path) {
        let config = format!(
            r#"
[notes]
cache_dir = "{cache}"

[docs]
command = ["sh", "-c", "mkdir -p site && printf '<html>index</html>' > site/index.html && printf 'page' > site/page.html"]
output_dir = "site"
"#,
            cache = dir.join("notes-cache").display()
        );
        std::fs::write(dir.join(".docforge.toml"), config).unwrap();
    }

    fn sha256(path: &Path) -> String {
        docforge::archive::sha256_hex(&std::fs::read(path).unwrap())
    }

    #[test]
    fn offline_run_produces_archive_with_exit_zero() {
        let temp = tempfile::TempDir::new().unwrap();
        write_workspace_config(temp.path());

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Archive written"));

        assert!(temp.path().join("docs.tar.gz").exists());
    }

    #[test]
    fn reruns_are_byte_identical() {
        let temp = tempfile::TempDir::new().unwrap();
        write_workspace_config(temp.path());

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .success();
        let first = sha256(&temp.path().join("docs.tar.gz"));

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .success();
        let second = sha256(&temp.path().join("docs.tar.gz"));

        assert_eq!(first, second);
    }

    #[test]
    fn verify_accepts_identical_archives() {
        let temp = tempfile::TempDir::new().unwrap();
        write_workspace_config(temp.path());

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .success();

        let archive = temp.path().join("docs.tar.gz");
        let copy = temp.path().join("docs-copy.tar.gz");
        std::fs::copy(&archive, &copy).unwrap();

        docforge()
            .current_dir(temp.path())
            .args(["verify", "docs.tar.gz", "docs-copy.tar.gz"])
            .assert()
            .success()
            .stdout(predicate::str::contains("identical"));

        docforge()
            .current_dir(temp.path())
            .args(["verify", "docs.tar.gz", "--hash"])
            .arg(sha256(&archive))
            .assert()
            .success();
    }

    #[test]
    fn verify_rejects_wrong_hash() {
        let temp = tempfile::TempDir::new().unwrap();
        write_workspace_config(temp.path());

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .success();

        docforge()
            .current_dir(temp.path())
            .args([
                "verify",
                "docs.tar.gz",
                "--hash",
                "0000000000000000000000000000000000000000000000000000000000000000",
            ])
            .assert()
            .failure()
            .code(1);
    }

    #[test]
    fn failing_docs_stage_is_named_and_nonzero() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = format!(
            r#"
[notes]
cache_dir = "{cache}"

[docs]
command = ["sh", "-c", "echo docs are broken >&2; exit 1"]
output_dir = "site"
"#,
            cache = temp.path().join("notes-cache").display()
        );
        std::fs::write(temp.path().join(".docforge.toml"), config).unwrap();

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("generate-docs"));

        assert!(!temp.path().join("docs.tar.gz").exists());
    }

    #[test]
    fn blown_deadline_exits_with_timeout_code() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = format!(
            r#"
[notes]
cache_dir = "{cache}"

[docs]
command = ["sh", "-c", "sleep 30"]
output_dir = "site"

[pipeline]
run_timeout_secs = 1
"#,
            cache = temp.path().join("notes-cache").display()
        );
        std::fs::write(temp.path().join(".docforge.toml"), config).unwrap();

        docforge()
            .current_dir(temp.path())
            .args(["run", "--offline", "--revision", "abc123"])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("deadline"));
    }

    #[test]
    fn cache_list_shows_nothing_for_fresh_workspace() {
        let temp = tempfile::TempDir::new().unwrap();
        write_workspace_config(temp.path());

        docforge()
            .current_dir(temp.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached release notes"));
    }
}
