use assert_cmd::prelude::*;
use std::process::Command;
use tempfile::TempDir;

struct ProjectFixture {
    _tmp: TempDir,
    root: std::path::PathBuf,
}

impl ProjectFixture {
    fn new() -> anyhow::Result<Self> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_path_buf();
        std::fs::write(root.join("codeatlas.yaml"), "max_llm_concurrency: 2\n")?;
        std::fs::write(root.join("main.py"), "x = 1\n")?;
        Ok(Self { _tmp: tmp, root })
    }

    fn codeatlas(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("codeatlas"));
        cmd.current_dir(&self.root);
        cmd
    }
}

#[test]
fn test_run_offline_completes_successfully() -> anyhow::Result<()> {
    let project = ProjectFixture::new()?;

    project
        .codeatlas()
        .args(["--project-dir", ".", "run", "--offline", "--run-id", "cli-test-run"])
        .assert()
        .success();

    Ok(())
}

#[test]
fn test_run_without_config_fails_with_config_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("codeatlas"));
    cmd.current_dir(tmp.path());
    cmd.args(["run", "--offline"]);
    cmd.assert().failure().code(2);

    Ok(())
}

#[test]
fn test_reconcile_on_unknown_run_id_marks_nothing() -> anyhow::Result<()> {
    let project = ProjectFixture::new()?;

    project
        .codeatlas()
        .args(["--project-dir", ".", "reconcile", "--run-id", "never-ran"])
        .assert()
        .success();

    Ok(())
}
