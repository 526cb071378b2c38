//! Integration tests for Kiln

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn kiln() -> Command {
        cargo_bin_cmd!("kiln")
    }

    /// A project directory with the given kiln.toml and an isolated global config
    fn project(toml: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("kiln.toml"), toml).unwrap();
        temp
    }

    fn in_project(dir: &Path) -> Command {
        let mut cmd = kiln();
        cmd.current_dir(dir)
            .env("KILN_CONFIG", dir.join("global-config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        kiln()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Dockerfile generator"));
    }

    #[test]
    fn version_displays() {
        kiln()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn status_runs() {
        // Build tools may be missing, but status reports instead of failing
        let temp = TempDir::new().unwrap();
        in_project(temp.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("docker"));
    }

    #[test]
    fn generate_prints_dockerfile() {
        let temp = project("[build]\npython_packages = [\"numpy\"]\nrun = [\"echo ready\"]");
        in_project(temp.path())
            .arg("generate")
            .assert()
            .success()
            .stdout(predicate::str::starts_with("# syntax = docker/dockerfile:1.2"))
            .stdout(predicate::str::contains("FROM python:3.10"))
            .stdout(predicate::str::contains("RUN echo ready"));

        assert!(!temp.path().join(".kiln/tmp/build").exists());
    }

    #[test]
    fn generate_is_deterministic() {
        let temp = project("[build]\nsystem_packages = [\"ffmpeg\"]");
        let first = in_project(temp.path())
            .args(["generate", "--fingerprint"])
            .output()
            .unwrap();
        let second = in_project(temp.path())
            .args(["generate", "--fingerprint"])
            .output()
            .unwrap();

        assert!(first.status.success());
        assert_eq!(first.stdout, second.stdout);
        assert_eq!(String::from_utf8_lossy(&first.stdout).trim().len(), 64);
    }

    #[test]
    fn generate_with_dir_flag() {
        let temp = project("[build]\npython_version = \"3.11\"");
        let elsewhere = TempDir::new().unwrap();
        in_project(elsewhere.path())
            .arg("-C")
            .arg(temp.path())
            .arg("generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("FROM python:3.11"));
    }

    #[test]
    fn generate_gpu_uses_cuda_base() {
        let temp = project("[build]\ngpu = true\ncuda = \"11.8\"");
        in_project(temp.path())
            .arg("generate")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "FROM nvidia/cuda:11.8.0-cudnn8-devel-ubuntu22.04",
            ));
    }

    #[test]
    fn generate_rejects_multiline_run() {
        let temp = project("[build]\nrun = [\"echo a\\necho b\"]");
        in_project(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("new line"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn generate_rejects_unsupported_cuda() {
        let temp = project("[build]\ngpu = true\ncuda = \"10.2\"");
        in_project(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported CUDA version '10.2'"));
    }

    #[test]
    fn missing_project_config() {
        let temp = TempDir::new().unwrap();
        in_project(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No kiln.toml found"))
            .stderr(predicate::str::contains("kiln init"));
    }

    #[test]
    fn build_without_tool_fails_with_hint() {
        let temp = project("");
        in_project(temp.path())
            .env("PATH", temp.path())
            .args(["build", "--backend", "depot", "-t", "demo:v1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Required CLI not found: depot"));

        assert!(!temp.path().join(".kiln/tmp/build").exists());
    }

    #[test]
    fn build_with_missing_dockerfile_fails() {
        let temp = project("");
        in_project(temp.path())
            .args(["build", "--dockerfile", "Dockerfile.edited", "-t", "demo:v1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("reading Dockerfile"))
            .stderr(predicate::str::contains("Dockerfile.edited"));
    }

    #[test]
    fn build_from_dockerfile_without_tool_fails_with_hint() {
        let temp = project("[build]\npython_packages = [\"numpy\"]");
        std::fs::write(temp.path().join("Dockerfile.edited"), "FROM scratch\n").unwrap();
        in_project(temp.path())
            .env("PATH", temp.path())
            .args([
                "build",
                "--dockerfile",
                "Dockerfile.edited",
                "--backend",
                "depot",
                "-t",
                "demo:v1",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Required CLI not found: depot"));

        assert!(!temp.path().join(".kiln/tmp/build").exists());
    }

    #[test]
    fn init_creates_project_config() {
        let temp = TempDir::new().unwrap();
        in_project(temp.path())
            .args(["init", "--gpu"])
            .assert()
            .success();

        let content = std::fs::read_to_string(temp.path().join("kiln.toml")).unwrap();
        assert!(content.contains("gpu = true"));
    }

    #[test]
    fn init_refuses_overwrite() {
        let temp = project("existing");
        in_project(temp.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn config_path_honours_flag() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        kiln()
            .arg("-c")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        in_project(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[builder]"))
            .stdout(predicate::str::contains("backend = \"buildx\""));
    }

    #[test]
    fn config_set_persists() {
        let temp = TempDir::new().unwrap();
        in_project(temp.path())
            .args(["config", "set", "builder.backend", "depot"])
            .assert()
            .success();

        in_project(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("backend = \"depot\""));
    }

    #[test]
    fn config_set_unknown_key() {
        let temp = TempDir::new().unwrap();
        in_project(temp.path())
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn completions_print_script() {
        kiln()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }
}
