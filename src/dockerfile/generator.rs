//! Dockerfile generation from a project config
//!
//! The Dockerfile is a fixed sequence of instruction blocks. Blocks that
//! resolve to an empty string are dropped. Files the Dockerfile needs
//! (generated requirements, the staged Dockerfile itself for remote
//! builders) are written under `<project>/.kiln/tmp/build` and referenced
//! by their path relative to the project directory.

use crate::config::{cuda, ProjectConfig};
use crate::error::{KilnError, KilnResult};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Staging directory relative to the build context
pub const STAGING_DIR: &str = ".kiln/tmp/build";

/// Packages the model server runtime imports
pub const RUNTIME_REQUIREMENTS: &[&str] = &[
    "requests",
    "click",
    "pydantic",
    "pathlib",
    "typing",
    "argparse",
    "tqdm",
    "uuid",
    "networkx",
    "typeguard",
    "pillow",
    "typer",
    "rich",
    "cloudpickle",
    "docstring_parser",
    "jsonref",
    "protobuf",
    "pyyaml",
    "grpcio",
];

const TINI_VERSION: &str = "v0.19.0";

/// Ports opened inside the worker namespace: a health check port and a
/// prediction port for each of up to 8 worker containers.
const WORKER_PORT_BASE: u16 = 50054;
const WORKER_PORT_COUNT: u16 = 16;

const PIP_CACHE_MOUNT: &str = "--mount=type=cache,target=/root/.cache/pip";
const APT_CACHE_MOUNT: &str = "--mount=type=cache,target=/var/cache/apt";

/// Renders a [`ProjectConfig`] into Dockerfile text
pub struct Generator<'a> {
    config: &'a ProjectConfig,
    dir: PathBuf,
    tmp_dir: PathBuf,
}

impl<'a> Generator<'a> {
    /// Create a generator for the project rooted at `dir`.
    ///
    /// Creates the staging directory; call [`Generator::cleanup`] when the
    /// build is done with it.
    pub async fn new(config: &'a ProjectConfig, dir: &Path) -> KilnResult<Self> {
        let tmp_dir = dir.join(STAGING_DIR);
        tokio::fs::create_dir_all(&tmp_dir)
            .await
            .map_err(|e| KilnError::io(format!("creating {}", tmp_dir.display()), e))?;

        Ok(Self {
            config,
            dir: dir.to_path_buf(),
            tmp_dir,
        })
    }

    /// Project directory (the build context)
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute staging directory
    pub fn staging_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Render the full Dockerfile
    pub async fn generate(&self) -> KilnResult<String> {
        self.generate_base().await
    }

    /// Render the environment part of the Dockerfile: everything up to and
    /// including the server command, without model source.
    pub async fn generate_base(&self) -> KilnResult<String> {
        let base_image = self.base_image()?;

        let install_python = if self.config.build.gpu {
            self.install_python_cuda()
        } else {
            String::new()
        };

        let apt_installs = self.apt_installs();
        let pip_installs = self.pip_installs().await?;
        let python_requirements = self.python_requirements()?;
        let run = self.run()?;

        let blocks = [
            "# syntax = docker/dockerfile:1.2".to_string(),
            format!("FROM {}", base_image),
            self.preamble(),
            self.install_tini(),
            install_python,
            self.install_cython(),
            self.runtime_requirements(),
            apt_installs,
            pip_installs,
            python_requirements,
            self.setup_networking(),
            run,
            "WORKDIR /src".to_string(),
            "EXPOSE 5000".to_string(),
            format!(
                "CMD [\"python\", \"-m\", \"{}\"]",
                self.config.build.server_module
            ),
        ];

        Ok(join_non_empty(&blocks))
    }

    /// Write a file into the staging directory.
    ///
    /// Returns the path to use in the Dockerfile (relative to the build
    /// context, forward slashes).
    pub async fn stage(&self, filename: &str, contents: &[u8]) -> KilnResult<String> {
        stage_file(&self.tmp_dir, filename, contents).await
    }

    /// Remove the staging directory
    pub async fn cleanup(&self) -> KilnResult<()> {
        match tokio::fs::remove_dir_all(&self.tmp_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KilnError::io(
                format!("cleaning up {}", self.tmp_dir.display()),
                e,
            )),
        }
    }

    fn base_image(&self) -> KilnResult<String> {
        if self.config.build.gpu {
            let release = cuda::resolve(self.config.build.cuda.as_deref())?;
            Ok(release.base_image())
        } else {
            Ok(format!("python:{}", self.config.build.python_version))
        }
    }

    fn preamble(&self) -> String {
        [
            "ENV DEBIAN_FRONTEND=noninteractive",
            "ENV PYTHONUNBUFFERED=1",
            "ENV LD_LIBRARY_PATH=$LD_LIBRARY_PATH:/usr/lib/x86_64-linux-gnu:/usr/local/nvidia/lib64:/usr/local/nvidia/bin",
        ]
        .join("\n")
    }

    /// tini is PID 1 for signal handling and zombie reaping. The
    /// `run.kiln.has_init` label depends on this block.
    fn install_tini(&self) -> String {
        let install = format!(
            "RUN {APT_CACHE_MOUNT} set -eux; \\\n\
             apt-get update -qq; \\\n\
             apt-get install -qqy --no-install-recommends curl; \\\n\
             rm -rf /var/lib/apt/lists/*; \\\n\
             TINI_VERSION={TINI_VERSION}; \\\n\
             TINI_ARCH=\"$(dpkg --print-architecture)\"; \\\n\
             curl -sSL -o /sbin/tini \"https://github.com/krallin/tini/releases/download/${{TINI_VERSION}}/tini-${{TINI_ARCH}}\"; \\\n\
             chmod +x /sbin/tini"
        );

        let entrypoint = if self.config.build.network_isolation {
            r#"ENTRYPOINT ["/sbin/tini", "--", "ip", "netns", "exec", "worker"]"#
        } else {
            r#"ENTRYPOINT ["/sbin/tini", "--"]"#
        };

        format!("{}\n{}", install, entrypoint)
    }

    fn install_python_cuda(&self) -> String {
        let py = &self.config.build.python_version;
        let toolchain = [
            "make",
            "build-essential",
            "libssl-dev",
            "zlib1g-dev",
            "libbz2-dev",
            "libreadline-dev",
            "libsqlite3-dev",
            "iproute2",
            "iptables",
            "wget",
            "curl",
            "llvm",
            "libncurses5-dev",
            "libncursesw5-dev",
            "xz-utils",
            "tk-dev",
            "libffi-dev",
            "liblzma-dev",
            "git",
            "ca-certificates",
        ];

        let mut lines = vec![
            r#"ENV PATH="/root/.pyenv/shims:/root/.pyenv/bin:$PATH""#.to_string(),
            format!(
                "RUN {APT_CACHE_MOUNT} apt-get update -qq && apt-get install -qqy --no-install-recommends \\"
            ),
        ];
        for package in toolchain {
            lines.push(format!("\t{} \\", package));
        }
        lines.push("\t&& rm -rf /var/lib/apt/lists/*".to_string());
        lines.push(format!(
            "RUN curl -s -S -L https://raw.githubusercontent.com/pyenv/pyenv-installer/master/bin/pyenv-installer | bash && \\\n\
             \tgit clone https://github.com/momo-lab/pyenv-install-latest.git \"$(pyenv root)\"/plugins/pyenv-install-latest && \\\n\
             \tpyenv install-latest \"{py}\" && \\\n\
             \tpyenv global $(pyenv install-latest --print \"{py}\") && \\\n\
             \tpip install \"wheel<1\""
        ));

        lines.join("\n")
    }

    fn install_cython(&self) -> String {
        format!("RUN {PIP_CACHE_MOUNT} pip install cython==\"0.29.34\"")
    }

    fn runtime_requirements(&self) -> String {
        format!(
            "RUN {PIP_CACHE_MOUNT} pip install {}",
            RUNTIME_REQUIREMENTS.join(" ")
        )
    }

    fn apt_installs(&self) -> String {
        let packages = &self.config.build.system_packages;
        if packages.is_empty() {
            return String::new();
        }
        format!(
            "RUN {APT_CACHE_MOUNT} apt-get update -qq && apt-get install -qqy {} && rm -rf /var/lib/apt/lists/*",
            packages.join(" ")
        )
    }

    async fn pip_installs(&self) -> KilnResult<String> {
        let requirements = self.config.python_requirements_text();
        if requirements.trim().is_empty() {
            return Ok(String::new());
        }

        let staged = self.stage("requirements.txt", requirements.as_bytes()).await?;
        Ok(format!(
            "COPY {staged} /tmp/requirements.txt\n\
             RUN {PIP_CACHE_MOUNT} pip install -r /tmp/requirements.txt"
        ))
    }

    fn python_requirements(&self) -> KilnResult<String> {
        let Some(ref reqs) = self.config.build.python_requirements else {
            return Ok(String::new());
        };
        if reqs.trim().is_empty() {
            return Ok(String::new());
        }

        // COPY sources resolve against the build context
        let relative = Path::new(reqs);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(KilnError::RequirementsOutsideProject(relative.to_path_buf()));
        }

        let host_path = self.dir.join(relative);
        if !host_path.is_file() {
            return Err(KilnError::RequirementsNotFound(host_path));
        }

        Ok(format!(
            "COPY {reqs} /tmp/requirements.txt\n\
             RUN {PIP_CACHE_MOUNT} pip install -r /tmp/requirements.txt && rm /tmp/requirements.txt"
        ))
    }

    /// Move the server into the `worker` namespace joined to the default
    /// namespace by a veth pair; only the worker ports are reachable.
    fn setup_networking(&self) -> String {
        if !self.config.build.network_isolation {
            return String::new();
        }

        let ports = (0..WORKER_PORT_COUNT)
            .map(|i| (WORKER_PORT_BASE + i).to_string())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "RUN {APT_CACHE_MOUNT} apt-get update -qq && apt-get install -qqy --no-install-recommends iproute2 iptables && rm -rf /var/lib/apt/lists/*\n\
             RUN ip netns add worker; \\\n\
             ip link add veth1 type veth peer name veth2; \\\n\
             ip link set veth2 netns worker; \\\n\
             ip addr add 10.0.0.1/24 dev veth1; \\\n\
             ip link set veth1 up; \\\n\
             ip netns exec worker ip addr add 10.0.0.2/24 dev veth2; \\\n\
             ip netns exec worker ip link set veth2 up; \\\n\
             ip netns exec worker ip link set lo up; \\\n\
             sysctl -w net.ipv4.ip_forward=1; \\\n\
             iptables -t nat -A POSTROUTING -o eth0 -j MASQUERADE; \\\n\
             mkdir -p /etc/netns/worker; \\\n\
             cp /etc/resolv.conf /etc/netns/worker/resolv.conf; \\\n\
             ip netns exec worker iptables -A INPUT -p tcp -m multiport --dports {ports} -j ACCEPT; \\\n\
             ip netns exec worker iptables -A INPUT -p tcp -j DROP"
        )
    }

    fn run(&self) -> KilnResult<String> {
        let commands = self
            .config
            .build
            .run
            .iter()
            .chain(self.config.build.pre_install.iter());

        let mut lines = Vec::new();
        for command in commands {
            let command = command.trim();
            if command.contains('\n') {
                return Err(KilnError::MultilineRunCommand {
                    command: command.to_string(),
                });
            }
            lines.push(format!("RUN {}", command));
        }
        Ok(lines.join("\n"))
    }
}

/// Write `contents` to `staging_dir/filename` and return the
/// context-relative path used in build instructions.
pub async fn stage_file(staging_dir: &Path, filename: &str, contents: &[u8]) -> KilnResult<String> {
    let path = staging_dir.join(filename);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| KilnError::staging(filename, e))?;
    }
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| KilnError::staging(filename, e))?;

    debug!("Staged {}", path.display());
    Ok(format!("{}/{}", STAGING_DIR, filename))
}

fn join_non_empty(blocks: &[String]) -> String {
    blocks
        .iter()
        .filter(|b| !b.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(toml: &str) -> ProjectConfig {
        ProjectConfig::parse(toml, Path::new("kiln.toml")).unwrap()
    }

    async fn render(config: &ProjectConfig, dir: &Path) -> KilnResult<String> {
        let generator = Generator::new(config, dir).await?;
        generator.generate().await
    }

    #[tokio::test]
    async fn cpu_dockerfile_structure() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\npython_version = \"3.11\"");

        let dockerfile = render(&config, temp.path()).await.unwrap();
        let lines: Vec<&str> = dockerfile.lines().collect();

        assert_eq!(lines[0], "# syntax = docker/dockerfile:1.2");
        assert_eq!(lines[1], "FROM python:3.11");
        assert!(dockerfile.contains("ENV PYTHONUNBUFFERED=1"));
        assert!(dockerfile.contains("TINI_VERSION=v0.19.0"));
        assert!(dockerfile.contains("pip install cython==\"0.29.34\""));
        assert!(dockerfile.contains("pip install requests click pydantic"));
        assert!(!dockerfile.contains("pyenv"));
        assert!(dockerfile.ends_with("CMD [\"python\", \"-m\", \"model_server.http\"]"));
    }

    #[tokio::test]
    async fn empty_blocks_are_skipped() {
        let temp = TempDir::new().unwrap();
        let config = project("");

        let dockerfile = render(&config, temp.path()).await.unwrap();

        assert!(!dockerfile.contains("apt-get install -qqy  "));
        assert!(!dockerfile.contains("/tmp/requirements.txt"));
        assert!(!dockerfile.lines().any(|l| l.is_empty()));
    }

    #[tokio::test]
    async fn gpu_uses_cuda_base_and_pyenv() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\ngpu = true\ncuda = \"11.8\"\npython_version = \"3.9\"");

        let dockerfile = render(&config, temp.path()).await.unwrap();

        assert!(dockerfile.contains("FROM nvidia/cuda:11.8.0-cudnn8-devel-ubuntu22.04"));
        assert!(dockerfile.contains("pyenv install-latest \"3.9\""));
        let pyenv = dockerfile.find("pyenv-installer").unwrap();
        let cython = dockerfile.find("cython").unwrap();
        assert!(pyenv < cython);
    }

    #[tokio::test]
    async fn system_packages_installed_with_apt() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\nsystem_packages = [\"ffmpeg\", \"libsm6\"]");

        let dockerfile = render(&config, temp.path()).await.unwrap();
        assert!(dockerfile.contains(
            "apt-get install -qqy ffmpeg libsm6 && rm -rf /var/lib/apt/lists/*"
        ));
    }

    #[tokio::test]
    async fn python_packages_are_staged() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\npython_packages = [\"torch\", \"ffmpeg-python==0.2.0\"]");

        let generator = Generator::new(&config, temp.path()).await.unwrap();
        let dockerfile = generator.generate().await.unwrap();

        assert!(dockerfile
            .contains("COPY .kiln/tmp/build/requirements.txt /tmp/requirements.txt"));
        let staged =
            std::fs::read_to_string(temp.path().join(STAGING_DIR).join("requirements.txt"))
                .unwrap();
        assert_eq!(staged, "torch\nffmpeg-python==0.2.0\n");

        generator.cleanup().await.unwrap();
        assert!(!temp.path().join(STAGING_DIR).exists());
    }

    #[tokio::test]
    async fn requirements_file_must_exist() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\npython_requirements = \"requirements.txt\"");

        let err = render(&config, temp.path()).await.unwrap_err();
        assert!(matches!(err, KilnError::RequirementsNotFound(_)));

        std::fs::write(temp.path().join("requirements.txt"), "numpy\n").unwrap();
        let dockerfile = render(&config, temp.path()).await.unwrap();
        assert!(dockerfile.contains("COPY requirements.txt /tmp/requirements.txt"));
        assert!(dockerfile.contains("&& rm /tmp/requirements.txt"));
    }

    #[tokio::test]
    async fn requirements_outside_project_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let absolute = outside.path().join("requirements.txt");
        std::fs::write(&absolute, "numpy\n").unwrap();

        for path in [absolute.display().to_string(), "../requirements.txt".to_string()] {
            let config = project(&format!("[build]\npython_requirements = {:?}", path));
            let err = render(&config, temp.path()).await.unwrap_err();
            assert!(
                matches!(err, KilnError::RequirementsOutsideProject(_)),
                "{path} accepted"
            );
        }
    }

    #[tokio::test]
    async fn requirements_in_subdirectory_accepted() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("deps")).unwrap();
        std::fs::write(temp.path().join("deps/requirements.txt"), "numpy\n").unwrap();

        let config = project("[build]\npython_requirements = \"./deps/requirements.txt\"");
        let dockerfile = render(&config, temp.path()).await.unwrap();
        assert!(dockerfile.contains("COPY ./deps/requirements.txt /tmp/requirements.txt"));
    }

    #[tokio::test]
    async fn run_commands_in_order_after_networking() {
        let temp = TempDir::new().unwrap();
        let config = project(
            "[build]\nrun = [\"  echo one  \", \"echo two\"]\npre_install = [\"echo legacy\"]",
        );

        let dockerfile = render(&config, temp.path()).await.unwrap();

        let net = dockerfile.find("ip netns add worker").unwrap();
        let one = dockerfile.find("RUN echo one\n").unwrap();
        let two = dockerfile.find("RUN echo two\n").unwrap();
        let legacy = dockerfile.find("RUN echo legacy\n").unwrap();
        assert!(net < one && one < two && two < legacy);
    }

    #[tokio::test]
    async fn multiline_run_command_rejected() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\nrun = [\"echo a\\necho b\"]");

        let err = render(&config, temp.path()).await.unwrap_err();
        match err {
            KilnError::MultilineRunCommand { command } => assert_eq!(command, "echo a\necho b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn trailing_newline_is_trimmed_not_rejected() {
        let temp = TempDir::new().unwrap();
        let config = project("[build]\nrun = [\"echo a\\n\"]");

        let dockerfile = render(&config, temp.path()).await.unwrap();
        assert!(dockerfile.contains("RUN echo a\n"));
    }

    #[tokio::test]
    async fn network_isolation_controls_entrypoint() {
        let temp = TempDir::new().unwrap();

        let isolated = render(&project(""), temp.path()).await.unwrap();
        assert!(isolated.contains(r#"ENTRYPOINT ["/sbin/tini", "--", "ip", "netns", "exec", "worker"]"#));
        assert!(isolated.contains("--dports 50054,50055,"));
        assert!(isolated.contains(",50069 -j ACCEPT"));
        let tools = isolated
            .find("install -qqy --no-install-recommends iproute2 iptables")
            .unwrap();
        assert!(tools < isolated.find("ip netns add worker").unwrap());

        let open = render(&project("[build]\nnetwork_isolation = false"), temp.path())
            .await
            .unwrap();
        assert!(open.contains(r#"ENTRYPOINT ["/sbin/tini", "--"]"#));
        assert!(!open.contains("netns add"));
        assert!(!open.contains("iproute2"));
    }

    #[tokio::test]
    async fn generation_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let config = project(
            r#"
[build]
gpu = true
python_version = "3.10"
cuda = "12.1"
system_packages = ["ffmpeg"]
python_packages = ["torch", "ffmpeg-python==0.2.0"]
run = ["echo hello"]
"#,
        );

        let first = render(&config, temp.path()).await.unwrap();
        let second = render(&config, temp.path()).await.unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[tokio::test]
    async fn stage_returns_context_relative_path() {
        let temp = TempDir::new().unwrap();
        let config = project("");
        let generator = Generator::new(&config, temp.path()).await.unwrap();

        let path = generator.stage("Dockerfile", b"FROM scratch").await.unwrap();
        assert_eq!(path, ".kiln/tmp/build/Dockerfile");
        assert!(temp.path().join(&path).is_file());
    }
}
