//! Subprocess execution for build tools
//!
//! A build tool gets its stdin payload while its stdout and stderr are
//! being drained, so a tool that echoes its input can never fill a pipe
//! and stall.

use crate::error::{KilnError, KilnResult};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::debug;

/// Output lines kept for [`KilnError::BuildFailed`]
const OUTPUT_TAIL_LINES: usize = 50;

/// One external command: program, arguments, working directory,
/// extra environment and optional stdin payload
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Pipe `input` to the process's stdin
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-like rendering for logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run an invocation to completion, streaming combined output to `on_output`.
///
/// A non-zero exit becomes [`KilnError::BuildFailed`] carrying the last
/// lines of output.
pub async fn run_streaming(
    invocation: &Invocation,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> KilnResult<()> {
    debug!("$ {}", invocation.display());

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(&invocation.cwd)
        .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| spawn_error(&invocation.program, &invocation.display(), e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| KilnError::Internal("child stdout not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| KilnError::Internal("child stderr not piped".to_string()))?;
    let stdin = child.stdin.take();

    let (fed, tail) = tokio::join!(
        feed_stdin(stdin, invocation.stdin.as_deref(), &invocation.program),
        merge_output(stdout, stderr, on_output),
    );

    let status = child
        .wait()
        .await
        .map_err(|e| KilnError::command_failed(invocation.display(), e))?;

    if status.success() {
        return fed;
    }

    match status.code() {
        Some(code) => Err(KilnError::BuildFailed {
            tool: invocation.program.clone(),
            code,
            output: Vec::from(tail).join("\n"),
        }),
        None => Err(KilnError::ProcessSignaled),
    }
}

/// Write the payload and close stdin so the tool sees EOF
async fn feed_stdin(stdin: Option<ChildStdin>, payload: Option<&str>, program: &str) -> KilnResult<()> {
    let (Some(mut stdin), Some(payload)) = (stdin, payload) else {
        return Ok(());
    };

    match stdin.write_all(payload.as_bytes()).await {
        Ok(()) => Ok(()),
        // The tool exited without reading its input; its exit status says why.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!("{} closed stdin early", program);
            Ok(())
        }
        Err(e) => Err(KilnError::io(format!("writing stdin of {}", program), e)),
    }
}

/// Interleave stdout and stderr lines into `on_output` until both close.
/// Returns the last [`OUTPUT_TAIL_LINES`] lines.
async fn merge_output(
    stdout: impl AsyncRead + Unpin,
    stderr: impl AsyncRead + Unpin,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> VecDeque<String> {
    let mut out = OutputLines::new(stdout);
    let mut err = OutputLines::new(stderr);
    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);

    while !out.done || !err.done {
        let line = tokio::select! {
            line = out.next_line(), if !out.done => line,
            line = err.next_line(), if !err.done => line,
        };

        if let Some(line) = line {
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());
            on_output(line);
        }
    }

    tail
}

/// Byte-level line reader. Invalid UTF-8 is replaced rather than ending
/// the stream, so the pipe keeps being drained.
struct OutputLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
            done: false,
        }
    }

    /// Cancel safe: bytes of a partially read line stay in `buf`.
    async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(0) => {
                    self.done = true;
                    return (!self.buf.is_empty()).then(|| self.take_line());
                }
                Ok(_) => return Some(self.take_line()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Output stream closed: {}", e);
                    self.done = true;
                    return (!self.buf.is_empty()).then(|| self.take_line());
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(|c| c == '\n' || c == '\r')
            .to_string();
        self.buf.clear();
        line
    }
}

/// Check that `program args` runs and exits zero
pub async fn check_tool(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

fn spawn_error(program: &str, command: &str, source: std::io::Error) -> KilnError {
    if source.kind() == std::io::ErrorKind::NotFound {
        KilnError::CliNotFound {
            name: program.to_string(),
            hint: "Make sure it is installed and on PATH.".to_string(),
        }
    } else {
        KilnError::command_failed(command, source)
    }
}
