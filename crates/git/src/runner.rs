//! Running the external `git` executable.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::deadline::Deadline;
use crate::error::{GitUtilError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// stdout followed by stderr, for diagnostics.
    pub fn combined(&self) -> String {
        let mut out = self.stdout_lossy();
        out.push_str(&String::from_utf8_lossy(&self.stderr));
        out
    }

    pub fn status_text(&self) -> String {
        match self.status {
            Some(code) => format!("exit status: {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs git subcommands in a directory.
pub trait CommandRunner: Send + Sync {
    /// Run `git <args>` with `dir` as working directory. A non-zero exit is
    /// *not* an error here; callers inspect [`CommandOutput::status`].
    ///
    /// # Errors
    /// Returns an error if the process cannot be started or outlives `deadline`.
    fn run(&self, dir: &Path, args: &[&str], deadline: Deadline) -> Result<CommandOutput>;

    /// Printable command line, used in error messages.
    fn command_line(&self, args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }
}

/// Spawns a real child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Upper bound for every single command.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, dir: &Path, args: &[&str], deadline: Deadline) -> Result<CommandOutput> {
        let command_line = self.command_line(args);
        let deadline = deadline.min_with(self.timeout);
        deadline.check(&command_line)?;

        log::debug!("running `{command_line}` in {}", dir.display());

        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitUtilError::ExternalTool {
                command: command_line.clone(),
                status: "failed to start".to_string(),
                output: e.to_string(),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                log::warn!("`{command_line}` still running at deadline, killing it");
                kill(&mut child);
                // Reader threads finish on their own once the pipes close.
                return Err(GitUtilError::DeadlineExceeded {
                    context: command_line,
                });
            }
            Err(e) => {
                kill(&mut child);
                return Err(GitUtilError::ExternalTool {
                    command: command_line,
                    status: "wait failed".to_string(),
                    output: e.to_string(),
                });
            }
        };

        Ok(CommandOutput {
            status: status.code(),
            stdout: collect(&command_line, "stdout", stdout)?,
            stderr: collect(&command_line, "stderr", stderr)?,
        })
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

/// A short read must not pass for complete output.
fn collect(
    command_line: &str,
    stream: &str,
    reader: JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>> {
    reader
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("reader thread panicked")))
        .map_err(|e| GitUtilError::ExternalTool {
            command: command_line.to_string(),
            status: format!("reading {stream} failed"),
            output: e.to_string(),
        })
}

/// `Ok(None)` means the deadline passed with the child still running.
fn wait_until(child: &mut Child, deadline: Deadline) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        match deadline.remaining() {
            None => return child.wait().map(Some),
            Some(left) if left.is_zero() => return Ok(None),
            Some(left) => thread::sleep(left.min(POLL_INTERVAL)),
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
