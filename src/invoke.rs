use std::{
    ffi::OsString,
    io::Read as _,
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use tracing::debug;

use crate::error::{BuildError, BuildResult};

/// How a child's output is wired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDisposition {
    /// Pass through to the invoking terminal. Checks use this so their
    /// diagnostics arrive verbatim.
    Inherit,
    /// Silence stdout, capture stderr for the failure log. Previews use
    /// this; their chatter is not build output.
    Quiet,
}

/// One external tool invocation, optionally bounded by a wall-clock limit.
#[derive(Debug)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// `None` means unbounded.
    pub timeout: Option<Duration>,
    pub output: OutputDisposition,
    /// Which override configures the program, for not-found diagnostics.
    pub missing_hint: &'static str,
}

#[derive(Debug)]
pub enum Verdict {
    Success,
    Failed {
        code: Option<i32>,
        stderr: Option<String>,
    },
    TimedOut {
        limit: Duration,
    },
}

enum Waited {
    Exited(ExitStatus),
    TimedOut,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl Invocation {
    /// Rendering of the command line for logs and plan output.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Spawn the tool and wait for exit or expiry. Expiry kills the child.
    ///
    /// A missing program surfaces as [`BuildError::ToolMissing`]; whether
    /// that aborts the build is the caller's call, not this layer's.
    pub fn run(&self) -> BuildResult<Verdict> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if self.output == OutputDisposition::Quiet {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
        }

        debug!(command = %self.command_line(), "spawning");
        let mut child = cmd.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                BuildError::tool_missing(&self.program, self.missing_hint)
            } else {
                anyhow::anyhow!("failed to spawn `{}`: {err}", self.program).into()
            }
        })?;

        // Drain stderr on a separate thread so a chatty child cannot fill
        // the pipe and block before the deadline check sees it.
        let stderr_drain = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let waited = match self.timeout {
            None => Waited::Exited(
                child
                    .wait()
                    .with_context(|| format!("waiting for `{}`", self.program))?,
            ),
            Some(limit) => wait_bounded(&mut child, limit)
                .with_context(|| format!("waiting for `{}`", self.program))?,
        };

        let stderr = stderr_drain
            .and_then(|handle| handle.join().ok())
            .map(|buf| buf.trim().to_string())
            .filter(|buf| !buf.is_empty());

        match waited {
            Waited::Exited(status) if status.success() => Ok(Verdict::Success),
            Waited::Exited(status) => Ok(Verdict::Failed {
                code: status.code(),
                stderr,
            }),
            Waited::TimedOut => Ok(Verdict::TimedOut {
                limit: self.timeout.unwrap_or_default(),
            }),
        }
    }
}

fn wait_bounded(child: &mut Child, limit: Duration) -> std::io::Result<Waited> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited::Exited(status));
        }
        let now = Instant::now();
        if now >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(Waited::TimedOut);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
