//! Child-process kernel channel.
//!
//! # Invariants
//! - The kernel's stdin/stdout carry protocol lines; its stderr is inherited.
//! - After `close`, the child has been reaped (killed after the grace period
//!   if it did not exit on stdin EOF).

use super::{KernelChannel, TransportError, TransportResult};
use log::{debug, info, warn};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How to launch one kernel process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub shutdown_grace: Duration,
}

pub struct ProcessChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    shutdown_grace: Duration,
    reaped: bool,
}

impl ProcessChannel {
    /// Spawns the kernel with piped stdin/stdout.
    pub fn spawn(spec: &LaunchSpec) -> TransportResult<Self> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        info!(
            "event=kernel_spawn module=transport status=ok pid={} program={}",
            child.id(),
            spec.program
        );

        Ok(Self {
            child,
            stdin,
            stdout,
            shutdown_grace: spec.shutdown_grace,
            reaped: false,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn reap(&mut self) -> TransportResult<()> {
        let deadline = Instant::now() + self.shutdown_grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!(
                    "event=kernel_exit module=transport status=ok pid={} exit={}",
                    self.child.id(),
                    status
                );
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(REAP_POLL_INTERVAL);
        }

        warn!(
            "event=kernel_exit module=transport status=killed pid={} grace_ms={}",
            self.child.id(),
            self.shutdown_grace.as_millis()
        );
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl KernelChannel for ProcessChannel {
    fn send_line(&mut self, line: &str) -> TransportResult<()> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> TransportResult<String> {
        let stdout = self.stdout.as_mut().ok_or(TransportError::Closed)?;
        let mut line = String::new();
        if stdout.read_line(&mut line)? == 0 {
            return Err(TransportError::Disconnected);
        }
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(line)
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.reaped {
            return Ok(());
        }
        debug!("event=kernel_close module=transport status=start pid={}", self.child.id());
        drop(self.stdin.take());
        drop(self.stdout.take());
        self.reaped = true;
        self.reap()
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(
                "event=kernel_close module=transport status=error error={}",
                err
            );
        }
    }
}
