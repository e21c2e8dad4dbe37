//! Child-process plumbing with timeouts and bounded output capture.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

/// Run a command with a timeout, capturing stdout/stderr without risking pipe
/// deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes`
/// bounds the amount of stdout/stderr stored in memory; bytes beyond the
/// limit are discarded while still draining the pipe.
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            buf.extend_from_slice(&chunk[..n.min(remaining)]);
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_exit_status() {
        let output = run_command_with_timeout(
            sh("printf 'hello'"),
            None,
            Duration::from_secs(5),
            1024,
        )
        .expect("run");
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(output.stdout, b"hello");
    }

    #[test]
    fn passes_stdin_through() {
        let output = run_command_with_timeout(
            sh("cat"),
            Some(b"payload"),
            Duration::from_secs(5),
            1024,
        )
        .expect("run");
        assert_eq!(output.stdout, b"payload");
    }

    #[test]
    fn kills_on_timeout() {
        let output = run_command_with_timeout(
            sh("sleep 5"),
            None,
            Duration::from_millis(100),
            1024,
        )
        .expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn output_is_bounded() {
        let output = run_command_with_timeout(
            sh("printf 'abcdef'"),
            None,
            Duration::from_secs(5),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, b"abcd");
    }
}
