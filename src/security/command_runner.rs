//! Subprocess execution with redacted output streaming
//!
//! Runs one external command to completion while piping its stdout and
//! stderr through caller-supplied [`RedactingWriter`]s, so no byte of
//! subprocess output reaches a terminal, log, or capture buffer without
//! passing the censor first. Both streams are drained concurrently; draining
//! only one would deadlock a child that fills the other pipe's buffer.
//!
//! A single call is single-shot: exit code 0 is the passing case, anything
//! else is reported with the full command line and never retried here.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use super::redacting_writer::RedactingWriter;

/// Errors that can occur while running a command
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The executable could not be started (missing, permission denied)
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child process failed
    #[error("failed while waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the child's output or writing to a downstream sink failed
    #[error("failed to forward output of `{command}`: {source}")]
    Output {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited with a non-zero status
    #[error("`{command}` exited with status {code}")]
    NonZeroExit { command: String, code: i32 },

    /// The command was killed by a signal
    #[error("`{command}` was terminated by a signal")]
    Terminated { command: String },

    /// The command exceeded the configured deadline and was killed
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// Runs external commands with their output piped through redacting writers.
///
/// # Examples
///
/// ```no_run
/// use image_bumper::security::{CommandRunner, RedactingWriter, SecretStore};
///
/// # async fn demo() -> Result<(), image_bumper::security::RunnerError> {
/// let store = SecretStore::new();
/// let mut out = RedactingWriter::new(std::io::stdout(), store.clone());
/// let mut err = RedactingWriter::new(std::io::stderr(), store.clone());
///
/// let runner = CommandRunner::new();
/// runner.run("git", &["status"], &mut out, &mut err).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CommandRunner {
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for subsequent commands.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    /// Sets a deadline for subsequent commands. On expiry the child is
    /// killed, both output streams are drained to the end (so buffered bytes
    /// are still redacted and flushed), and the run reports a timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Runs `command` to completion.
    ///
    /// Bytes within each stream are forwarded in production order; there is
    /// no ordering guarantee between stdout and stderr. Sink failures abort
    /// the run and propagate unchanged.
    pub async fn run<WO, WE>(
        &self,
        command: &str,
        args: &[&str],
        stdout: &mut RedactingWriter<WO>,
        stderr: &mut RedactingWriter<WE>,
    ) -> Result<(), RunnerError>
    where
        WO: Write,
        WE: Write,
    {
        let rendered = render_command(command, args);
        debug!(command = %rendered, "running command");

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| RunnerError::Launch {
            command: rendered.clone(),
            source,
        })?;

        let child_out = child.stdout.take().expect("stdout was piped");
        let child_err = child.stderr.take().expect("stderr was piped");

        let drains = async { tokio::join!(drain(child_out, stdout), drain(child_err, stderr)) };
        tokio::pin!(drains);

        let status = match self.timeout {
            Some(limit) => {
                tokio::select! {
                    (out_res, err_res) = &mut drains => {
                        check_drains(&rendered, out_res, err_res)?;
                        child.wait().await.map_err(|source| RunnerError::Wait {
                            command: rendered.clone(),
                            source,
                        })?
                    }
                    _ = tokio::time::sleep(limit) => {
                        let _ = child.start_kill();
                        let (out_res, err_res) = drains.await;
                        let _ = child.wait().await;
                        check_drains(&rendered, out_res, err_res)?;
                        return Err(RunnerError::Timeout {
                            command: rendered,
                            timeout: limit,
                        });
                    }
                }
            }
            None => {
                let (out_res, err_res) = drains.await;
                check_drains(&rendered, out_res, err_res)?;
                child.wait().await.map_err(|source| RunnerError::Wait {
                    command: rendered.clone(),
                    source,
                })?
            }
        };

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(RunnerError::NonZeroExit {
                command: rendered,
                code,
            }),
            None => Err(RunnerError::Terminated { command: rendered }),
        }
    }
}

async fn drain<R, W>(mut reader: R, writer: &mut RedactingWriter<W>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
    }
    writer.flush()
}

fn check_drains(
    command: &str,
    out_res: std::io::Result<()>,
    err_res: std::io::Result<()>,
) -> Result<(), RunnerError> {
    for res in [out_res, err_res] {
        res.map_err(|source| RunnerError::Output {
            command: command.to_string(),
            source,
        })?;
    }
    Ok(())
}

fn render_command(command: &str, args: &[&str]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecretStore;

    fn writers(
        store: &SecretStore,
    ) -> (RedactingWriter<Vec<u8>>, RedactingWriter<Vec<u8>>) {
        (
            RedactingWriter::new(Vec::new(), store.clone()),
            RedactingWriter::new(Vec::new(), store.clone()),
        )
    }

    #[tokio::test]
    async fn test_plain_output_passes_through() {
        let store = SecretStore::from_values(vec![b"abc".to_vec()]);
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        runner
            .run("echo", &["-n", "aaa: 123"], &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(out.get_ref().as_slice(), b"aaa: 123");
        assert!(err.get_ref().is_empty());
    }

    #[tokio::test]
    async fn test_secret_in_stdout_is_censored() {
        let store = SecretStore::from_values(vec![b"abc".to_vec()]);
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        runner
            .run("echo", &["-n", "abc: 123"], &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(out.get_ref().as_slice(), b"CENSORED: 123");
    }

    #[tokio::test]
    async fn test_secret_in_stderr_is_censored() {
        let store = SecretStore::from_values(vec![b"abc".to_vec(), b"xyz".to_vec()]);
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        runner
            .run(
                "sh",
                &["-c", "echo '/tmp/nope/abc/xyz/nope' >&2"],
                &mut out,
                &mut err,
            )
            .await
            .unwrap();

        let captured = String::from_utf8(err.get_ref().clone()).unwrap();
        assert!(captured.contains("/tmp/nope/CENSORED/CENSORED/nope"));
        assert!(!captured.contains("abc"));
    }

    #[tokio::test]
    async fn test_both_streams_are_drained() {
        let store = SecretStore::new();
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        runner
            .run(
                "sh",
                &["-c", "echo to-stdout; echo to-stderr >&2"],
                &mut out,
                &mut err,
            )
            .await
            .unwrap();

        assert_eq!(out.get_ref().as_slice(), b"to-stdout\n");
        assert_eq!(err.get_ref().as_slice(), b"to-stderr\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let store = SecretStore::new();
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        let result = runner
            .run("sh", &["-c", "echo partial; exit 3"], &mut out, &mut err)
            .await;

        match result {
            Err(RunnerError::NonZeroExit { code, .. }) => assert_eq!(code, 3),
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
        // Output produced before the failure still went through the writer.
        assert_eq!(out.get_ref().as_slice(), b"partial\n");
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_launch_error() {
        let store = SecretStore::new();
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        let result = runner
            .run("this-command-does-not-exist", &[], &mut out, &mut err)
            .await;

        assert!(matches!(result, Err(RunnerError::Launch { .. })));
    }

    #[tokio::test]
    async fn test_working_dir_is_honored() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SecretStore::new();
        let (mut out, mut err) = writers(&store);

        let mut runner = CommandRunner::new();
        runner.set_working_dir(dir.path());
        runner.run("pwd", &[], &mut out, &mut err).await.unwrap();

        let printed = String::from_utf8(out.get_ref().clone()).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(printed.trim(), canonical.to_str().unwrap());
    }

    #[tokio::test]
    async fn test_timeout_kills_child_and_flushes_partial_output() {
        let store = SecretStore::from_values(vec![b"abc".to_vec()]);
        let (mut out, mut err) = writers(&store);

        let mut runner = CommandRunner::new();
        runner.set_timeout(Duration::from_millis(200));
        let result = runner
            .run(
                "sh",
                &["-c", "echo abc-before; sleep 10; echo after"],
                &mut out,
                &mut err,
            )
            .await;

        assert!(matches!(result, Err(RunnerError::Timeout { .. })));
        let captured = String::from_utf8(out.get_ref().clone()).unwrap();
        // Output produced before the kill is drained, redacted, and flushed.
        assert!(captured.contains("CENSORED-before"));
        assert!(!captured.contains("after"));
    }

    #[tokio::test]
    async fn test_stream_order_is_preserved() {
        let store = SecretStore::new();
        let (mut out, mut err) = writers(&store);

        let runner = CommandRunner::new();
        runner
            .run(
                "sh",
                &["-c", "printf one; printf two; printf three"],
                &mut out,
                &mut err,
            )
            .await
            .unwrap();

        assert_eq!(out.get_ref().as_slice(), b"onetwothree");
    }

    #[test]
    fn test_render_command() {
        assert_eq!(render_command("git", &[]), "git");
        assert_eq!(render_command("git", &["add", "-A"]), "git add -A");
    }
}
