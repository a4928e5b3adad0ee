//! Persistent shell session management.
//!
//! One interactive shell child process at a time, stdio fully piped. Two
//! background pumps drain stdout and stderr into line buffers that request
//! handlers poll; the session itself is a `Stopped`/`Running` state machine
//! serialized behind a single mutex, with check-and-repair on every state
//! read so an out-of-band process death is observed at most one call late.

mod buffer;
mod pump;

pub use buffer::OutputBuffer;

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start shell: {0}")]
    Spawn(#[source] io::Error),
    #[error("Shell is not running")]
    NotRunning,
    #[error("Failed to write to shell: {0}")]
    PipeWrite(#[source] io::Error),
}

/// Everything owned by a live shell process.
struct RunningSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Arc<Mutex<ChildStdout>>,
    stderr: Arc<Mutex<ChildStderr>>,
    cancel: CancellationToken,
    stdout_pump: JoinHandle<()>,
    stderr_pump: JoinHandle<()>,
}

#[derive(Default)]
struct SessionState {
    running: Option<RunningSession>,
    /// Working directory of the most recent successful start, used by restarts.
    last_dir: Option<PathBuf>,
    ever_started: bool,
}

/// The single managed shell session.
///
/// All state transitions go through `state`; the output buffers deliberately
/// live outside it so the pumps never contend with a stop or status check.
pub struct ShellSession {
    state: Mutex<SessionState>,
    stdout_buf: Arc<OutputBuffer>,
    stderr_buf: Arc<OutputBuffer>,
}

impl ShellSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            stdout_buf: Arc::new(OutputBuffer::new()),
            stderr_buf: Arc::new(OutputBuffer::new()),
        }
    }

    /// Start the shell, a no-op if one is already running.
    ///
    /// `working_dir` defaults to the daemon's current directory and is
    /// recorded for future restarts.
    pub async fn start(&self, working_dir: Option<PathBuf>) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state, working_dir).await
    }

    /// Write one line of input to the shell's stdin.
    ///
    /// A write failure means the process died mid-write; the session is torn
    /// down before the error surfaces.
    pub async fn send_input(&self, input: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        reap_if_dead(&mut state).await;

        let Some(running) = state.running.as_mut() else {
            return Err(SessionError::NotRunning);
        };

        let mut line = input.as_bytes().to_vec();
        line.push(b'\n');

        let write = async {
            running.stdin.write_all(&line).await?;
            running.stdin.flush().await
        }
        .await;

        if let Err(e) = write {
            warn!("Shell input write failed, stopping session: {e}");
            if let Some(running) = state.running.take() {
                teardown(running).await;
            }
            return Err(SessionError::PipeWrite(e));
        }
        Ok(())
    }

    /// Drain everything the shell has written to stdout so far.
    pub async fn read_output(&self) -> Vec<String> {
        let lines = self.stdout_buf.drain_all();
        if lines.is_empty() {
            self.heal_pumps().await;
        }
        lines
    }

    /// Drain everything the shell has written to stderr so far.
    pub async fn read_error(&self) -> Vec<String> {
        let lines = self.stderr_buf.drain_all();
        if lines.is_empty() {
            self.heal_pumps().await;
        }
        lines
    }

    /// Whether the shell is running, repairing stale state on the way.
    pub async fn is_running(&self) -> bool {
        let mut state = self.state.lock().await;
        reap_if_dead(&mut state).await;
        state.running.is_some()
    }

    /// Whether any start has ever succeeded on this session.
    pub async fn ever_started(&self) -> bool {
        self.state.lock().await.ever_started
    }

    /// Stop the shell. Idempotent; a stop with nothing running is a no-op.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        match state.running.take() {
            Some(running) => {
                teardown(running).await;
                info!("Shell stopped");
            }
            None => debug!("Stop requested with no shell running"),
        }
    }

    /// Restart the shell in the last recorded working directory. Trivially
    /// succeeds if it is already running.
    pub async fn try_restart(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        let last_dir = state.last_dir.clone();
        self.start_locked(&mut state, last_dir).await
    }

    async fn start_locked(
        &self,
        state: &mut SessionState,
        working_dir: Option<PathBuf>,
    ) -> Result<(), SessionError> {
        reap_if_dead(state).await;
        if state.running.is_some() {
            info!("Shell already running, start ignored");
            return Ok(());
        }

        let dir = working_dir
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut child = Command::new(shell_program())
            .current_dir(&dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SessionError::Spawn)?;

        let (stdin, stdout, stderr) = match (
            child.stdin.take(),
            child.stdout.take(),
            child.stderr.take(),
        ) {
            (Some(i), Some(o), Some(e)) => (i, o, e),
            _ => {
                let _ = child.kill().await;
                return Err(SessionError::Spawn(io::Error::new(
                    io::ErrorKind::Other,
                    "failed to capture shell stdio",
                )));
            }
        };

        let stdout = Arc::new(Mutex::new(stdout));
        let stderr = Arc::new(Mutex::new(stderr));
        let cancel = CancellationToken::new();

        let stdout_pump = tokio::spawn(pump::run_pump(
            stdout.clone(),
            self.stdout_buf.clone(),
            cancel.clone(),
            "stdout",
        ));
        let stderr_pump = tokio::spawn(pump::run_pump(
            stderr.clone(),
            self.stderr_buf.clone(),
            cancel.clone(),
            "stderr",
        ));

        info!("Shell started in {}", dir.display());
        state.running = Some(RunningSession {
            child,
            stdin,
            stdout,
            stderr,
            cancel,
            stdout_pump,
            stderr_pump,
        });
        state.last_dir = Some(dir);
        state.ever_started = true;
        Ok(())
    }

    /// Kill the stdout pump in place, leaving the shell running.
    #[cfg(test)]
    async fn abort_stdout_pump(&self) {
        let state = self.state.lock().await;
        if let Some(running) = state.running.as_ref() {
            running.stdout_pump.abort();
        }
    }

    /// Relaunch any pump that terminated while the process is still alive,
    /// recovering from a one-off pump failure without restarting the shell.
    async fn heal_pumps(&self) {
        let mut state = self.state.lock().await;
        reap_if_dead(&mut state).await;
        let Some(running) = state.running.as_mut() else {
            return;
        };

        if running.stdout_pump.is_finished() {
            warn!("stdout pump terminated with shell still live, relaunching");
            running.stdout_pump = tokio::spawn(pump::run_pump(
                running.stdout.clone(),
                self.stdout_buf.clone(),
                running.cancel.clone(),
                "stdout",
            ));
        }
        if running.stderr_pump.is_finished() {
            warn!("stderr pump terminated with shell still live, relaunching");
            running.stderr_pump = tokio::spawn(pump::run_pump(
                running.stderr.clone(),
                self.stderr_buf.clone(),
                running.cancel.clone(),
                "stderr",
            ));
        }
    }
}

impl Default for ShellSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Release a session the process of which has exited out of band.
async fn reap_if_dead(state: &mut SessionState) {
    let dead = match state.running.as_mut() {
        Some(running) => !matches!(running.child.try_wait(), Ok(None)),
        None => return,
    };
    if dead {
        info!("Shell process exited out of band, cleaning up");
        if let Some(running) = state.running.take() {
            teardown(running).await;
        }
    }
}

/// Cancel the pumps, close stdin and kill the process. Does not wait for the
/// pumps; they exit on their next poll.
async fn teardown(running: RunningSession) {
    let RunningSession {
        mut child,
        stdin,
        cancel,
        ..
    } = running;
    cancel.cancel();
    drop(stdin);
    if let Err(e) = child.kill().await {
        debug!("Shell kill failed: {e}");
    }
}

fn shell_program() -> String {
    if cfg!(windows) {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn drain_until_contains(session: &ShellSession, needle: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for _ in 0..150 {
            seen.extend(session.read_output().await);
            if seen.iter().any(|line| line == needle) {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {needle:?}, saw {seen:?}");
    }

    async fn wait_until_stopped(session: &ShellSession) {
        for _ in 0..150 {
            if !session.is_running().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("shell never observed as stopped");
    }

    #[tokio::test]
    async fn input_before_start_fails_without_side_effects() {
        let session = ShellSession::new();
        assert!(matches!(
            session.send_input("echo hello").await,
            Err(SessionError::NotRunning)
        ));
        assert!(!session.ever_started().await);
        assert!(!session.is_running().await);
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();
        session.send_input("echo hello").await.unwrap();
        drain_until_contains(&session, "hello").await;
        session.stop().await;
        assert!(!session.is_running().await);
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();
        session.start(None).await.unwrap();
        session.send_input("echo once").await.unwrap();
        let lines = drain_until_contains(&session, "once").await;
        assert_eq!(lines.iter().filter(|l| *l == "once").count(), 1);
        session.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_start_keeps_first_working_directory() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let expected = dir_a.path().canonicalize().unwrap();

        let session = ShellSession::new();
        session.start(Some(dir_a.path().to_path_buf())).await.unwrap();
        session.start(Some(dir_b.path().to_path_buf())).await.unwrap();
        session.send_input("pwd").await.unwrap();
        drain_until_contains(&session, &expected.display().to_string()).await;
        session.stop().await;
    }

    #[tokio::test]
    async fn status_self_heals_after_out_of_band_exit() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();
        session.send_input("exit").await.unwrap();
        wait_until_stopped(&session).await;
        assert!(matches!(
            session.send_input("echo dead").await,
            Err(SessionError::NotRunning)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn restart_reuses_last_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();

        let session = ShellSession::new();
        session.start(Some(dir.path().to_path_buf())).await.unwrap();
        session.send_input("exit").await.unwrap();
        wait_until_stopped(&session).await;

        session.try_restart().await.unwrap();
        assert!(session.is_running().await);
        session.send_input("pwd").await.unwrap();
        drain_until_contains(&session, &expected.display().to_string()).await;
        session.stop().await;
    }

    #[tokio::test]
    async fn empty_read_relaunches_a_dead_pump() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();

        session.abort_stdout_pump().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The shell is still alive; polling drains nothing, notices the
        // finished pump and relaunches it, after which output flows again.
        assert!(session.is_running().await);
        session.send_input("echo healed").await.unwrap();
        drain_until_contains(&session, "healed").await;
        session.stop().await;
    }

    #[tokio::test]
    async fn restart_while_running_is_trivial_success() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();
        session.try_restart().await.unwrap();
        assert!(session.is_running().await);
        session.stop().await;
    }

    #[tokio::test]
    async fn stop_twice_is_a_no_op() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();
        session.stop().await;
        session.stop().await;
        assert!(!session.is_running().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_is_buffered_separately() {
        let session = ShellSession::new();
        session.start(None).await.unwrap();
        session.send_input("echo oops 1>&2").await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..150 {
            seen.extend(session.read_error().await);
            if seen.iter().any(|line| line == "oops") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(seen.iter().any(|line| line == "oops"), "saw {seen:?}");
        assert!(!session.read_output().await.iter().any(|l| l == "oops"));
        session.stop().await;
    }
}
