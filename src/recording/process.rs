use super::command::RecorderCommand;
use crate::error::{RecordError, RecordResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Handle to a running recorder
#[async_trait::async_trait]
pub trait RecorderProcess: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// True once the process has exited
    fn has_exited(&mut self) -> RecordResult<bool>;

    /// Ask the recorder to finish its file and exit (SIGINT)
    fn interrupt(&mut self) -> RecordResult<()>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> RecordResult<()>;

    /// Kill the process outright and reap it
    async fn kill(&mut self) -> RecordResult<()>;
}

/// Stop a recorder so that its output is finalized.
///
/// Interrupts first (FFmpeg writes its trailer, `gst-launch --eos-on-shutdown`
/// pushes EOS through the muxer), waits up to `grace`, and only then kills.
pub async fn shutdown(process: &mut dyn RecorderProcess, grace: Duration) -> RecordResult<()> {
    if process.has_exited()? {
        warn!("Recorder {:?} had already exited", process.pid());
        return Ok(());
    }

    if let Err(e) = process.interrupt() {
        warn!("Failed to interrupt recorder {:?}: {}", process.pid(), e);
        return process.kill().await;
    }

    let waited = tokio::time::timeout(grace, process.wait()).await;
    match waited {
        Ok(result) => {
            info!("Recorder {:?} exited after interrupt", process.pid());
            result
        }
        Err(_) => {
            warn!(
                "Recorder {:?} still running {}ms after interrupt, killing",
                process.pid(),
                grace.as_millis()
            );
            process.kill().await
        }
    }
}

/// Starts recorder processes
///
/// - `SystemSpawner`: real child processes via tokio
/// - Tests: fakes that never touch the OS
#[async_trait::async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(
        &self,
        session_id: &str,
        command: &RecorderCommand,
    ) -> RecordResult<Box<dyn RecorderProcess>>;
}

pub struct SystemSpawner;

#[async_trait::async_trait]
impl ProcessSpawner for SystemSpawner {
    async fn spawn(
        &self,
        session_id: &str,
        command: &RecorderCommand,
    ) -> RecordResult<Box<dyn RecorderProcess>> {
        if let Some(dir) = command.output_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        info!("Spawning recorder for {}: {}", session_id, command.display());

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecordError::ExternalToolFailure {
                tool: command.program.clone(),
                status: "spawn failed".to_string(),
                stderr: e.to_string(),
            })?;

        if let Some(stderr) = child.stderr.take() {
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(session = %session_id, "recorder: {}", line);
                }
            });
        }

        let mut process = ChildProcess { child };

        if let Some(input) = &command.stdin {
            if let Err(e) = process.write_stdin(input).await {
                let _ = process.kill().await;
                return Err(e);
            }
        }

        info!("Recorder for {} started (pid {:?})", session_id, process.pid());

        Ok(Box::new(process))
    }
}

/// Recorder running as a child process
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    async fn write_stdin(&mut self, input: &str) -> RecordResult<()> {
        if let Some(mut stdin) = self.child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecorderProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn has_exited(&mut self) -> RecordResult<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    #[cfg(unix)]
    fn interrupt(&mut self) -> RecordResult<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self
            .child
            .id()
            .ok_or_else(|| RecordError::Io(std::io::Error::other("recorder already reaped")))?;
        let pid = i32::try_from(pid)
            .map_err(|_| RecordError::Io(std::io::Error::other("recorder pid out of range")))?;

        kill(Pid::from_raw(pid), Signal::SIGINT)
            .map_err(|errno| RecordError::Io(std::io::Error::from(errno)))
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) -> RecordResult<()> {
        Err(RecordError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "interrupt is only available on unix",
        )))
    }

    async fn wait(&mut self) -> RecordResult<()> {
        let status = self.child.wait().await?;
        debug!("Recorder exited: {}", status);
        Ok(())
    }

    async fn kill(&mut self) -> RecordResult<()> {
        self.child.kill().await?;
        info!("Recorder killed");
        Ok(())
    }
}
