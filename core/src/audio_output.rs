use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::PlaybackError;
use crate::session::CycleId;
use crate::slide::AudioClip;

/// Identifies one `play` call so late completions can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipTag {
    pub cycle: CycleId,
    pub index: usize,
    pub serial: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipOutcome {
    Finished,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEvent {
    pub tag: ClipTag,
    pub outcome: ClipOutcome,
}

pub type ClipEventSender = mpsc::UnboundedSender<ClipEvent>;

/// Something that can play clips and report when they end. Outputs report
/// natural completion only; clips replaced by `play` or `stop` stay silent.
pub trait AudioOutput: Send {
    /// Start `clip` from the beginning, replacing whatever is playing.
    fn play(&mut self, clip: &AudioClip, tag: ClipTag) -> Result<(), PlaybackError>;
    /// Pause the current clip. Returns false when it cannot be resumed.
    fn pause(&mut self) -> bool;
    /// Continue the clip paused by the last `pause`.
    fn resume(&mut self) -> Result<(), PlaybackError>;
    fn stop(&mut self);
}

struct RunningClip {
    /// Cleared once the process has been reaped
    pid: Arc<Mutex<Option<u32>>>,
    // Dropping the sender stops the player process
    _cancel: oneshot::Sender<()>,
}

/// Plays clips through an external player process such as `ffplay`.
pub struct ProcessAudioOutput {
    command: Vec<String>,
    events: ClipEventSender,
    current: Option<RunningClip>,
}

impl ProcessAudioOutput {
    pub fn new(command: Vec<String>, events: ClipEventSender) -> Self {
        Self {
            command,
            events,
            current: None,
        }
    }

    fn build_command(&self, path: &Path) -> Result<(String, Command), PlaybackError> {
        let (program, args) = self.command.split_first().ok_or_else(|| PlaybackError::Rejected {
            reason: "no audio player configured".to_string(),
        })?;
        let file = path.to_string_lossy();
        let mut substituted = false;
        let args: Vec<String> = args
            .iter()
            .map(|arg| {
                if arg.contains("{file}") {
                    substituted = true;
                    arg.replace("{file}", &file)
                } else {
                    arg.clone()
                }
            })
            .collect();

        let mut cmd = Command::new(program);
        cmd.args(&args);
        if !substituted {
            cmd.arg(path);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        Ok((program.clone(), cmd))
    }

    fn running_pid(&self) -> Option<u32> {
        let clip = self.current.as_ref()?;
        *clip.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Some(pid) = self.running_pid() else {
            return false;
        };
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => true,
            Err(e) => {
                debug!("Failed to send {signal:?} to audio player {pid}: {e}");
                false
            }
        }
    }
}

impl AudioOutput for ProcessAudioOutput {
    fn play(&mut self, clip: &AudioClip, tag: ClipTag) -> Result<(), PlaybackError> {
        self.stop();
        let (program, mut cmd) = self.build_command(clip.path())?;
        let mut child = cmd
            .spawn()
            .map_err(|source| PlaybackError::Spawn { program, source })?;
        let pid = Arc::new(Mutex::new(child.id()));
        let reaped = Arc::clone(&pid);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    *reaped.lock().unwrap_or_else(PoisonError::into_inner) = None;
                    let outcome = match status {
                        Ok(status) if status.success() => ClipOutcome::Finished,
                        Ok(status) => ClipOutcome::Failed(format!("audio player exited with {status}")),
                        Err(e) => ClipOutcome::Failed(e.to_string()),
                    };
                    let _ = events.send(ClipEvent { tag, outcome });
                }
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to stop audio player: {e}");
                    }
                }
            }
        });

        self.current = Some(RunningClip {
            pid,
            _cancel: cancel_tx,
        });
        Ok(())
    }

    #[cfg(unix)]
    fn pause(&mut self) -> bool {
        self.signal(nix::sys::signal::Signal::SIGSTOP)
    }

    #[cfg(not(unix))]
    fn pause(&mut self) -> bool {
        self.stop();
        false
    }

    #[cfg(unix)]
    fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.signal(nix::sys::signal::Signal::SIGCONT) {
            Ok(())
        } else {
            Err(PlaybackError::Rejected {
                reason: "no paused clip to resume".to_string(),
            })
        }
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::Rejected {
            reason: "pausing is not supported on this platform".to_string(),
        })
    }

    fn stop(&mut self) {
        self.current = None;
    }
}

/// Makes no sound; reports each clip finished after its WAV duration.
pub struct NullAudioOutput {
    events: ClipEventSender,
    fallback: Duration,
    current: Option<JoinHandle<()>>,
}

impl NullAudioOutput {
    pub fn new(events: ClipEventSender, fallback: Duration) -> Self {
        Self {
            events,
            fallback,
            current: None,
        }
    }
}

impl AudioOutput for NullAudioOutput {
    fn play(&mut self, clip: &AudioClip, tag: ClipTag) -> Result<(), PlaybackError> {
        self.stop();
        let length = clip.duration().unwrap_or(self.fallback);
        let events = self.events.clone();
        self.current = Some(tokio::spawn(async move {
            tokio::time::sleep(length).await;
            let _ = events.send(ClipEvent {
                tag,
                outcome: ClipOutcome::Finished,
            });
        }));
        Ok(())
    }

    fn pause(&mut self) -> bool {
        self.stop();
        false
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::Rejected {
            reason: "silent output restarts clips instead of resuming".to_string(),
        })
    }

    fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

impl Drop for NullAudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
