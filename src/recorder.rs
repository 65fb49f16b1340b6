use std::path::{Path, PathBuf};
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::engine::{CaptureError, CaptureEvent, LiveStream, MediaDevices, SessionId, Track, TrackState};

/// Upper bound on one recorded segment.
const SEGMENT_SIZE: usize = 64 * 1024;

enum Control {
    Finalize,
    Kill,
}

/// Webcam recorder driven by an `ffmpeg` child process. The encoded WebM
/// stream is read from stdout; every read becomes one segment.
pub struct FfmpegCamera {
    ffmpeg: String,
    device: String,
    snapshot_dir: PathBuf,
    runtime: tokio::runtime::Handle,
    events: async_channel::Sender<CaptureEvent>,
}

impl FfmpegCamera {
    pub fn new(
        ffmpeg: &str,
        device: &str,
        snapshot_dir: PathBuf,
        runtime: tokio::runtime::Handle,
        events: async_channel::Sender<CaptureEvent>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            device: device.to_string(),
            snapshot_dir,
            runtime,
            events,
        }
    }
}

fn input_args(device: &str) -> Vec<String> {
    let (format, input) = if cfg!(target_os = "macos") {
        ("avfoundation", device.to_string())
    } else if cfg!(target_os = "windows") {
        ("dshow", format!("video={device}"))
    } else {
        ("v4l2", device.to_string())
    };
    let mut args = vec!["-f".to_string(), format.to_string()];
    if cfg!(target_os = "macos") {
        args.extend(["-framerate".to_string(), "30".to_string()]);
    }
    args.extend(["-i".to_string(), input]);
    args
}

/// Arguments for one recording: VP8/WebM to stdout plus a low-rate JPEG
/// snapshot for the live view.
pub fn ffmpeg_args(device: &str, snapshot: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.extend(input_args(device));
    args.extend(
        [
            "-map", "0:v", "-c:v", "libvpx", "-deadline", "realtime", "-cpu-used", "8", "-b:v",
            "1M", "-f", "webm", "pipe:1", "-map", "0:v", "-vf", "fps=5,scale=480:-2", "-update",
            "1", "-y",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(snapshot.to_string_lossy().into_owned());
    args
}

impl MediaDevices for FfmpegCamera {
    type Stream = FfmpegStream;

    fn acquire_video_stream(&mut self, session: SessionId) -> Result<FfmpegStream, CaptureError> {
        if cfg!(target_os = "linux") && !Path::new(&self.device).exists() {
            return Err(CaptureError::MediaAccessDenied(format!(
                "no camera at {}",
                self.device
            )));
        }
        std::fs::create_dir_all(&self.snapshot_dir).map_err(|e| {
            CaptureError::MediaAccessDenied(format!("cannot prepare live view: {e}"))
        })?;

        let snapshot = self.snapshot_dir.join(format!("{session}.jpg"));
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(ffmpeg_args(&self.device, &snapshot));

        let label = format!("{} (ffmpeg)", self.device);
        let mut stream = spawn_recorder(cmd, session, label, &self.runtime, self.events.clone())?;
        stream.snapshot = Some(snapshot);
        Ok(stream)
    }
}

/// Launch `cmd` as the recorder for `session`.
fn spawn_recorder(
    mut cmd: Command,
    session: SessionId,
    label: String,
    runtime: &tokio::runtime::Handle,
    events: async_channel::Sender<CaptureEvent>,
) -> Result<FfmpegStream, CaptureError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = {
        let _guard = runtime.enter();
        cmd.spawn()
            .map_err(|e| CaptureError::MediaAccessDenied(format!("failed to launch recorder: {e}")))?
    };

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    runtime.spawn(run_recorder(session, child, control_rx, events));

    Ok(FfmpegStream {
        control: control_tx,
        track: Track {
            label,
            state: TrackState::Live,
        },
        snapshot: None,
    })
}

async fn run_recorder(
    session: SessionId,
    mut child: Child,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: async_channel::Sender<CaptureEvent>,
) {
    let (Some(mut stdout), mut stdin) = (child.stdout.take(), child.stdin.take()) else {
        let _ = child.kill().await;
        let reason = "recorder has no output pipe".to_string();
        let _ = events.send(CaptureEvent::Failed { session, reason }).await;
        return;
    };
    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        })
    });

    let mut buf = vec![0u8; SEGMENT_SIZE];
    let mut finalizing = false;
    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    if events.send(CaptureEvent::Segment { session, data }).await.is_err() {
                        let _ = child.kill().await;
                        return;
                    }
                }
                Err(e) => {
                    let _ = child.kill().await;
                    let reason = format!("reading recorder output: {e}");
                    let _ = events.send(CaptureEvent::Failed { session, reason }).await;
                    return;
                }
            },
            cmd = control.recv() => match cmd {
                Some(Control::Finalize) => {
                    finalizing = true;
                    // ffmpeg finishes the container when it reads `q`.
                    if let Some(mut pipe) = stdin.take() {
                        let _ = pipe.write_all(b"q").await;
                    }
                }
                Some(Control::Kill) | None => {
                    let _ = child.kill().await;
                    log::debug!("Recorder for {session} killed");
                    return;
                }
            },
        }
    }

    let status = child.wait().await;
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    let event = match status {
        Ok(_) if finalizing => CaptureEvent::Finalized { session },
        Ok(status) => {
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("recorder exited with {status}"));
            CaptureEvent::Failed { session, reason }
        }
        Err(e) => CaptureEvent::Failed {
            session,
            reason: e.to_string(),
        },
    };
    let _ = events.send(event).await;
}

/// Handle to a running recorder.
pub struct FfmpegStream {
    control: mpsc::UnboundedSender<Control>,
    track: Track,
    snapshot: Option<PathBuf>,
}

impl LiveStream for FfmpegStream {
    fn tracks(&self) -> Vec<Track> {
        vec![self.track.clone()]
    }

    fn finalize(&mut self) {
        let _ = self.control.send(Control::Finalize);
    }

    fn stop_tracks(&mut self) {
        if self.track.state == TrackState::Ended {
            return;
        }
        self.track.state = TrackState::Ended;
        let _ = self.control.send(Control::Kill);
        if let Some(path) = self.snapshot.take() {
            let _ = std::fs::remove_file(path);
        }
    }

    fn live_preview(&self) -> Option<PathBuf> {
        self.snapshot.clone().filter(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn args_write_webm_to_stdout_and_snapshot_to_file() {
        let args = ffmpeg_args("/dev/video2", Path::new("/tmp/live.jpg"));
        assert!(args.windows(2).any(|w| w[0] == "-i"));
        let webm = args.iter().position(|a| a == "webm").unwrap();
        assert_eq!(args[webm + 1], "pipe:1");
        assert_eq!(args.last().unwrap(), "/tmp/live.jpg");
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[cfg(unix)]
    async fn next_event(rx: &async_channel::Receiver<CaptureEvent>) -> CaptureEvent {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("recorder event timed out")
            .expect("event channel closed")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn finalize_flushes_remaining_output() {
        let (tx, rx) = async_channel::unbounded();
        let session = SessionId::next();
        let mut stream = spawn_recorder(
            shell("printf seg1; read _q; printf seg2"),
            session,
            "test".into(),
            &tokio::runtime::Handle::current(),
            tx,
        )
        .unwrap();

        let mut data = Vec::new();
        match next_event(&rx).await {
            CaptureEvent::Segment { data: d, .. } => data.extend_from_slice(&d),
            other => panic!("unexpected {other:?}"),
        }
        stream.finalize();
        loop {
            match next_event(&rx).await {
                CaptureEvent::Segment { data: d, .. } => data.extend_from_slice(&d),
                CaptureEvent::Finalized { session: s } => {
                    assert_eq!(s, session);
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(data, b"seg1seg2");

        stream.stop_tracks();
        assert_eq!(stream.tracks()[0].state, TrackState::Ended);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unexpected_exit_reports_stderr() {
        let (tx, rx) = async_channel::unbounded();
        let _stream = spawn_recorder(
            shell("echo '/dev/video0: Permission denied' >&2; exit 1"),
            SessionId::next(),
            "test".into(),
            &tokio::runtime::Handle::current(),
            tx,
        )
        .unwrap();

        match next_event(&rx).await {
            CaptureEvent::Failed { reason, .. } => {
                assert_eq!(reason, "/dev/video0: Permission denied")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_tracks_kills_without_events() {
        let (tx, rx) = async_channel::unbounded();
        let mut stream = spawn_recorder(
            shell("sleep 30"),
            SessionId::next(),
            "test".into(),
            &tokio::runtime::Handle::current(),
            tx,
        )
        .unwrap();

        stream.stop_tracks();
        let closed = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("recorder did not exit");
        assert!(closed.is_err());
    }

    #[test]
    fn missing_binary_is_access_denied() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, _rx) = async_channel::unbounded();
        let result = spawn_recorder(
            Command::new("/nonexistent/ffmpeg"),
            SessionId::next(),
            "test".into(),
            runtime.handle(),
            tx,
        );
        assert!(matches!(result, Err(CaptureError::MediaAccessDenied(_))));
    }
}
