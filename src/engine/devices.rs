//! Environment capabilities the state machine depends on but does not
//! implement: camera access with a recorder, and revocable preview handles.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use super::media::{ArtifactId, MediaArtifact};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one capture session. Recorder events carry it so that events
/// from a torn-down session can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The environment refused the camera (no device, permission denied,
    /// recorder could not be launched).
    #[error("camera access denied: {0}")]
    MediaAccessDenied(String),
    #[error("a recording is already in progress")]
    AlreadyRecording,
    /// The recorder stopped on its own while a session was open.
    #[error("camera stopped unexpectedly: {0}")]
    DeviceLost(String),
}

/// Events a recorder delivers while its session is open.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Segment { session: SessionId, data: Bytes },
    Finalized { session: SessionId },
    Failed { session: SessionId, reason: String },
}

impl CaptureEvent {
    pub fn session(&self) -> SessionId {
        match self {
            CaptureEvent::Segment { session, .. }
            | CaptureEvent::Finalized { session }
            | CaptureEvent::Failed { session, .. } => *session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub label: String,
    pub state: TrackState,
}

/// A live camera stream with a recorder attached.
///
/// Recorded data and the finalize notification arrive asynchronously as
/// [`CaptureEvent`]s tagged with the session the stream was acquired for.
pub trait LiveStream {
    fn tracks(&self) -> Vec<Track>;

    /// Ask the recorder to flush and finish. Completion is reported with
    /// [`CaptureEvent::Finalized`].
    fn finalize(&mut self);

    /// Release the camera. Must be safe to call after the recorder finished.
    fn stop_tracks(&mut self);

    /// Image the live view should show while recording, if any.
    fn live_preview(&self) -> Option<PathBuf> {
        None
    }
}

pub trait MediaDevices {
    type Stream: LiveStream;

    /// Open the camera and start recording into events for `session`.
    fn acquire_video_stream(&mut self, session: SessionId) -> Result<Self::Stream, CaptureError>;
}

/// Playback reference bound to one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    pub artifact: ArtifactId,
    pub location: String,
    pub mime: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("failed to write preview: {0}")]
    Io(#[from] std::io::Error),
}

pub trait PreviewStore {
    fn create(&mut self, artifact: &MediaArtifact) -> Result<PreviewHandle, PreviewError>;
    fn release(&mut self, handle: PreviewHandle);
}
