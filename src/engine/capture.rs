use bytes::Bytes;

use super::devices::{CaptureError, CaptureEvent, LiveStream, MediaDevices, SessionId};
use super::media::MediaArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Recording,
    /// Stop was requested; waiting for the recorder to flush.
    Finalizing,
}

struct OpenSession<S: LiveStream> {
    id: SessionId,
    stream: S,
    segments: Vec<Bytes>,
    finalizing: bool,
}

impl<S: LiveStream> OpenSession<S> {
    /// A recorder that ends before producing any data never got the camera.
    fn end_error(&self, reason: String) -> CaptureError {
        if self.segments.is_empty() && !self.finalizing {
            CaptureError::MediaAccessDenied(reason)
        } else {
            CaptureError::DeviceLost(reason)
        }
    }
}

/// Owns the live stream, its recorder and the recorded segments for at most
/// one session at a time.
pub struct CaptureSession<S: LiveStream> {
    open: Option<OpenSession<S>>,
}

impl<S: LiveStream> Default for CaptureSession<S> {
    fn default() -> Self {
        Self { open: None }
    }
}

impl<S: LiveStream> CaptureSession<S> {
    pub fn phase(&self) -> CapturePhase {
        match &self.open {
            None => CapturePhase::Idle,
            Some(s) if s.finalizing => CapturePhase::Finalizing,
            Some(_) => CapturePhase::Recording,
        }
    }

    /// Acquire the camera and begin recording. Rejected while a session is
    /// open; on failure the session stays idle.
    pub fn start<D>(&mut self, devices: &mut D) -> Result<SessionId, CaptureError>
    where
        D: MediaDevices<Stream = S>,
    {
        if let Some(open) = &self.open {
            log::warn!("Start ignored, {} still open", open.id);
            return Err(CaptureError::AlreadyRecording);
        }

        let id = SessionId::next();
        let stream = devices.acquire_video_stream(id)?;
        let labels: Vec<String> = stream.tracks().into_iter().map(|t| t.label).collect();
        log::info!("Recording started ({id}: {})", labels.join(", "));
        self.open = Some(OpenSession {
            id,
            stream,
            segments: Vec::new(),
            finalizing: false,
        });
        Ok(id)
    }

    /// Ask the recorder to finish. The artifact is produced when the
    /// matching [`CaptureEvent::Finalized`] arrives. No-op when idle or
    /// already finalizing.
    pub fn stop(&mut self) -> bool {
        match &mut self.open {
            Some(open) if !open.finalizing => {
                log::info!("Stopping recording ({})", open.id);
                open.finalizing = true;
                open.stream.finalize();
                true
            }
            _ => false,
        }
    }

    /// Feed one recorder event. Returns the session result once the session
    /// has ended: the artifact on a requested finalize, an error if the
    /// recorder gave up on its own.
    pub fn handle_event(
        &mut self,
        event: CaptureEvent,
    ) -> Option<Result<MediaArtifact, CaptureError>> {
        let open = match &mut self.open {
            Some(open) if open.id == event.session() => open,
            _ => {
                log::debug!("Dropping event for stale {}", event.session());
                return None;
            }
        };

        match event {
            CaptureEvent::Segment { data, .. } => {
                if !data.is_empty() {
                    log::debug!("{}: segment of {} bytes", open.id, data.len());
                    open.segments.push(data);
                }
                None
            }
            CaptureEvent::Finalized { .. } if open.finalizing => {
                let mut open = self.open.take()?;
                open.stream.stop_tracks();
                let artifact = MediaArtifact::from_segments(&open.segments);
                if artifact.is_empty() {
                    log::warn!("{} recorded no data", open.id);
                }
                log::info!(
                    "Recording finished ({}, {} segment(s), {} bytes)",
                    open.id,
                    open.segments.len(),
                    artifact.len()
                );
                Some(Ok(artifact))
            }
            CaptureEvent::Finalized { .. } => {
                let error = open.end_error("recorder finished before stop".into());
                self.teardown();
                Some(Err(error))
            }
            CaptureEvent::Failed { reason, .. } => {
                log::error!("Recorder failed: {reason}");
                let error = open.end_error(reason);
                self.teardown();
                Some(Err(error))
            }
        }
    }

    /// Release the camera and discard buffered data without producing an
    /// artifact.
    pub fn teardown(&mut self) {
        if let Some(mut open) = self.open.take() {
            log::info!(
                "Discarding {} ({} segment(s) buffered)",
                open.id,
                open.segments.len()
            );
            open.stream.stop_tracks();
        }
    }

    pub fn live_preview(&self) -> Option<std::path::PathBuf> {
        self.open.as_ref().and_then(|s| s.stream.live_preview())
    }
}

impl<S: LiveStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
