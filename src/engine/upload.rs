use bytes::Bytes;
use serde::Deserialize;

use super::devices::{PreviewHandle, PreviewStore};
use super::media::{ArtifactId, MediaArtifact};

/// Shown for every transport or server failure; the cause only goes to the log.
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";

/// Posture issues the service found in one frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedbackEntry {
    pub frame: u64,
    pub issues: Vec<String>,
}

/// Parsed body of a successful analysis response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub message: Option<String>,
    pub feedback: Vec<FeedbackEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Idle,
    Uploading,
    Success {
        count: usize,
        feedback: Vec<FeedbackEntry>,
        message: Option<String>,
    },
    Failure(String),
    MissingArtifact,
}

/// Identifies what was current when a request was issued. A completion is
/// applied only if both still match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    pub artifact: ArtifactId,
    pub epoch: u64,
}

/// Everything the transport needs, detached from the coordinator so it can
/// cross to the I/O runtime.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub ticket: UploadTicket,
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

struct Current {
    artifact: MediaArtifact,
    preview: Option<PreviewHandle>,
}

/// Owns the current artifact, its preview handle and the upload outcome.
pub struct UploadCoordinator<P: PreviewStore> {
    previews: P,
    current: Option<Current>,
    outcome: UploadOutcome,
    epoch: u64,
}

impl<P: PreviewStore> UploadCoordinator<P> {
    pub fn new(previews: P) -> Self {
        Self {
            previews,
            current: None,
            outcome: UploadOutcome::Idle,
            epoch: 0,
        }
    }

    pub fn artifact(&self) -> Option<&MediaArtifact> {
        self.current.as_ref().map(|c| &c.artifact)
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.current.as_ref().and_then(|c| c.preview.as_ref())
    }

    pub fn outcome(&self) -> &UploadOutcome {
        &self.outcome
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Make `artifact` current with a fresh preview and an idle outcome.
    pub fn select(&mut self, artifact: MediaArtifact) {
        log::info!(
            "Selected {} ({}, {}, {} bytes)",
            artifact.id(),
            artifact.name(),
            artifact.mime(),
            artifact.len()
        );
        self.replace(Some(artifact));
    }

    /// Drop artifact, preview and outcome, and invalidate every request
    /// issued so far.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.replace(None);
    }

    pub fn clear_outcome(&mut self) {
        self.outcome = UploadOutcome::Idle;
    }

    /// The single place previews change hands: release the old handle, then
    /// install the next one.
    fn replace(&mut self, next: Option<MediaArtifact>) {
        if let Some(handle) = self.current.take().and_then(|c| c.preview) {
            log::debug!("Releasing preview of {}", handle.artifact);
            self.previews.release(handle);
        }
        self.current = next.map(|artifact| {
            let preview = match self.previews.create(&artifact) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("No preview for {}: {e}", artifact.id());
                    None
                }
            };
            Current { artifact, preview }
        });
        self.outcome = UploadOutcome::Idle;
    }

    /// Build a request for the current artifact. Without one, records
    /// `MissingArtifact` and returns `None`.
    pub fn upload(&mut self) -> Option<UploadRequest> {
        let Some(current) = &self.current else {
            log::info!("Upload requested with nothing selected");
            self.outcome = UploadOutcome::MissingArtifact;
            return None;
        };

        let artifact = &current.artifact;
        let request = UploadRequest {
            ticket: UploadTicket {
                artifact: artifact.id(),
                epoch: self.epoch,
            },
            name: artifact.name().to_string(),
            mime: artifact.mime().to_string(),
            bytes: artifact.bytes().clone(),
        };
        log::info!("Uploading {} ({})", artifact.id(), artifact.name());
        self.outcome = UploadOutcome::Uploading;
        Some(request)
    }

    /// Apply a finished request. Returns `false` when the response is stale
    /// and was discarded.
    pub fn complete<E: std::fmt::Display>(
        &mut self,
        ticket: UploadTicket,
        result: Result<AnalysisReport, E>,
    ) -> bool {
        let current = self.current.as_ref().map(|c| c.artifact.id());
        if ticket.epoch != self.epoch || current != Some(ticket.artifact) {
            log::debug!("Discarding stale response for {}", ticket.artifact);
            return false;
        }

        self.outcome = match result {
            Ok(report) => {
                if let Some(message) = &report.message {
                    log::info!("Service says: {message}");
                }
                UploadOutcome::Success {
                    count: report.feedback.len(),
                    feedback: report.feedback,
                    message: report.message,
                }
            }
            Err(e) => {
                log::error!("Upload of {} failed: {e}", ticket.artifact);
                UploadOutcome::Failure(UPLOAD_FAILED_MESSAGE.to_string())
            }
        };
        true
    }
}

impl<P: PreviewStore> Drop for UploadCoordinator<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take().and_then(|c| c.preview) {
            self.previews.release(handle);
        }
    }
}
