//! What the window should show, computed from controller state alone.

use super::capture::CapturePhase;
use super::controller::{Controller, Mode};
use super::devices::{CaptureError, MediaDevices, PreviewHandle, PreviewStore};
use super::upload::{FeedbackEntry, UploadOutcome};

pub const MISSING_ARTIFACT_MESSAGE: &str = "Please select or record a video first.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub mode: Mode,
    pub file_picker_enabled: bool,
    pub recording_controls_visible: bool,
    pub start_visible: bool,
    pub start_enabled: bool,
    pub stop_visible: bool,
    pub capture_message: Option<String>,
    pub selection: Option<String>,
    /// Why the last picked file could not be loaded.
    pub selection_error: Option<String>,
    pub status: Option<String>,
    /// Free-form message the service attached to its last answer.
    pub service_message: Option<String>,
    pub feedback: Vec<String>,
    pub preview: Option<PreviewHandle>,
}

pub fn status_line(outcome: &UploadOutcome) -> Option<String> {
    match outcome {
        UploadOutcome::Idle => None,
        UploadOutcome::Uploading => Some("Uploading...".to_string()),
        UploadOutcome::Success { count, .. } => Some(format!(
            "Upload successful. Bad posture detected in {count} frame(s)."
        )),
        UploadOutcome::Failure(message) => Some(message.clone()),
        UploadOutcome::MissingArtifact => Some(MISSING_ARTIFACT_MESSAGE.to_string()),
    }
}

/// `Frame 12: slouching, forward head`
pub fn feedback_line(entry: &FeedbackEntry) -> String {
    format!("Frame {}: {}", entry.frame, entry.issues.join(", "))
}

fn capture_message(error: &CaptureError) -> String {
    match error {
        CaptureError::MediaAccessDenied(_) => "Could not access the camera.".to_string(),
        CaptureError::DeviceLost(_) => "Recording stopped unexpectedly.".to_string(),
        CaptureError::AlreadyRecording => "A recording is already running.".to_string(),
    }
}

fn human_size(bytes: usize) -> String {
    const MB: f64 = 1_048_576.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.0} KB", (bytes as f64 / 1024.0).ceil())
    }
}

pub fn render<D: MediaDevices, P: PreviewStore>(controller: &Controller<D, P>) -> View {
    let mode = controller.mode();
    let phase = controller.capture_phase();
    let live = mode == Mode::LiveCapture;

    let (feedback, service_message) = match controller.outcome() {
        UploadOutcome::Success {
            feedback, message, ..
        } => (feedback.iter().map(feedback_line).collect(), message.clone()),
        _ => (Vec::new(), None),
    };

    View {
        mode,
        file_picker_enabled: mode == Mode::FileSelect,
        recording_controls_visible: live,
        start_visible: live && phase != CapturePhase::Recording,
        start_enabled: phase == CapturePhase::Idle,
        stop_visible: live && phase == CapturePhase::Recording,
        capture_message: controller.capture_error().map(capture_message),
        selection: controller
            .artifact()
            .map(|a| format!("{} ({}, {})", a.name(), a.mime(), human_size(a.len()))),
        selection_error: controller.file_error().map(str::to_string),
        status: status_line(controller.outcome()),
        service_message,
        feedback,
        preview: controller.preview().cloned(),
    }
}
