//! Toolkit-free capture/upload state machine.

pub mod capture;
pub mod controller;
pub mod devices;
pub mod media;
pub mod upload;
pub mod view;

#[cfg(test)]
pub mod testing;

pub use capture::CapturePhase;
pub use controller::{Controller, FilePick, Mode};
pub use devices::{
    CaptureError, CaptureEvent, LiveStream, MediaDevices, PreviewError, PreviewHandle,
    PreviewStore, SessionId, Track, TrackState,
};
pub use media::MediaArtifact;
pub use upload::{AnalysisReport, FeedbackEntry, UploadRequest, UploadTicket};
pub use view::View;
