use super::capture::{CapturePhase, CaptureSession};
use super::devices::{
    CaptureError, CaptureEvent, MediaDevices, PreviewHandle, PreviewStore, SessionId,
};
use super::media::{MediaArtifact, Provenance};
use super::upload::{AnalysisReport, UploadCoordinator, UploadOutcome, UploadRequest, UploadTicket};

/// Which input may produce an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    FileSelect,
    LiveCapture,
}

/// Identifies one file pick. Only the newest pick of the current epoch may
/// install its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePick {
    epoch: u64,
    seq: u64,
}

/// Composes the capture session and the upload coordinator behind the
/// active mode. Every mutation goes through one of the methods below.
pub struct Controller<D: MediaDevices, P: PreviewStore> {
    mode: Mode,
    devices: D,
    capture: CaptureSession<D::Stream>,
    uploads: UploadCoordinator<P>,
    capture_error: Option<CaptureError>,
    picks: u64,
    file_error: Option<String>,
}

impl<D: MediaDevices, P: PreviewStore> Controller<D, P> {
    pub fn new(devices: D, previews: P) -> Self {
        Self {
            mode: Mode::default(),
            devices,
            capture: CaptureSession::default(),
            uploads: UploadCoordinator::new(previews),
            capture_error: None,
            picks: 0,
            file_error: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode and reset everything derived from the previous one.
    /// An open recording is torn down without producing an artifact.
    pub fn set_mode(&mut self, mode: Mode) {
        log::info!("Mode {:?} -> {mode:?}", self.mode);
        self.capture.teardown();
        self.uploads.reset();
        self.capture_error = None;
        self.file_error = None;
        self.mode = mode;
    }

    /// Register a new file pick. Loads for every earlier pick become stale.
    pub fn begin_file_pick(&mut self) -> FilePick {
        self.picks += 1;
        self.file_error = None;
        self.latest_pick()
    }

    fn latest_pick(&self) -> FilePick {
        FilePick {
            epoch: self.uploads.epoch(),
            seq: self.picks,
        }
    }

    fn is_current_pick(&self, pick: FilePick) -> bool {
        self.mode == Mode::FileSelect && pick == self.latest_pick()
    }

    /// Install a picked file. Ignored outside file-select mode, after a mode
    /// switch, or when a newer pick has been made since.
    pub fn select_file(&mut self, pick: FilePick, artifact: MediaArtifact) -> bool {
        if !self.is_current_pick(pick) {
            log::debug!("Discarding file {} from a superseded pick", artifact.name());
            return false;
        }
        debug_assert_eq!(artifact.provenance(), Provenance::UserFile);
        self.uploads.select(artifact);
        true
    }

    /// Record that the file for `pick` could not be read. Stale picks are
    /// ignored like in [`Self::select_file`].
    pub fn file_load_failed(&mut self, pick: FilePick, reason: String) -> bool {
        if !self.is_current_pick(pick) {
            log::debug!("Discarding load failure from a superseded pick: {reason}");
            return false;
        }
        self.file_error = Some(reason);
        true
    }

    pub fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    /// Open a capture session. Returns its id when recording started.
    pub fn start_recording(&mut self) -> Option<SessionId> {
        if self.mode != Mode::LiveCapture {
            log::warn!("Start recording ignored in {:?} mode", self.mode);
            return None;
        }
        self.uploads.clear_outcome();
        match self.capture.start(&mut self.devices) {
            Ok(id) => {
                self.capture_error = None;
                Some(id)
            }
            Err(CaptureError::AlreadyRecording) => None,
            Err(e) => {
                log::error!("Could not start recording: {e}");
                self.capture_error = Some(e);
                None
            }
        }
    }

    pub fn stop_recording(&mut self) {
        self.capture.stop();
    }

    pub fn handle_capture_event(&mut self, event: CaptureEvent) {
        match self.capture.handle_event(event) {
            Some(Ok(artifact)) => self.uploads.select(artifact),
            Some(Err(e)) => self.capture_error = Some(e),
            None => {}
        }
    }

    pub fn upload(&mut self) -> Option<UploadRequest> {
        self.uploads.upload()
    }

    pub fn complete_upload<E: std::fmt::Display>(
        &mut self,
        ticket: UploadTicket,
        result: Result<AnalysisReport, E>,
    ) -> bool {
        self.uploads.complete(ticket, result)
    }

    pub fn capture_phase(&self) -> CapturePhase {
        self.capture.phase()
    }

    pub fn capture_error(&self) -> Option<&CaptureError> {
        self.capture_error.as_ref()
    }

    pub fn artifact(&self) -> Option<&MediaArtifact> {
        self.uploads.artifact()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.uploads.preview()
    }

    pub fn outcome(&self) -> &UploadOutcome {
        self.uploads.outcome()
    }

    pub fn live_preview(&self) -> Option<std::path::PathBuf> {
        self.capture.live_preview()
    }

    /// Release the camera and the preview before the process exits.
    pub fn shutdown(&mut self) {
        self.capture.teardown();
        self.uploads.reset();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::engine::devices::TrackState;
    use crate::engine::testing::{FakeDevices, FakePreviews};
    use crate::engine::upload::FeedbackEntry;

    type TestController = Controller<FakeDevices, FakePreviews>;

    fn controller() -> (TestController, FakePreviews) {
        let previews = FakePreviews::default();
        (
            Controller::new(FakeDevices::default(), previews.clone()),
            previews,
        )
    }

    fn clip() -> MediaArtifact {
        MediaArtifact::from_file("clip.mp4", "video/mp4", Bytes::from_static(b"mp4"))
    }

    fn assert_reset(c: &TestController) {
        assert!(c.artifact().is_none());
        assert!(c.preview().is_none());
        assert_eq!(c.outcome(), &UploadOutcome::Idle);
        assert_eq!(c.capture_phase(), CapturePhase::Idle);
        assert!(c.capture_error().is_none());
    }

    fn record(c: &mut TestController, chunks: &[&'static [u8]]) {
        let session = c.start_recording().unwrap();
        for chunk in chunks {
            c.handle_capture_event(CaptureEvent::Segment {
                session,
                data: Bytes::from_static(chunk),
            });
        }
        c.stop_recording();
        c.handle_capture_event(CaptureEvent::Finalized { session });
    }

    #[test]
    fn every_mode_switch_resets_derived_state() {
        let (mut c, previews) = controller();
        let modes = [
            Mode::LiveCapture,
            Mode::FileSelect,
            Mode::FileSelect,
            Mode::LiveCapture,
        ];
        for mode in modes {
            match c.mode() {
                Mode::FileSelect => {
                    let pick = c.begin_file_pick();
                    c.select_file(pick, clip());
                    let request = c.upload().unwrap();
                    c.complete_upload::<String>(request.ticket, Ok(AnalysisReport::default()));
                }
                Mode::LiveCapture => record(&mut c, &[b"webm"]),
            }
            assert!(c.artifact().is_some());

            c.set_mode(mode);
            assert_eq!(c.mode(), mode);
            assert_reset(&c);
        }
        assert_eq!(previews.live(), 0);
        assert_eq!(previews.double_releases(), 0);
    }

    #[test]
    fn file_pick_is_gated_by_mode_and_epoch() {
        let (mut c, _) = controller();
        let before_switch = c.begin_file_pick();
        c.set_mode(Mode::LiveCapture);
        let live_pick = c.begin_file_pick();
        assert!(!c.select_file(live_pick, clip()));

        c.set_mode(Mode::FileSelect);
        assert!(!c.select_file(before_switch, clip()));
        assert!(c.artifact().is_none());
        let pick = c.begin_file_pick();
        assert!(c.select_file(pick, clip()));
    }

    #[test]
    fn slow_load_of_an_older_pick_does_not_replace_newer_file() {
        let (mut c, previews) = controller();
        let big = c.begin_file_pick();
        let small = c.begin_file_pick();

        let latest = MediaArtifact::from_file("small.mp4", "video/mp4", Bytes::from_static(b"s"));
        assert!(c.select_file(small, latest));
        let late = MediaArtifact::from_file("big.mp4", "video/mp4", Bytes::from_static(b"big"));
        assert!(!c.select_file(big, late));

        assert_eq!(c.artifact().unwrap().name(), "small.mp4");
        assert_eq!(previews.created(), 1);
    }

    #[test]
    fn read_failure_is_kept_for_the_latest_pick_only() {
        let (mut c, _) = controller();
        let old = c.begin_file_pick();
        let pick = c.begin_file_pick();
        assert!(!c.file_load_failed(old, "Could not read old.mp4".into()));
        assert!(c.file_error().is_none());

        assert!(c.file_load_failed(pick, "Could not read clip.mp4".into()));
        assert_eq!(c.file_error(), Some("Could not read clip.mp4"));

        c.begin_file_pick();
        assert!(c.file_error().is_none());
        c.file_load_failed(c.latest_pick(), "Could not read again.mp4".into());
        c.set_mode(Mode::FileSelect);
        assert!(c.file_error().is_none());
    }

    #[test]
    fn recording_ignored_in_file_mode() {
        let (mut c, _) = controller();
        assert!(c.start_recording().is_none());
        assert_eq!(c.capture_phase(), CapturePhase::Idle);
        assert_eq!(c.devices.acquired(), 0);
    }

    #[test]
    fn denied_camera_is_reported_and_stays_idle() {
        let mut c = Controller::new(FakeDevices::denying("NotAllowedError"), FakePreviews::default());
        c.set_mode(Mode::LiveCapture);
        assert!(c.start_recording().is_none());

        assert_eq!(c.capture_phase(), CapturePhase::Idle);
        assert!(matches!(
            c.capture_error(),
            Some(CaptureError::MediaAccessDenied(_))
        ));
        assert!(c.artifact().is_none());
    }

    #[test]
    fn recorder_exiting_before_any_data_is_access_denied() {
        let (mut c, _) = controller();
        c.set_mode(Mode::LiveCapture);
        let session = c.start_recording().unwrap();
        c.handle_capture_event(CaptureEvent::Failed {
            session,
            reason: "/dev/video0: Device or resource busy".into(),
        });

        assert_eq!(c.capture_phase(), CapturePhase::Idle);
        assert_eq!(
            c.capture_error(),
            Some(&CaptureError::MediaAccessDenied(
                "/dev/video0: Device or resource busy".into()
            ))
        );
        assert!(c.artifact().is_none());
        assert_eq!(c.devices.stop_calls(), 1);
    }

    #[test]
    fn recording_produces_exactly_one_artifact() {
        let (mut c, previews) = controller();
        c.set_mode(Mode::LiveCapture);
        record(&mut c, &[b"seg-1|", b"seg-2"]);

        let artifact = c.artifact().unwrap();
        assert_eq!(artifact.bytes().as_ref(), b"seg-1|seg-2");
        assert_eq!(artifact.provenance(), Provenance::Recording);
        assert_eq!(c.preview().unwrap().mime, "video/webm");
        assert_eq!(previews.created(), 1);
        assert!(c
            .devices
            .track_states()
            .iter()
            .all(|s| *s == TrackState::Ended));
    }

    #[test]
    fn mode_switch_mid_recording_surfaces_nothing() {
        let (mut c, previews) = controller();
        c.set_mode(Mode::LiveCapture);
        let session = c.start_recording().unwrap();
        c.handle_capture_event(CaptureEvent::Segment {
            session,
            data: Bytes::from_static(b"partial"),
        });

        c.set_mode(Mode::LiveCapture);
        assert_eq!(c.devices.stop_calls(), 1);

        c.handle_capture_event(CaptureEvent::Finalized { session });
        assert!(c.artifact().is_none());
        assert_eq!(previews.created(), 0);
    }

    #[test]
    fn late_response_after_mode_switch_is_discarded() {
        let (mut c, _) = controller();
        let pick = c.begin_file_pick();
        c.select_file(pick, clip());
        let request = c.upload().unwrap();
        c.set_mode(Mode::LiveCapture);

        let report = AnalysisReport {
            message: None,
            feedback: vec![FeedbackEntry {
                frame: 3,
                issues: vec!["slouching".into()],
            }],
        };
        assert!(!c.complete_upload::<String>(request.ticket, Ok(report)));
        assert_eq!(c.outcome(), &UploadOutcome::Idle);
    }

    #[test]
    fn starting_a_recording_clears_previous_outcome() {
        let (mut c, _) = controller();
        c.set_mode(Mode::LiveCapture);
        c.upload();
        assert_eq!(c.outcome(), &UploadOutcome::MissingArtifact);

        c.start_recording();
        assert_eq!(c.outcome(), &UploadOutcome::Idle);
    }

    #[test]
    fn shutdown_releases_everything() {
        let (mut c, previews) = controller();
        c.set_mode(Mode::LiveCapture);
        record(&mut c, &[b"a"]);
        c.start_recording();

        c.shutdown();
        assert_eq!(previews.live(), 0);
        assert_eq!(c.devices.stop_calls(), 2);
    }
}
