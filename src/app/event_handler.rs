use std::cell::RefCell;
use std::rc::Rc;

use super::pipeline::{dispatch_file_load, dispatch_service_check, dispatch_upload};
use super::recording::{start_recording, stop_live_view, stop_recording, update_live_view};
use super::state::{refresh, AppState, BackendEvent};
use crate::engine::{CaptureEvent, CapturePhase};

/// Handle a backend event. This is the core state machine.
pub fn handle_backend_event(state: &Rc<RefCell<AppState>>, event: BackendEvent) {
    match event {
        BackendEvent::ModeSelected(mode) => {
            stop_live_view(state);
            state.borrow_mut().controller.set_mode(mode);
        }
        BackendEvent::FileChosen(path) => {
            log::info!("File chosen: {}", path.display());
            dispatch_file_load(state, path);
        }
        BackendEvent::FileLoaded { pick, result } => {
            let mut s = state.borrow_mut();
            let applied = match result {
                Ok(artifact) => s.controller.select_file(pick, artifact),
                Err(reason) => s.controller.file_load_failed(pick, reason),
            };
            drop(s);
            if !applied {
                return;
            }
        }
        BackendEvent::StartRecording => start_recording(state),
        BackendEvent::StopRecording => stop_recording(state),
        BackendEvent::Capture(event) => {
            let is_segment = matches!(event, CaptureEvent::Segment { .. });
            state.borrow_mut().controller.handle_capture_event(event);
            if is_segment {
                return;
            }
            if state.borrow().controller.capture_phase() == CapturePhase::Idle {
                stop_live_view(state);
            }
        }
        BackendEvent::UploadRequested => {
            let request = state.borrow_mut().controller.upload();
            if let Some(request) = request {
                dispatch_upload(state, request);
            }
        }
        BackendEvent::UploadComplete { ticket, result } => {
            let applied = state
                .borrow_mut()
                .controller
                .complete_upload(ticket, result);
            if !applied {
                return;
            }
        }
        BackendEvent::LivePreviewTick => {
            update_live_view(state);
            return;
        }
        BackendEvent::ServiceUrlChanged(url) => {
            {
                let mut s = state.borrow_mut();
                s.config.service_url = url.trim().to_string();
                if let Err(e) = s.config.save() {
                    log::warn!("Failed to save config: {e}");
                }
                log::info!("Service URL set to {}", s.config.service_url);
            }
            dispatch_service_check(state);
            return;
        }
        BackendEvent::ServiceChecked(result) => {
            let online = match result {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Service check failed: {e}");
                    false
                }
            };
            if let Some(ref window) = state.borrow().window {
                crate::ui::window::show_service_status(window, online);
            }
            return;
        }
    }
    refresh(state);
}
