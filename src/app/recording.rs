use std::cell::RefCell;
use std::rc::Rc;

use gtk4::glib;

use super::state::{AppState, BackendEvent};

/// Start recording from the webcam and begin polling the live view.
pub fn start_recording(state: &Rc<RefCell<AppState>>) {
    let started = state.borrow_mut().controller.start_recording();
    if let Some(session) = started {
        log::info!("Live view on for {session}");
        start_live_view(state);
    }
}

/// Ask the recorder to finish; the artifact arrives later as a capture event.
pub fn stop_recording(state: &Rc<RefCell<AppState>>) {
    state.borrow_mut().controller.stop_recording();
    stop_live_view(state);
}

// ~5fps, matching the snapshot rate the recorder writes.
fn start_live_view(state: &Rc<RefCell<AppState>>) {
    stop_live_view(state);
    let sender = state.borrow().backend_sender.clone();
    let source = glib::timeout_add_local(std::time::Duration::from_millis(200), move || {
        let _ = sender.try_send(BackendEvent::LivePreviewTick);
        glib::ControlFlow::Continue
    });
    state.borrow_mut().live_tick_source = Some(source);
}

/// Cancel the live view timer and blank the live picture.
pub fn stop_live_view(state: &Rc<RefCell<AppState>>) {
    let mut s = state.borrow_mut();
    if let Some(source) = s.live_tick_source.take() {
        source.remove();
    }
    if let Some(ref window) = s.window {
        crate::ui::window::show_live_frame(window, None);
    }
}

/// Show the newest snapshot written by the recorder.
pub fn update_live_view(state: &Rc<RefCell<AppState>>) {
    let s = state.borrow();
    if let (Some(path), Some(window)) = (s.controller.live_preview(), &s.window) {
        crate::ui::window::show_live_frame(window, Some(path.as_path()));
    }
}
