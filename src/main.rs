mod analysis;
mod app;
mod config;
mod engine;
mod preview;
mod recorder;
mod ui;

use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;

use app::{AppState, BackendEvent};
use engine::CaptureEvent;

fn main() {
    env_logger::init();
    log::info!("Posture Check starting");

    let application = libadwaita::Application::builder()
        .application_id("io.github.posture_check.PostureCheck")
        .build();

    application.connect_activate(on_activate);
    application.run();
}

fn on_activate(app: &libadwaita::Application) {
    // Create async channels for backend → UI communication
    let (backend_tx, backend_rx) = async_channel::unbounded::<BackendEvent>();
    let (capture_tx, capture_rx) = async_channel::unbounded::<CaptureEvent>();

    let state = match AppState::new(backend_tx.clone(), capture_tx) {
        Ok(state) => Rc::new(RefCell::new(state)),
        Err(e) => {
            log::error!("Failed to initialise: {e}");
            app.quit();
            return;
        }
    };

    // Build UI
    let window = ui::window::build_window(
        app,
        &state.borrow().config.service_url,
        backend_tx.clone(),
    );
    state.borrow_mut().window = Some(window);
    app::refresh(&state);

    if let Some(ref window) = state.borrow().window {
        window.window.present();
    }

    // Forward recorder output to backend event channel
    {
        let sender = backend_tx.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = capture_rx.recv().await {
                let _ = sender.send(BackendEvent::Capture(event)).await;
            }
        });
    }

    // Attach backend event handler
    {
        let state_clone = state.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = backend_rx.recv().await {
                app::handle_backend_event(&state_clone, event);
            }
        });
    }

    // Release the camera and preview files on exit
    {
        let state_clone = state.clone();
        app.connect_shutdown(move |_| {
            log::info!("Shutting down");
            state_clone.borrow_mut().controller.shutdown();
        });
    }

    app::dispatch_service_check(&state);
}
