mod event_handler;
mod pipeline;
mod recording;
mod state;

pub use event_handler::handle_backend_event;
pub use pipeline::dispatch_service_check;
pub use state::{refresh, AppState, BackendEvent};
