pub mod feedback;
pub mod window;
