//! UI layer for desktop GUI: app shell and image surfaces.

pub mod app;
pub mod surface;

pub use app::VisionDesktopApp;
