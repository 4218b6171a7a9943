//! Bridge between the UI thread and the backend worker's tokio runtime.

pub mod commands;
pub mod runtime;
