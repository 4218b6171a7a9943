//! Events sent from the backend worker to the UI thread.

use client_core::{Notification, WorkflowError, WorkflowView};

pub enum UiEvent {
    /// Fresh snapshot after a command ran.
    ViewChanged {
        view: Box<WorkflowView>,
        notification: Option<Notification>,
    },
    Info(String),
    Error(String),
}

/// Status line text for a failed command. Workflow errors are already shown
/// in their inline region, so only the others reach the status line.
pub fn status_for_failure(error: &anyhow::Error) -> Option<String> {
    match error.downcast_ref::<WorkflowError>() {
        Some(_) => None,
        None => Some(format!("{error:#}")),
    }
}
