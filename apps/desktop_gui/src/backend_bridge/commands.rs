//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

use client_core::Key;
use shared::domain::{FilterId, FilterParameter, OutputFormat};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    CheckHealth,
    SelectImage { path: PathBuf },
    SelectFilter(FilterId),
    SetParameter { parameter: FilterParameter, value: f64 },
    Submit,
    Download { format: OutputFormat },
    Reset,
    Key(Key),
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::CheckHealth => "check_health",
            BackendCommand::SelectImage { .. } => "select_image",
            BackendCommand::SelectFilter(_) => "select_filter",
            BackendCommand::SetParameter { .. } => "set_parameter",
            BackendCommand::Submit => "submit",
            BackendCommand::Download { .. } => "download",
            BackendCommand::Reset => "reset",
            BackendCommand::Key(_) => "key",
        }
    }

    /// Commands that may wait on the network or a surface load run as their
    /// own task so later commands are not queued behind them.
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            BackendCommand::CheckHealth
                | BackendCommand::SelectImage { .. }
                | BackendCommand::Submit
                | BackendCommand::Key(Key::Enter)
        )
    }
}
