use std::{collections::BTreeMap, fmt, io, path::Path, sync::Arc};

use shared::{
    domain::{FilterId, FilterParameter},
    protocol::ProcessResponse,
};
use url::Url;

use crate::{error::ServiceFailure, validation::FileInfo};

/// An image picked by the user, bytes included.
#[derive(Clone, PartialEq, Eq)]
pub struct CandidateFile {
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads `path` and guesses the media type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for CandidateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl FileInfo for CandidateFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size_bytes(&self) -> u64 {
        CandidateFile::size_bytes(self)
    }
}

/// The last successfully produced output and its derived metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedResult {
    pub reference: Url,
    pub filename: String,
    pub filter_applied: String,
    pub server_timing_ms: Option<f64>,
}

impl ProcessedResult {
    pub fn caption(&self) -> String {
        match self.server_timing_ms {
            Some(ms) => format!("Filter: {} • {ms} ms", self.filter_applied),
            None => format!("Filter: {}", self.filter_applied),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Success(ProcessResponse),
    Failure(ServiceFailure),
}

impl From<Result<ProcessResponse, ServiceFailure>> for ProcessingOutcome {
    fn from(result: Result<ProcessResponse, ServiceFailure>) -> Self {
        match result {
            Ok(response) => ProcessingOutcome::Success(response),
            Err(failure) => ProcessingOutcome::Failure(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowState {
    Empty,
    HasImage,
    FilterSelected,
    Processing,
    Processed,
}

/// Upload/filter/result record. Only the controller mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    candidate_file: Option<CandidateFile>,
    selected_filter: Option<FilterId>,
    filter_parameters: BTreeMap<FilterParameter, f64>,
    result: Option<ProcessedResult>,
}

impl Session {
    pub fn candidate_file(&self) -> Option<&CandidateFile> {
        self.candidate_file.as_ref()
    }

    pub fn selected_filter(&self) -> Option<FilterId> {
        self.selected_filter
    }

    pub fn filter_parameters(&self) -> &BTreeMap<FilterParameter, f64> {
        &self.filter_parameters
    }

    pub fn result(&self) -> Option<&ProcessedResult> {
        self.result.as_ref()
    }

    pub fn is_ready_to_submit(&self) -> bool {
        self.candidate_file.is_some() && self.selected_filter.is_some()
    }

    pub fn state(&self, processing: bool) -> WorkflowState {
        match (&self.candidate_file, self.selected_filter, &self.result) {
            (None, _, _) => WorkflowState::Empty,
            (Some(_), None, _) => WorkflowState::HasImage,
            (Some(_), Some(_), _) if processing => WorkflowState::Processing,
            (Some(_), Some(_), Some(_)) => WorkflowState::Processed,
            (Some(_), Some(_), None) => WorkflowState::FilterSelected,
        }
    }

    pub(crate) fn set_candidate_file(&mut self, file: CandidateFile) {
        self.candidate_file = Some(file);
        self.result = None;
    }

    /// Returns `true` when the selection changed.
    pub(crate) fn select_filter(&mut self, filter: FilterId) -> bool {
        if self.selected_filter == Some(filter) {
            return false;
        }
        let spec = filter.spec();
        self.filter_parameters
            .retain(|parameter, _| spec.declares(*parameter));
        self.selected_filter = Some(filter);
        self.result = None;
        true
    }

    pub(crate) fn record_parameter(&mut self, parameter: FilterParameter, value: f64) {
        self.filter_parameters.insert(parameter, value);
    }

    pub(crate) fn set_result(&mut self, result: ProcessedResult) {
        self.result = Some(result);
    }
}
