use std::fmt;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{FilterId, FilterParameter, OutputFormat},
    error::ApiError,
    protocol::{FiltersResponse, HealthResponse, ProcessResponse, StatsResponse},
};
use tracing::{debug, info, warn};
use url::Url;

pub mod controller;
pub mod controls;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod presentation;
pub mod preview;
pub mod session;
pub mod settings;
pub mod validation;

pub use controller::{HealthIndicator, ImageTicket, Key, SubmitOutcome, WorkflowController, WorkflowView};
pub use controls::{ParameterControl, ParameterControls, SliderControl};
pub use error::{ErrorRegion, PreconditionError, ServiceFailure, ValidationError, WorkflowError};
pub use notifier::{Notification, NotificationKind, NotificationPhase, Notifier, NotifierTimings};
pub use presentation::{
    HeadlessSurface, PresentationSynchronizer, StyleProperty, Surface, SurfaceLoad, SurfaceSource,
    Surfaces, SYNCED_PROPERTIES,
};
pub use session::{CandidateFile, ProcessedResult, ProcessingOutcome, Session, WorkflowState};
pub use settings::ClientSettings;
pub use validation::{validate, FileDescriptor, FileInfo, ValidationRules};

const PROCESS_FALLBACK_MESSAGE: &str = "Processing failed";
const HEALTH_FALLBACK_MESSAGE: &str = "Server health check failed";
const RETRIEVAL_FALLBACK_MESSAGE: &str = "Failed to serve image";

/// Payload of one `POST /process` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRequest {
    pub file: CandidateFile,
    pub filter: FilterId,
    /// Present only for parameterized filters.
    pub parameter: Option<(FilterParameter, f64)>,
}

impl ProcessRequest {
    /// Text fields of the multipart body, image part excluded.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("filter", self.filter.as_str().to_string())];
        if let Some((parameter, value)) = self.parameter {
            fields.push((parameter.form_field(), value.to_string()));
        }
        fields
    }
}

/// A `GET /processed/{filename}` request built by a download action.
#[derive(Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub url: Url,
    pub format: OutputFormat,
    pub suggested_name: String,
}

impl fmt::Debug for RetrievalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalRequest")
            .field("url", &self.url.as_str())
            .field("format", &self.format)
            .field("suggested_name", &self.suggested_name)
            .finish()
    }
}

/// Receives retrieval requests; must return without waiting on the transfer.
pub trait DownloadSink: Send + Sync {
    fn initiate(&self, request: RetrievalRequest);
}

/// The remote image-processing service.
#[async_trait]
pub trait ImageService: Send + Sync {
    fn base_url(&self) -> &Url;
    async fn health(&self) -> Result<HealthResponse, ServiceFailure>;
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, ServiceFailure>;
}

/// `{base}/processed/{filename}` with the filename as a single escaped segment.
pub fn processed_url(base: &Url, filename: &str) -> Result<Url, ServiceFailure> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| ServiceFailure::Transport(format!("api base {base} cannot carry a path")))?
        .pop_if_empty()
        .push("processed")
        .push(filename);
    Ok(url)
}

/// Adds `format` and `download` query parameters to a result reference.
pub fn retrieval_url(reference: &Url, format: OutputFormat, download: bool) -> Url {
    let mut url = reference.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("format", format.as_query())
        .append_pair("download", if download { "true" } else { "false" });
    url
}

#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    base_url: Url,
}

impl VisionClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_http_client(Client::new(), base_url)
    }

    pub fn with_http_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceFailure> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| {
                ServiceFailure::Transport(format!("api base {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .push(path);
        Ok(url)
    }

    pub async fn filters(&self) -> Result<FiltersResponse, ServiceFailure> {
        let response = self.http.get(self.endpoint("filters")?).send().await?;
        decode(response, "Failed to get filters").await
    }

    pub async fn stats(&self) -> Result<StatsResponse, ServiceFailure> {
        let response = self.http.get(self.endpoint("stats")?).send().await?;
        decode(response, "Failed to get stats").await
    }

    /// Downloads the bytes behind a retrieval request.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, ServiceFailure> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_failure(response, RETRIEVAL_FALLBACK_MESSAGE).await);
        }
        let bytes = response.bytes().await?;
        debug!(url = %url, len = bytes.len(), "fetched processed image");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageService for VisionClient {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn health(&self) -> Result<HealthResponse, ServiceFailure> {
        let response = self.http.get(self.endpoint("health")?).send().await?;
        decode(response, HEALTH_FALLBACK_MESSAGE).await
    }

    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, ServiceFailure> {
        let mut image = Part::bytes(request.file.bytes().to_vec())
            .file_name(request.file.name().to_string());
        if !request.file.mime_type().is_empty() {
            image = match image.mime_str(request.file.mime_type()) {
                Ok(part) => part,
                Err(err) => {
                    warn!(mime_type = request.file.mime_type(), error = %err, "ignoring unparsable media type");
                    Part::bytes(request.file.bytes().to_vec())
                        .file_name(request.file.name().to_string())
                }
            };
        }

        let mut form = Form::new().part("image", image);
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }

        info!(
            filter = %request.filter,
            file = request.file.name(),
            size_bytes = request.file.size_bytes(),
            "posting image for processing"
        );
        let response = self
            .http
            .post(self.endpoint("process")?)
            .multipart(form)
            .send()
            .await?;
        decode(response, PROCESS_FALLBACK_MESSAGE).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, ServiceFailure> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_failure(response, fallback).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ServiceFailure::Transport(format!("invalid response body: {err}")))
}

async fn status_failure(response: Response, fallback: &str) -> ServiceFailure {
    let status = response.status();
    let message = response
        .json::<ApiError>()
        .await
        .ok()
        .and_then(|body| body.message().map(str::to_string))
        .unwrap_or_else(|| fallback.to_string());
    warn!(status = status.as_u16(), %message, "service returned an error status");
    ServiceFailure::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
