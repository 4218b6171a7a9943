//! Workflow controller: owns the session and drives every transition of the
//! upload → filter → process → download flow.
//!
//! The controller is shared behind an `Arc` and every operation takes `&self`.
//! Mutable state sits behind one async mutex that is never held across a
//! suspension point (network call, surface load, dimension probe), so
//! operations interleave the way UI events do. Two generation counters
//! discard completions that a later action has superseded.

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use shared::domain::{FilterId, FilterParameter, OutputFormat};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    controls::ParameterControls,
    error::{ErrorRegion, PreconditionError, WorkflowError},
    notifier::{Notification, NotificationKind, NotificationPhase, Notifier, NotifierTimings},
    presentation::{PresentationSynchronizer, SurfaceLoad, SurfaceSource, Surfaces},
    preview,
    processed_url, retrieval_url,
    session::{CandidateFile, ProcessedResult, ProcessingOutcome, Session, WorkflowState},
    validation::ValidationRules,
    DownloadSink, ImageService, ProcessRequest, RetrievalRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HealthIndicator {
    #[default]
    Unknown,
    Online(String),
    Offline,
}

/// Keys with a workflow shortcut; everything else maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Char(char),
    Other,
}

/// Place of a pick in call order. Taken before the file is read so a slow
/// read cannot land after a newer pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Processed(ProcessedResult),
    /// The response arrived after a reset or a new selection and was ignored.
    Discarded,
}

/// Snapshot of the derived visual state. Front-ends render from this alone.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowView {
    pub state: WorkflowState,
    pub selected_filter: Option<FilterId>,
    pub filter_toolbar_visible: bool,
    pub active_parameter: Option<FilterParameter>,
    pub parameter_values: BTreeMap<FilterParameter, f64>,
    pub submit_enabled: bool,
    pub submit_busy: bool,
    pub download_visible: bool,
    pub upload_error: Option<String>,
    pub process_error: Option<String>,
    pub health: HealthIndicator,
    pub result: Option<ProcessedResult>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ErrorRegions {
    upload: Option<String>,
    process: Option<String>,
}

struct ControllerInner {
    session: Session,
    surfaces: Surfaces,
    controls: ParameterControls,
    notifier: Notifier,
    errors: ErrorRegions,
    health: HealthIndicator,
    latest_pick: u64,
    image_generation: u64,
    result_generation: u64,
    /// Result generation of the outstanding processing request.
    in_flight: Option<u64>,
}

impl ControllerInner {
    fn processing(&self) -> bool {
        self.in_flight == Some(self.result_generation)
    }

    fn notify(&mut self, message: impl Into<String>, kind: NotificationKind) {
        self.notifier.notify(message, kind, Instant::now());
    }

    fn report(&mut self, error: &WorkflowError) {
        if !error.is_reportable() {
            return;
        }
        let message = error.user_message();
        warn!(error = %error, "workflow action failed");
        match error.region() {
            ErrorRegion::Upload => self.errors.upload = Some(message.clone()),
            ErrorRegion::Process => self.errors.process = Some(message.clone()),
        }
        self.notify(message, NotificationKind::Failure);
    }

    fn fail<T>(&mut self, error: impl Into<WorkflowError>) -> Result<T, WorkflowError> {
        let error = error.into();
        self.report(&error);
        Err(error)
    }
}

pub struct WorkflowController {
    service: Arc<dyn ImageService>,
    downloads: Arc<dyn DownloadSink>,
    rules: ValidationRules,
    synchronizer: PresentationSynchronizer,
    inner: Mutex<ControllerInner>,
}

impl WorkflowController {
    pub fn new(
        service: Arc<dyn ImageService>,
        surfaces: Surfaces,
        controls: ParameterControls,
        downloads: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            service,
            downloads,
            rules: ValidationRules::default(),
            synchronizer: PresentationSynchronizer::default(),
            inner: Mutex::new(ControllerInner {
                session: Session::default(),
                surfaces,
                controls,
                notifier: Notifier::default(),
                errors: ErrorRegions::default(),
                health: HealthIndicator::Unknown,
                latest_pick: 0,
                image_generation: 0,
                result_generation: 0,
                in_flight: None,
            }),
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_notifier_timings(mut self, timings: NotifierTimings) -> Self {
        self.inner.get_mut().notifier = Notifier::new(timings);
        self
    }

    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    pub async fn state(&self) -> WorkflowState {
        let inner = self.inner.lock().await;
        inner.session.state(inner.processing())
    }

    pub async fn view(&self) -> WorkflowView {
        let inner = self.inner.lock().await;
        let session = &inner.session;
        let processing = inner.processing();
        let parameter_values = FilterParameter::ALL
            .into_iter()
            .map(|parameter| (parameter, inner.controls.get(parameter).value()))
            .collect();
        WorkflowView {
            state: session.state(processing),
            selected_filter: session.selected_filter(),
            filter_toolbar_visible: session.candidate_file().is_some(),
            active_parameter: session.selected_filter().and_then(FilterId::parameter),
            parameter_values,
            submit_enabled: session.is_ready_to_submit() && inner.in_flight.is_none(),
            submit_busy: processing,
            download_visible: session.result().is_some(),
            upload_error: inner.errors.upload.clone(),
            process_error: inner.errors.process.clone(),
            health: inner.health.clone(),
            result: session.result().cloned(),
        }
    }

    /// The visible notification, if any, with its lifecycle phase.
    pub async fn notification(&self) -> Option<(Notification, NotificationPhase)> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        inner.notifier.prune(now);
        inner
            .notifier
            .current(now)
            .map(|(notification, phase)| (notification.clone(), phase))
    }

    /// Runs `f` against the surfaces; used by front-ends and tests to read them.
    pub async fn inspect_surfaces<R>(&self, f: impl FnOnce(&Surfaces) -> R) -> R {
        let inner = self.inner.lock().await;
        f(&inner.surfaces)
    }

    pub async fn check_health(&self) -> HealthIndicator {
        let indicator = match self.service.health().await {
            Ok(health) => {
                info!(message = %health.message, "service healthy");
                HealthIndicator::Online(health.message)
            }
            Err(failure) => {
                warn!(error = %failure, "service health check failed");
                HealthIndicator::Offline
            }
        };
        self.inner.lock().await.health = indicator.clone();
        indicator
    }

    pub async fn select_image(&self, file: CandidateFile) -> Result<(), WorkflowError> {
        let ticket = self.begin_image_selection().await;
        self.select_image_for(ticket, file).await
    }

    /// Reserves the next pick. Any ticket issued earlier, or before a reset,
    /// is superseded.
    pub async fn begin_image_selection(&self) -> ImageTicket {
        let mut inner = self.inner.lock().await;
        inner.latest_pick += 1;
        ImageTicket(inner.latest_pick)
    }

    /// Selects `file` unless a later pick or a reset superseded `ticket`.
    pub async fn select_image_for(&self, ticket: ImageTicket, file: CandidateFile) -> Result<(), WorkflowError> {
        let (generation, load, probe) = {
            let mut inner = self.inner.lock().await;
            if inner.latest_pick != ticket.0 {
                debug!(ticket = ticket.0, name = file.name(), "discarding superseded pick");
                return Ok(());
            }
            let file = match self.rules.validate(file) {
                Ok(file) => file,
                Err(err) => return inner.fail(err),
            };

            inner.image_generation += 1;
            inner.result_generation += 1;
            let generation = inner.image_generation;
            info!(
                generation,
                name = file.name(),
                mime_type = file.mime_type(),
                size_bytes = file.size_bytes(),
                "image selected"
            );

            let bytes = Arc::clone(file.bytes());
            let source = SurfaceSource::Inline {
                bytes: Arc::clone(&bytes),
                mime_type: file.mime_type().to_string(),
            };
            let probe = (bytes, file.clone());
            inner.session.set_candidate_file(file);

            let surfaces = &mut inner.surfaces;
            self.synchronizer.reset(surfaces.processed.as_mut());
            surfaces.processed.clear();
            surfaces.original.set_caption(None);
            let load = surfaces.original.load(source);
            (generation, load, probe)
        };

        if let Err(reason) = await_load(load).await {
            warn!(generation, %reason, "original image failed to load");
            return Ok(());
        }
        {
            let mut inner = self.inner.lock().await;
            if inner.image_generation != generation {
                debug!(generation, "discarding superseded image load");
                return Ok(());
            }
            inner.surfaces.original.set_visible(true);
        }

        let (bytes, file) = probe;
        let dimensions = preview::probe_dimensions_async(bytes).await;
        let mut inner = self.inner.lock().await;
        if inner.image_generation != generation {
            debug!(generation, "discarding superseded dimension probe");
            return Ok(());
        }
        if let Some(dimensions) = dimensions {
            let caption = preview::original_caption(
                dimensions,
                file.size_bytes(),
                file.mime_type(),
                file.name(),
            );
            inner.surfaces.original.set_caption(Some(caption));
        }
        Ok(())
    }

    pub async fn select_filter(&self, filter: FilterId) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        if inner.session.candidate_file().is_none() {
            return inner.fail(PreconditionError::NoImage);
        }
        if inner.session.select_filter(filter) {
            inner.result_generation += 1;
            let surfaces = &mut inner.surfaces;
            self.synchronizer.reset(surfaces.processed.as_mut());
            surfaces.processed.clear();
            info!(filter = %filter, "filter selected");
        }
        Ok(())
    }

    /// Moves the slider for `parameter`. Returns the clamped value.
    pub async fn set_parameter(&self, parameter: FilterParameter, value: f64) -> Result<f64, WorkflowError> {
        let mut inner = self.inner.lock().await;
        let filter = inner.session.selected_filter();
        if !filter.is_some_and(|filter| filter.spec().declares(parameter)) {
            return inner.fail(PreconditionError::ParameterNotApplicable { parameter, filter });
        }
        let stored = inner.controls.get_mut(parameter).set_value(value);
        inner.session.record_parameter(parameter, stored);
        debug!(%parameter, value = stored, "parameter updated");
        Ok(stored)
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, WorkflowError> {
        let (request, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight.is_some() {
                debug!("submit ignored while a request is in flight");
                return Err(WorkflowError::SubmissionInFlight);
            }
            let (Some(file), Some(filter)) = (
                inner.session.candidate_file().cloned(),
                inner.session.selected_filter(),
            ) else {
                return inner.fail(PreconditionError::MissingSelection);
            };

            let parameter = filter
                .parameter()
                .map(|parameter| (parameter, inner.controls.get(parameter).value()));
            if let Some((parameter, value)) = parameter {
                inner.session.record_parameter(parameter, value);
            }

            let generation = inner.result_generation;
            inner.in_flight = Some(generation);
            (
                ProcessRequest {
                    file,
                    filter,
                    parameter,
                },
                generation,
            )
        };

        let filter = request.filter;
        info!(filter = %filter, generation, "submitting processing request");
        let outcome = ProcessingOutcome::from(self.service.process(request).await);

        let (result, load) = {
            let mut inner = self.inner.lock().await;
            inner.in_flight = None;
            if inner.result_generation != generation {
                info!(generation, "discarding processing response for a superseded selection");
                return Ok(SubmitOutcome::Discarded);
            }

            let response = match outcome {
                ProcessingOutcome::Success(response) => response,
                ProcessingOutcome::Failure(failure) => return inner.fail(failure),
            };
            let reference = match processed_url(self.service.base_url(), &response.filename) {
                Ok(reference) => reference,
                Err(failure) => return inner.fail(failure),
            };

            let result = ProcessedResult {
                reference: reference.clone(),
                filename: response.filename,
                filter_applied: response.filter,
                server_timing_ms: response.processing_time,
            };
            info!(
                filename = %result.filename,
                filter = %result.filter_applied,
                server_timing_ms = ?result.server_timing_ms,
                "image processed"
            );
            inner.session.set_result(result.clone());
            inner.notify("Image processed successfully!", NotificationKind::Success);

            let surfaces = &mut inner.surfaces;
            self.synchronizer.reset(surfaces.processed.as_mut());
            surfaces.processed.set_visible(false);
            surfaces.processed.set_caption(Some(result.caption()));
            let load = surfaces.processed.load(SurfaceSource::Remote(reference));
            (result, load)
        };

        if let Err(reason) = await_load(load).await {
            warn!(filename = %result.filename, %reason, "processed image failed to load");
            return Ok(SubmitOutcome::Processed(result));
        }

        let mut inner = self.inner.lock().await;
        if inner.session.result() != Some(&result) {
            debug!(filename = %result.filename, "result superseded before its surface loaded");
            return Ok(SubmitOutcome::Processed(result));
        }
        let surfaces = &mut inner.surfaces;
        self.synchronizer
            .synchronize(surfaces.original.as_ref(), surfaces.processed.as_mut());
        surfaces.processed.set_visible(true);
        Ok(SubmitOutcome::Processed(result))
    }

    /// Hands a retrieval request to the download sink without awaiting it.
    pub async fn download(&self, format: OutputFormat) -> Result<RetrievalRequest, WorkflowError> {
        let mut inner = self.inner.lock().await;
        let Some(result) = inner.session.result().cloned() else {
            return inner.fail(PreconditionError::NoResult);
        };

        let filter = inner
            .session
            .selected_filter()
            .map(FilterId::as_str)
            .unwrap_or(result.filter_applied.as_str());
        let request = RetrievalRequest {
            url: retrieval_url(&result.reference, format, true),
            format,
            suggested_name: format!("processed_image_{filter}.{}", format.extension()),
        };
        info!(url = %request.url, "download initiated");
        self.downloads.initiate(request.clone());
        inner.notify(format!("Downloaded as {format}!"), NotificationKind::Success);
        Ok(request)
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.session = Session::default();
        inner.errors = ErrorRegions::default();
        inner.latest_pick += 1;
        inner.image_generation += 1;
        inner.result_generation += 1;

        let surfaces = &mut inner.surfaces;
        self.synchronizer.reset(surfaces.processed.as_mut());
        surfaces.processed.clear();
        surfaces.original.clear();

        inner.notify("Interface reset!", NotificationKind::Success);
        info!("workflow reset");
    }

    pub async fn handle_key(&self, key: Key) -> Result<(), WorkflowError> {
        match key {
            Key::Escape => {
                self.reset().await;
                Ok(())
            }
            Key::Enter => {
                if !self.inner.lock().await.session.is_ready_to_submit() {
                    return Ok(());
                }
                self.submit().await.map(|_| ())
            }
            Key::Char(digit) => {
                let Some(filter) = FilterId::from_shortcut(digit) else {
                    return Ok(());
                };
                if self.inner.lock().await.session.candidate_file().is_none() {
                    return Ok(());
                }
                self.select_filter(filter).await
            }
            Key::Other => Ok(()),
        }
    }
}

async fn await_load(load: SurfaceLoad) -> Result<(), String> {
    match load.await {
        Ok(result) => result,
        Err(_) => Err("surface dropped before its load event".to_string()),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
