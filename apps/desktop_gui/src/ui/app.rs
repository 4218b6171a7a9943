use std::{collections::BTreeMap, path::PathBuf, time::Instant};

use client_core::{
    HealthIndicator, Key, Notification, NotificationKind, NotificationPhase, NotifierTimings,
    SliderControl, WorkflowView,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::{FilterId, FilterParameter, OutputFormat};

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::{events::UiEvent, orchestration::dispatch_backend_command},
    ui::surface::{SharedFrame, SurfaceView},
};

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];
const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 53, 69);
const SUCCESS_COLOR: egui::Color32 = egui::Color32::from_rgb(40, 167, 69);

pub fn map_key(key: egui::Key) -> Option<Key> {
    match key {
        egui::Key::Escape => Some(Key::Escape),
        egui::Key::Enter => Some(Key::Enter),
        egui::Key::Num1 => Some(Key::Char('1')),
        egui::Key::Num2 => Some(Key::Char('2')),
        egui::Key::Num3 => Some(Key::Char('3')),
        egui::Key::Num4 => Some(Key::Char('4')),
        egui::Key::Num5 => Some(Key::Char('5')),
        _ => None,
    }
}

/// Toast opacity at `now`; entry and exit fade linearly.
pub fn toast_opacity(notification: &Notification, now: Instant, timings: &NotifierTimings) -> f32 {
    let elapsed = now.saturating_duration_since(notification.created_at);
    match notification.phase_at(now, timings) {
        Some(NotificationPhase::Entering) => {
            (elapsed.as_secs_f32() / timings.entry_delay.as_secs_f32()).clamp(0.0, 1.0)
        }
        Some(NotificationPhase::Visible) => 1.0,
        Some(NotificationPhase::Exiting) => {
            let into_exit = elapsed.saturating_sub(timings.display_duration);
            1.0 - (into_exit.as_secs_f32() / timings.exit_delay.as_secs_f32()).clamp(0.0, 1.0)
        }
        None => 0.0,
    }
}

/// Copies slider values from a backend snapshot, except for edits the
/// backend has not echoed back yet. Edits drop out once echoed or once their
/// parameter is no longer active.
fn merge_slider_values(
    local: &mut BTreeMap<FilterParameter, f64>,
    pending: &mut BTreeMap<FilterParameter, f64>,
    view: &WorkflowView,
) {
    pending.retain(|parameter, sent| {
        let echoed = view
            .parameter_values
            .get(parameter)
            .is_some_and(|value| (value - *sent).abs() < 1e-6);
        view.active_parameter == Some(*parameter) && !echoed
    });
    for (parameter, value) in &view.parameter_values {
        if !pending.contains_key(parameter) {
            local.insert(*parameter, *value);
        }
    }
}

pub struct VisionDesktopApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    view: Option<WorkflowView>,
    notification: Option<Notification>,
    timings: NotifierTimings,
    slider_values: BTreeMap<FilterParameter, f64>,
    pending_edits: BTreeMap<FilterParameter, f64>,
    format: OutputFormat,
    original: SurfaceView,
    processed: SurfaceView,
    status: String,
}

impl VisionDesktopApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        original: SharedFrame,
        processed: SharedFrame,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            view: None,
            notification: None,
            timings: NotifierTimings::default(),
            slider_values: FilterParameter::ALL
                .into_iter()
                .map(|parameter| (parameter, parameter.default_value()))
                .collect(),
            pending_edits: BTreeMap::new(),
            format: OutputFormat::default(),
            original: SurfaceView::new("original", original),
            processed: SurfaceView::new("processed", processed),
            status: String::new(),
        }
    }

    fn dispatch(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::ViewChanged { view, notification } => {
                    merge_slider_values(&mut self.slider_values, &mut self.pending_edits, &view);
                    if notification.is_some() {
                        self.notification = notification;
                    }
                    self.view = Some(*view);
                }
                UiEvent::Info(message) => self.status = message,
                UiEvent::Error(message) => {
                    tracing::warn!(%message, "backend reported an error");
                    self.status = message;
                }
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let keys: Vec<Key> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed: true,
                        repeat: false,
                        ..
                    } => map_key(*key),
                    _ => None,
                })
                .collect()
        });
        for key in keys {
            self.dispatch(BackendCommand::Key(key));
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Option<PathBuf> =
            ctx.input(|i| i.raw.dropped_files.iter().find_map(|file| file.path.clone()));
        if let Some(path) = dropped {
            self.dispatch(BackendCommand::SelectImage { path });
        }
    }

    fn pick_image(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &IMAGE_EXTENSIONS)
            .pick_file()
        {
            self.dispatch(BackendCommand::SelectImage { path });
        }
    }

    fn show_header(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Vision Image Processor");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let health = self.view.as_ref().map(|view| view.health.clone());
                match health.unwrap_or_default() {
                    HealthIndicator::Online(message) => {
                        ui.colored_label(SUCCESS_COLOR, format!("● {message}"));
                    }
                    HealthIndicator::Offline => {
                        ui.colored_label(ERROR_COLOR, "● API Offline");
                    }
                    HealthIndicator::Unknown => {
                        ui.weak("● Checking API…");
                    }
                }
                if ui.small_button("Recheck").clicked() {
                    self.dispatch(BackendCommand::CheckHealth);
                }
            });
        });
    }

    fn show_upload(&mut self, ui: &mut egui::Ui, view: &WorkflowView) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                if ui.button("Choose image…").clicked() {
                    self.pick_image();
                }
                ui.weak("or drop a file onto the window");
            });
            if let Some(error) = &view.upload_error {
                ui.colored_label(ERROR_COLOR, error);
            }
            self.original.show(ui);
        });
    }

    fn show_filters(&mut self, ui: &mut egui::Ui, view: &WorkflowView) {
        if !view.filter_toolbar_visible {
            return;
        }
        ui.horizontal_wrapped(|ui| {
            for (index, filter) in FilterId::ALL.into_iter().enumerate() {
                let selected = view.selected_filter == Some(filter);
                let text = format!("{} {}", index + 1, filter.label());
                if ui.selectable_label(selected, text).clicked() {
                    self.dispatch(BackendCommand::SelectFilter(filter));
                }
            }
        });

        if let Some(parameter) = view.active_parameter {
            let control = SliderControl::for_parameter(parameter);
            let value = self
                .slider_values
                .entry(parameter)
                .or_insert(parameter.default_value());
            let response = ui.add(
                egui::Slider::new(value, control.range().clone())
                    .step_by(control.step())
                    .fixed_decimals(1)
                    .text(parameter.label()),
            );
            if response.changed() {
                let value = *value;
                self.pending_edits.insert(parameter, value);
                self.dispatch(BackendCommand::SetParameter { parameter, value });
            }
        }
    }

    fn show_process(&mut self, ui: &mut egui::Ui, view: &WorkflowView) {
        ui.horizontal(|ui| {
            let label = if view.submit_busy {
                "Processing…"
            } else {
                "Process Image"
            };
            if ui
                .add_enabled(view.submit_enabled, egui::Button::new(label))
                .clicked()
            {
                self.dispatch(BackendCommand::Submit);
            }
            if view.submit_busy {
                ui.add(egui::Spinner::new());
            }
            if ui.button("Reset").clicked() {
                self.dispatch(BackendCommand::Reset);
            }
        });
        if let Some(error) = &view.process_error {
            ui.colored_label(ERROR_COLOR, error);
        }
    }

    fn show_result(&mut self, ui: &mut egui::Ui, view: &WorkflowView) {
        self.processed.show(ui);
        if !view.download_visible {
            return;
        }
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("download_format")
                .selected_text(self.format.as_query())
                .show_ui(ui, |ui| {
                    for format in OutputFormat::ALL {
                        ui.selectable_value(&mut self.format, format, format.as_query());
                    }
                });
            if ui.button("Download").clicked() {
                let format = self.format;
                self.dispatch(BackendCommand::Download { format });
            }
        });
    }

    fn show_toast(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        let Some(notification) = &self.notification else {
            return;
        };
        if notification.phase_at(now, &self.timings).is_none() {
            self.notification = None;
            return;
        }
        let opacity = toast_opacity(notification, now, &self.timings);
        let fill = match notification.kind {
            NotificationKind::Success => SUCCESS_COLOR,
            NotificationKind::Failure => ERROR_COLOR,
        };
        egui::Area::new(egui::Id::new("workflow_toast"))
            .order(egui::Order::Foreground)
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-16.0, 16.0))
            .show(ctx, |ui| {
                ui.set_opacity(opacity);
                egui::Frame::new()
                    .fill(fill)
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::symmetric(12, 8))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(&notification.message).color(egui::Color32::WHITE),
                        );
                    });
            });
    }
}

impl eframe::App for VisionDesktopApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.handle_shortcuts(ctx);
        self.handle_dropped_files(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| self.show_header(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.weak(&self.status);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(view) = self.view.clone() else {
                ui.centered_and_justified(|ui| ui.spinner());
                return;
            };
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.show_upload(ui, &view);
                ui.add_space(8.0);
                self.show_filters(ui, &view);
                ui.add_space(8.0);
                self.show_process(ui, &view);
                ui.add_space(8.0);
                self.show_result(ui, &view);
            });
        });
        self.show_toast(ctx);

        let animating = self.notification.is_some()
            || self.view.as_ref().is_some_and(|view| view.submit_busy);
        if animating {
            ctx.request_repaint_after(std::time::Duration::from_millis(16));
        } else {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}
