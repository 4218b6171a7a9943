//! Backend worker: owns the tokio runtime and the workflow controller, and
//! turns queued UI commands into controller calls.

use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use client_core::{
    CandidateFile, DownloadSink, ImageTicket, ParameterControls, RetrievalRequest, Surfaces,
    VisionClient, WorkflowController,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use url::Url;

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::events::{status_for_failure, UiEvent},
    ui::surface::{EguiSurface, SharedFrame},
};

const VIEW_REFRESH: Duration = Duration::from_millis(200);

pub struct BackendConfig {
    pub api_base: Url,
    pub download_dir: PathBuf,
}

pub struct SurfaceFrames {
    pub original: SharedFrame,
    pub processed: SharedFrame,
}

/// Saves processed images into the download directory and reports the path.
struct DirectoryDownloadSink {
    client: VisionClient,
    download_dir: PathBuf,
    ui_tx: Sender<UiEvent>,
}

impl DownloadSink for DirectoryDownloadSink {
    fn initiate(&self, request: RetrievalRequest) {
        let client = self.client.clone();
        let path = self.download_dir.join(&request.suggested_name);
        let ui_tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let saved = async {
                let bytes = client.fetch(&request.url).await?;
                tokio::fs::create_dir_all(path.parent().unwrap_or(&path)).await?;
                tokio::fs::write(&path, bytes).await?;
                anyhow::Ok(())
            }
            .await;
            let event = match saved {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "saved processed image");
                    UiEvent::Info(format!("Saved {}", path.display()))
                }
                Err(err) => {
                    tracing::warn!(url = %request.url, error = %err, "download failed");
                    UiEvent::Error(format!("Failed to save {}: {err}", request.suggested_name))
                }
            };
            let _ = ui_tx.try_send(event);
        });
    }
}

pub fn launch(
    config: BackendConfig,
    frames: SurfaceFrames,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(format!(
                    "backend worker startup failure: failed to build runtime: {err}"
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };
        let handle = runtime.handle().clone();

        runtime.block_on(async move {
            let client = VisionClient::new(config.api_base);
            let surfaces = Surfaces::new(
                EguiSurface::new(frames.original, client.clone(), handle.clone()),
                EguiSurface::new(frames.processed, client.clone(), handle),
            );
            let downloads = Arc::new(DirectoryDownloadSink {
                client: client.clone(),
                download_dir: config.download_dir,
                ui_tx: ui_tx.clone(),
            });
            let controller = Arc::new(WorkflowController::new(
                Arc::new(client),
                surfaces,
                ParameterControls::sliders(),
                downloads,
            ));
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            tokio::spawn(refresh_views(Arc::clone(&controller), ui_tx.clone()));
            spawn_command(&controller, BackendCommand::CheckHealth, None, &ui_tx);

            while let Ok(cmd) = cmd_rx.recv() {
                // Picks are ordered here, before their file reads race each other.
                let ticket = match cmd {
                    BackendCommand::SelectImage { .. } => {
                        Some(controller.begin_image_selection().await)
                    }
                    _ => None,
                };
                if cmd.is_long_running() {
                    spawn_command(&controller, cmd, ticket, &ui_tx);
                } else {
                    run_command(&controller, cmd, ticket, &ui_tx).await;
                }
            }
            tracing::info!("ui command channel closed; backend worker exiting");
        });
    });
}

fn spawn_command(
    controller: &Arc<WorkflowController>,
    cmd: BackendCommand,
    ticket: Option<ImageTicket>,
    ui_tx: &Sender<UiEvent>,
) {
    let controller = Arc::clone(controller);
    let ui_tx = ui_tx.clone();
    tokio::spawn(async move {
        run_command(&controller, cmd, ticket, &ui_tx).await;
    });
}

async fn run_command(
    controller: &WorkflowController,
    cmd: BackendCommand,
    ticket: Option<ImageTicket>,
    ui_tx: &Sender<UiEvent>,
) {
    let name = cmd.name();
    if let Err(err) = execute(controller, cmd, ticket).await {
        tracing::debug!(command = name, error = %err, "command failed");
        if let Some(status) = status_for_failure(&err) {
            let _ = ui_tx.try_send(UiEvent::Error(status));
        }
    }
    publish(controller, ui_tx).await;
}

async fn execute(
    controller: &WorkflowController,
    cmd: BackendCommand,
    ticket: Option<ImageTicket>,
) -> Result<()> {
    match cmd {
        BackendCommand::CheckHealth => {
            controller.check_health().await;
        }
        BackendCommand::SelectImage { path } => {
            let ticket = match ticket {
                Some(ticket) => ticket,
                None => controller.begin_image_selection().await,
            };
            let file = CandidateFile::from_path(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            controller.select_image_for(ticket, file).await?;
        }
        BackendCommand::SelectFilter(filter) => controller.select_filter(filter).await?,
        BackendCommand::SetParameter { parameter, value } => {
            controller.set_parameter(parameter, value).await?;
        }
        BackendCommand::Submit => {
            controller.submit().await?;
        }
        BackendCommand::Download { format } => {
            controller.download(format).await?;
        }
        BackendCommand::Reset => controller.reset().await,
        BackendCommand::Key(key) => controller.handle_key(key).await?,
    }
    Ok(())
}

/// Returns `false` once the UI side is gone.
async fn publish(controller: &WorkflowController, ui_tx: &Sender<UiEvent>) -> bool {
    let view = controller.view().await;
    let notification = controller
        .notification()
        .await
        .map(|(notification, _)| notification);
    !matches!(
        ui_tx.try_send(UiEvent::ViewChanged {
            view: Box::new(view),
            notification,
        }),
        Err(TrySendError::Disconnected(_))
    )
}

/// Publishes state changes that happen between commands, such as a request
/// entering flight or a surface finishing its load.
async fn refresh_views(controller: Arc<WorkflowController>, ui_tx: Sender<UiEvent>) {
    let mut ticker = tokio::time::interval(VIEW_REFRESH);
    let mut last = None;
    loop {
        ticker.tick().await;
        let view = controller.view().await;
        if last.as_ref() == Some(&view) {
            continue;
        }
        last = Some(view);
        if !publish(&controller, &ui_tx).await {
            break;
        }
    }
}
