mod backend_bridge;
mod controller;
mod ui;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use client_core::{logging, settings::DEFAULT_SETTINGS_FILE, ClientSettings};
use crossbeam_channel::bounded;
use eframe::egui;

use crate::{
    backend_bridge::{
        commands::BackendCommand,
        runtime::{launch, BackendConfig, SurfaceFrames},
    },
    controller::events::UiEvent,
    ui::{surface::shared_frame, VisionDesktopApp},
};

#[derive(Parser, Debug)]
#[command(name = "vision-desktop", about = "Desktop client for the vision processing service")]
struct Args {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_base: Option<String>,
    /// Where downloads are written.
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut settings = ClientSettings::load(&args.config)?;
    if let Some(api_base) = args.api_base {
        settings.api_base = api_base;
    }
    if let Some(download_dir) = args.download_dir {
        settings.download_dir = download_dir;
    }
    logging::init(&settings.log_filter);

    let config = BackendConfig {
        api_base: settings.api_base_url()?,
        download_dir: settings.download_dir,
    };
    let (original, processed) = (shared_frame(), shared_frame());
    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    launch(
        config,
        SurfaceFrames {
            original: original.clone(),
            processed: processed.clone(),
        },
        cmd_rx,
        ui_tx,
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Vision Image Processor")
            .with_inner_size([760.0, 900.0])
            .with_min_inner_size([560.0, 640.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    eframe::run_native(
        "Vision Image Processor",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(VisionDesktopApp::new(
                cmd_tx, ui_rx, original, processed,
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("{err}"))
    .context("desktop UI exited with an error")
}
