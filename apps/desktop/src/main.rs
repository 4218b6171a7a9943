mod download;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    logging, settings::DEFAULT_SETTINGS_FILE, CandidateFile, ClientSettings, HealthIndicator, ImageService,
    ParameterControls, SubmitOutcome, Surfaces, VisionClient, WorkflowController,
};
use shared::domain::{FilterId, OutputFormat};
use tracing::info;

use crate::download::FileDownloadSink;

#[derive(Parser, Debug)]
#[command(name = "vision-cli", about = "Run images through the vision processing service")]
struct Args {
    /// Settings file; missing files are ignored.
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query `/health`.
    Health,
    /// List the service's filter catalog.
    Filters,
    /// Show stored file counts and disk use.
    Stats,
    /// Upload one image, apply a filter and download the result.
    Process {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        filter: FilterId,
        /// Value for the filter's numeric parameter, if it has one.
        #[arg(long)]
        param: Option<f64>,
        #[arg(long, default_value = "jpeg")]
        format: OutputFormat,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = ClientSettings::load(&args.config)?;
    if let Some(api_base) = args.api_base {
        settings.api_base = api_base;
    }
    logging::init(&settings.log_filter);

    let client = VisionClient::new(settings.api_base_url()?);
    match args.command {
        Command::Health => {
            let health = client.health().await.context("health check failed")?;
            println!("{}", health.message);
            if let Some(count) = health.available_filters {
                println!("available filters: {count}");
            }
        }
        Command::Filters => {
            let catalog = client.filters().await.context("failed to list filters")?;
            for (name, filter) in &catalog.filters {
                println!("{name:<10} {}", filter.description);
                for (parameter, info) in filter.parameters.iter().flatten() {
                    println!(
                        "    {parameter}: {} (default {}, range {})",
                        info.description, info.default, info.range
                    );
                }
            }
            for (category, members) in &catalog.categories {
                println!("{category}: {}", members.join(", "));
            }
        }
        Command::Stats => {
            let stats = client.stats().await.context("failed to read stats")?;
            println!(
                "files: {} uploaded, {} processed, {} total",
                stats.files.uploaded, stats.files.processed, stats.files.total
            );
            println!(
                "storage: {:.2} MB uploads, {:.2} MB processed, {:.2} MB total",
                stats.storage.uploads_size_mb,
                stats.storage.processed_size_mb,
                stats.storage.total_size_mb
            );
        }
        Command::Process {
            image,
            filter,
            param,
            format,
            out_dir,
        } => {
            let out_dir = out_dir.unwrap_or(settings.download_dir);
            tokio::fs::create_dir_all(&out_dir)
                .await
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            run_process(client, image, filter, param, format, out_dir).await?;
        }
    }
    Ok(())
}

async fn run_process(
    client: VisionClient,
    image: PathBuf,
    filter: FilterId,
    param: Option<f64>,
    format: OutputFormat,
    out_dir: PathBuf,
) -> Result<()> {
    let sink = Arc::new(FileDownloadSink::new(client.clone(), out_dir));
    let controller = WorkflowController::new(
        Arc::new(client),
        Surfaces::headless(),
        ParameterControls::sliders(),
        sink.clone(),
    );

    if let HealthIndicator::Online(message) = controller.check_health().await {
        info!(%message, "service reachable");
    }

    let file = CandidateFile::from_path(&image)
        .await
        .with_context(|| format!("failed to read {}", image.display()))?;
    controller.select_image(file).await?;
    controller.select_filter(filter).await?;

    match (filter.parameter(), param) {
        (Some(parameter), Some(value)) => {
            let applied = controller.set_parameter(parameter, value).await?;
            println!("{}: {applied:.1}", parameter.label());
        }
        (None, Some(_)) => bail!("filter {filter} takes no parameter"),
        _ => {}
    }

    let result = match controller.submit().await? {
        SubmitOutcome::Processed(result) => result,
        SubmitOutcome::Discarded => bail!("processing response was superseded"),
    };
    println!("{}", result.caption());
    println!("result: {}", result.reference);

    controller.download(format).await?;
    for path in sink.finish().await? {
        println!("saved {}", path.display());
    }
    Ok(())
}
