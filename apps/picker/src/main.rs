use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use client_core::{config::DEFAULT_SETTINGS_FILE, load_settings, CascadeLoader, PendingFetch};
use shared::domain::SelectionKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Walks the brand → model → version pick-lists against a query service and
/// prints the resulting snapshot as JSON.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    service_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    all_cars_limit: Option<u32>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long = "car-version")]
    car_version: Option<String>,
}

async fn settle(pending: Option<PendingFetch>) {
    if let Some(pending) = pending {
        pending.settled().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(url) = args.service_url {
        settings.service_url = url;
    }
    if let Some(key) = args.api_key {
        settings.api_key = Some(key);
    }
    if let Some(limit) = args.all_cars_limit {
        settings.all_cars_limit = limit;
    }
    let settings = settings.prepared()?;
    info!("picker: using query service {}", settings.service_url);

    let loader = CascadeLoader::from_settings(&settings);
    loader.start().await.settled().await;

    if let Some(brand) = args.brand {
        settle(loader.set_brand(brand).await?).await;
    }
    if let Some(model) = args.model {
        settle(loader.set_model(model).await?).await;
    }
    if let Some(version) = args.car_version {
        loader.set_version(version).await?;
    }

    let snapshot = loader.snapshot().await;
    for kind in [SelectionKind::Brand, SelectionKind::Model, SelectionKind::Version] {
        let selection = snapshot.selection(kind);
        info!(
            "picker: {kind} candidates={} enabled={}",
            selection.candidates.len(),
            selection.enabled
        );
    }
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
