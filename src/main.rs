//! kadastr - look up Russian cadastral parcels from the command line
//!
//! Thin shell over the library: builds the registry client, cache, and
//! renderer, runs one lookup, prints the text block, and reports the map
//! path.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kadastr::cache::MemoryCache;
use kadastr::cli::Cli;
use kadastr::orchestrator::Orchestrator;
use kadastr::registry::NspdClient;
use kadastr::render::MapRenderer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let http = reqwest::Client::new();
    let registry = Arc::new(NspdClient::with_client(http.clone()));
    let cache = Arc::new(MemoryCache::new());
    let renderer = MapRenderer::new(http, cli.out_dir.clone());
    let orchestrator = Orchestrator::new(registry, cache, renderer);

    let reply = if cli.refresh {
        orchestrator.refresh(&cli.number).await
    } else {
        orchestrator.lookup(&cli.number).await
    };

    println!("{}", reply.text);
    if let Some(map) = reply.map {
        println!("\n🗺 Карта: {}", map.display());
    }
    if reply.refresh.is_some() {
        println!("\nПовторите запрос с --refresh, чтобы обновить данные.");
    }
}
