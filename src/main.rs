mod ingest;
mod models;
mod scrapers;

use anyhow::Result;
use clap::Parser;
use ingest::IngestClient;
use models::IngestPayload;
use scrapers::types::{ExtractorConfig, IngestConfig};
use scrapers::{ChromePage, IngestSink, ListingExtractor, PageHost, StaticPage};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listing-scout", about = "Extract a rental listing from a web page")]
struct Cli {
    /// Listing URL
    url: String,

    /// Read the page from a saved HTML file instead of opening a browser
    #[arg(long)]
    html: Option<PathBuf>,

    /// Seconds to let the page render before expanding it
    #[arg(long, default_value_t = 5)]
    load_wait: u64,

    /// Post the extracted listing to the ingestion API
    #[arg(long)]
    submit: bool,

    /// Base URL of the ingestion API
    #[arg(long, env = "ROOF_API_BASE", default_value = "http://localhost:8000")]
    api_base: String,

    /// Where to write the extracted record
    #[arg(long, default_value = "extracted_listing.json")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    info!("🏠 Listing Scout");
    info!("================");

    let extractor = ListingExtractor::new(ExtractorConfig::default());

    // The whole run is the only failure the user sees; nothing is submitted
    let host: Box<dyn PageHost> = match &cli.html {
        Some(path) => Box::new(StaticPage::from_file(cli.url.as_str(), path)?),
        None => Box::new(ChromePage::open(&cli.url, Duration::from_secs(cli.load_wait))?),
    };
    let listing = match extractor.run(host.as_ref()) {
        Ok(listing) => listing,
        Err(e) => {
            error!("Extraction failed: {:#}", e);
            return Err(e);
        }
    };
    drop(host);

    println!("Title:       {}", listing.title);
    println!("Price:       {}", listing.price_text);
    println!(
        "Rooms:       {} bed / {} bath",
        listing.bedroom_count.map_or("?".to_string(), |n| n.to_string()),
        listing.bathroom_count.map_or("?".to_string(), |n| n.to_string())
    );
    if !listing.location_text.is_empty() {
        println!("Location:    {}", listing.location_text);
    }
    if !listing.availability_text.is_empty() {
        println!("Available:   {}", listing.availability_text);
    }
    println!("Images:      {}", listing.images.len());
    println!("Description: {} chars", listing.description_text.chars().count());

    let json = serde_json::to_string_pretty(&listing)?;
    tokio::fs::write(&cli.out, json).await?;
    info!("💾 Saved listing to {}", cli.out.display());

    if cli.submit {
        let client = IngestClient::new(&IngestConfig {
            api_base: cli.api_base.clone(),
            ..Default::default()
        })?;
        let response = client.submit(&IngestPayload::from(&listing)).await?;
        info!(
            "📤 Submitted to {} ({}): status={}, listing_id={:?}",
            client.sink_name(),
            client.endpoint(),
            response.status,
            response.created_listing_id
        );
    }

    Ok(())
}
