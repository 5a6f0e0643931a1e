mod clipping;
mod config;
mod docx;
mod eventregistry;

pub const USER_AGENT: &str = concat!("clipgen/", env!("CARGO_PKG_VERSION"));

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing::info;

use clipping::aggregate::{self, QueryPlan};
use config::ClippingConfig;
use eventregistry::client::EventRegistryClient;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Generate a digital press clipping document from Event Registry news search"
)]
struct Cli {
    /// Path to a JSON configuration file (filter lists, limits, date window)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output path for the generated document
    #[arg(short, long, default_value = docx::DEFAULT_FILENAME)]
    output: PathBuf,

    /// Override configured keywords (repeatable)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Override configured source domains (repeatable)
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Override the date window length in days
    #[arg(long)]
    days: Option<i64>,

    /// Override the global article cap
    #[arg(long)]
    max_total: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clipgen=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClippingConfig::load(path)?,
        None => ClippingConfig::default(),
    };
    if !cli.keywords.is_empty() {
        config.keywords = cli.keywords.clone();
    }
    if !cli.sources.is_empty() {
        config.sources = cli.sources.clone();
    }
    if let Some(days) = cli.days {
        config.days_range = days;
    }
    if let Some(max_total) = cli.max_total {
        config.max_total_articles = max_total;
    }
    config.validate()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let client = EventRegistryClient::from_env(http)?;

    let today = Local::now().date_naive();
    let (date_start, date_end) = config.date_window(today);
    let plan = QueryPlan {
        languages: config.languages.clone(),
        excluded_topics: config.excluded_topics.clone(),
        allowed_authors: config.allowed_authors.clone(),
        date_start,
        date_end,
        per_source_limit: config.per_source_limit,
    };

    info!(
        keywords = config.keywords.len(),
        sources = config.sources.len(),
        cap = config.max_total_articles,
        "generating press clipping"
    );

    let articles = aggregate::aggregate(
        &client,
        &plan,
        &config.keywords,
        &config.sources,
        config.max_total_articles,
    )
    .await;

    if !articles.is_empty() {
        println!("Generated Document Content:");
        print!("{}", aggregate::format_preview(&articles));
    }

    let document = docx::build_document(&articles, today)?;
    std::fs::write(&cli.output, &document)?;
    info!(
        articles = articles.len(),
        bytes = document.len(),
        path = %cli.output.display(),
        "document written"
    );

    // Shown even for zero articles; the run itself succeeded.
    println!("Document generated successfully!");
    println!(
        "Saved {} ({} articles, {})",
        cli.output.display(),
        articles.len(),
        docx::MIME_TYPE
    );
    Ok(())
}
