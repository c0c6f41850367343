//! labsite - Research group website content builder
//!
//! Aggregates member publications, renders site fragments and serves the
//! publications API.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! labsite --root ./site publications --format html -o publications.html
//! labsite --root ./site member jdoe
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! labsite --root ./site serve --port 3000
//! ```

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Local, Utc};
use clap::{Args, Parser, Subcommand};
use labsite::{
    aggregator::{Aggregator, AggregatorOptions, DEFAULT_CONCURRENCY, DEFAULT_MAX_REMOTE},
    browse::{FilterOptions, PublicationBrowser, PublicationFilter, DEFAULT_PAGE_SIZE},
    cache::{ExpiringCache, DEFAULT_TTL_HOURS},
    carousel::Carousel,
    classify,
    documents::{load_local_publications, load_manifest},
    enrichment::Enricher,
    highlights,
    matching::MatchStrategy,
    member, openings,
    model::MergedPublication,
    partials, render,
    semanticscholar::SemanticScholarClient,
    source::{FsSource, HttpSource, Site},
    sync::{write_json_atomic, PublicationSync},
    LabsiteError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Research group website content builder
#[derive(Parser)]
#[command(name = "labsite")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    site: SiteArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SiteArgs {
    /// Site root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Read the site from its web origin instead of --root
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Maximum concurrent member fetches
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Fetch papers from Semantic Scholar for members with an author id
    #[arg(long, global = true)]
    remote: bool,

    /// Most recent Semantic Scholar papers kept per member
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_REMOTE)]
    max_remote: usize,

    /// Look up venue/URL by DOI for preprint-only records
    #[arg(long, global = true)]
    enrich: bool,

    /// Disable the API response cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Cache entry lifetime in hours
    #[arg(long, global = true, default_value_t = DEFAULT_TTL_HOURS)]
    cache_ttl_hours: i64,

    /// Semantic Scholar API key
    #[arg(long, global = true)]
    s2_key: Option<String>,

    /// Group-author matching: exact or fuzzy
    #[arg(long = "match", global = true, default_value = "fuzzy")]
    matching: MatchStrategy,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate member publications
    Publications {
        /// Output format: html, json or csv
        #[arg(long, default_value = "html", value_parser = ["html", "json", "csv"])]
        format: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Free-text filter
        #[arg(short, long)]
        query: Option<String>,

        /// Year filter
        #[arg(long)]
        year: Option<i32>,

        /// Member id filter
        #[arg(long)]
        member: Option<String>,

        /// Category filter
        #[arg(long)]
        category: Option<String>,

        /// Number of result pages shown in HTML output
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// Render a member profile page
    Member {
        /// Member id
        id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the open positions listing
    Openings {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pick and render the home page highlights
    Highlights {
        /// Year to show (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Viewport width used to size the carousel
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Regenerate data/highlights.auto.json from member publications first
        #[arg(long)]
        build: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inject the shared head/header/footer fragments into a page
    Partials {
        /// Page file to process
        page: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write members' publications.json from Semantic Scholar
    Sync,

    /// Label member publications by topic into data/publication_categories.json
    Classify,

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Results per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Manage the API response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Clear cached entries
    Clear,
    /// Show cache file path
    Path,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let args = cli.site;
    match cli.command {
        Commands::Publications {
            format,
            output,
            query,
            year,
            member,
            category,
            pages,
        } => {
            let filter = PublicationFilter {
                query,
                year,
                member,
                category,
            };
            run_publications(&args, &format, output, filter, pages).await
        }
        Commands::Member { id, output } => {
            let site = build_site(&args)?;
            let page = member::load_member_page(&site, &id).await;
            write_output(output.as_deref(), &member::render_member_page(&page))
        }
        Commands::Openings { output } => {
            let site = build_site(&args)?;
            write_output(output.as_deref(), &openings::openings_section(&site).await)
        }
        Commands::Highlights {
            year,
            width,
            build,
            output,
        } => run_highlights(&args, year, width, build, output).await,
        Commands::Partials { page, output } => run_partials(&args, &page, output).await,
        Commands::Sync => run_sync(&args).await,
        Commands::Classify => run_classify(&args),
        Commands::Serve {
            port,
            host,
            page_size,
        } => run_server(&args, host, port, page_size).await,
        Commands::Cache { action } => handle_cache(&args, action),
    }
}

// ============================================================================
// Site & Pipeline Setup
// ============================================================================

fn build_site(args: &SiteArgs) -> Result<Site> {
    match &args.base_url {
        Some(base_url) => Ok(Site::Remote(
            HttpSource::new(base_url).context("Invalid --base-url")?,
        )),
        None => Ok(Site::Local(FsSource::new(&args.root))),
    }
}

fn open_cache(args: &SiteArgs) -> Result<ExpiringCache> {
    let ttl = chrono::Duration::hours(args.cache_ttl_hours.max(0));
    Ok(ExpiringCache::open_default(ttl)?)
}

fn build_aggregator(args: &SiteArgs) -> Result<Aggregator<Site>> {
    let options = AggregatorOptions {
        concurrency: args.concurrency,
        remote: args.remote,
        max_remote: args.max_remote,
        enrich: args.enrich,
        matching: args.matching,
    };

    let mut aggregator = Aggregator::new(build_site(args)?, options);
    if args.remote {
        aggregator = aggregator.with_semantic_scholar(SemanticScholarClient::new(args.s2_key.clone())?);
    }
    if args.enrich {
        aggregator = aggregator.with_enricher(Enricher::new(args.concurrency)?);
    }
    if !args.no_cache && (args.remote || args.enrich) {
        match open_cache(args) {
            Ok(cache) => aggregator = aggregator.with_cache(cache),
            Err(e) => warn!(error = %e, "Cache unavailable, continuing without it"),
        }
    }
    Ok(aggregator)
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved: {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

// ============================================================================
// Publications
// ============================================================================

/// Flat CSV row for one merged publication.
#[derive(Debug, Serialize)]
struct PublicationRow {
    title: String,
    year: String,
    venue: String,
    doi: String,
    url: String,
    authors: String,
    group_authors: String,
    categories: String,
}

impl From<&MergedPublication> for PublicationRow {
    fn from(p: &MergedPublication) -> Self {
        Self {
            title: p.title.clone(),
            year: p.year.map(|y| y.to_string()).unwrap_or_default(),
            venue: p.venue.clone(),
            doi: p.doi.clone().unwrap_or_default(),
            url: p.url.clone(),
            authors: p.authors.join("; "),
            group_authors: p
                .group_authors
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            categories: p.categories.join("; "),
        }
    }
}

fn publications_csv(publications: &[&MergedPublication]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for publication in publications {
        wtr.serialize(PublicationRow::from(*publication))
            .context("Failed to write CSV record")?;
    }
    let bytes = wtr.into_inner().map_err(|e| anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

async fn run_publications(
    args: &SiteArgs,
    format: &str,
    output: Option<PathBuf>,
    filter: PublicationFilter,
    pages: usize,
) -> Result<()> {
    let aggregator = build_aggregator(args)?;
    let aggregate = match aggregator.load().await {
        Ok(aggregate) => aggregate,
        Err(e) if format == "html" => {
            error!(error = %e, "Failed to load publications");
            return write_output(output.as_deref(), &failure_page(&e));
        }
        Err(e) => return Err(e).context("Failed to load publications"),
    };

    let mut browser = PublicationBrowser::new(aggregate, DEFAULT_PAGE_SIZE);
    browser.apply(filter);
    info!(total = browser.total(), matching = browser.matching(), "Filtered publications");

    let content = match format {
        "json" => {
            browser.show_all();
            let matching: Vec<&MergedPublication> = browser.visible().collect();
            serde_json::to_string_pretty(&matching)?
        }
        "csv" => {
            browser.show_all();
            let matching: Vec<&MergedPublication> = browser.visible().collect();
            publications_csv(&matching)?
        }
        _ => {
            browser.show_pages(pages);
            render::publications_section(&browser)
        }
    };

    write_output(output.as_deref(), &content)
}

// ============================================================================
// Highlights, Partials, Sync
// ============================================================================

async fn build_auto_highlights(root: &Path, year: i32) -> Result<()> {
    let source = FsSource::new(root);
    let ids = load_manifest(&source).await?;
    let mut publications = Vec::new();
    for id in &ids {
        publications.extend(load_local_publications(&source, id).await);
    }

    let doc = highlights::build_auto_highlights(&publications, year, Utc::now().timestamp());
    let path = root.join(highlights::AUTO_PATH);
    write_json_atomic(&path, &doc)?;
    println!("Wrote {} with {} items.", path.display(), doc.items.len());
    Ok(())
}

async fn run_highlights(
    args: &SiteArgs,
    year: Option<i32>,
    width: u32,
    build: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let year = year.unwrap_or_else(|| Local::now().year());
    let site = build_site(args)?;

    if build {
        let root = site
            .local_root()
            .ok_or_else(|| anyhow!("--build writes to the site tree and needs --root"))?;
        build_auto_highlights(root, year).await?;
    }

    let picks = highlights::load_highlights(&site, year, &mut rand::thread_rng()).await;
    let carousel = Carousel::for_width(picks.len(), width);
    write_output(
        output.as_deref(),
        &highlights::highlights_section(&picks, year, &carousel),
    )
}

async fn run_partials(args: &SiteArgs, page: &Path, output: Option<PathBuf>) -> Result<()> {
    let site = build_site(args)?;
    let html = std::fs::read_to_string(page)
        .with_context(|| format!("Failed to read {}", page.display()))?;
    let current = page
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let fragments = partials::load_partials(&site).await;
    let injected = partials::inject_partials(&html, &fragments, &current)?;
    write_output(output.as_deref(), &injected)
}

async fn run_sync(args: &SiteArgs) -> Result<()> {
    let site = build_site(args)?;
    let root = site
        .local_root()
        .ok_or_else(|| anyhow!("sync writes member files and needs --root"))?;

    let client = SemanticScholarClient::new(args.s2_key.clone())?;
    let report = PublicationSync::new(client, root).sync_all().await?;

    for (id, count) in &report.written {
        println!("[ok] {} ({} papers)", id, count);
    }
    println!(
        "Synced {} members, skipped {}, failed {}",
        report.written.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}

fn run_classify(args: &SiteArgs) -> Result<()> {
    let site = build_site(args)?;
    let root = site
        .local_root()
        .ok_or_else(|| anyhow!("classify writes data files and needs --root"))?;

    let report = classify::classify_site(root)?;
    for path in &report.skipped_files {
        println!("[warn] skipped {}", path.display());
    }
    if report.malformed > 0 {
        println!("[warn] skipped {} malformed entries", report.malformed);
    }
    println!("[ok] wrote {} with {} entries", report.output.display(), report.entries);
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Publications page shown when the load fails.
fn failure_page(e: &LabsiteError) -> String {
    match e {
        LabsiteError::NoProfiles => render::failure_message(None),
        other => render::failure_message(Some(&other.to_string())),
    }
}

struct AppState {
    aggregator: Aggregator<Site>,
    browser: RwLock<PublicationBrowser>,
    /// Failure page of the last load, until a reload succeeds
    load_error: RwLock<Option<String>>,
    page_size: usize,
}

impl AppState {
    async fn load(aggregator: Aggregator<Site>, page_size: usize) -> Self {
        let (browser, load_error) = match aggregator.load().await {
            Ok(aggregate) => (PublicationBrowser::new(aggregate, page_size), None),
            Err(e) => {
                error!(error = %e, "Failed to load publications");
                (PublicationBrowser::empty(page_size), Some(failure_page(&e)))
            }
        };
        Self {
            aggregator,
            browser: RwLock::new(browser),
            load_error: RwLock::new(load_error),
            page_size,
        }
    }
}

async fn run_server(args: &SiteArgs, host: String, port: u16, page_size: usize) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");
    println!("Starting server at http://{}:{}", host, port);

    let aggregator = build_aggregator(args)?;
    let app_state = Arc::new(AppState::load(aggregator, page_size).await);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/publications", get(publications_html_handler))
        .route("/api/publications", get(publications_handler))
        .route("/api/filters", get(filters_handler))
        .route("/api/reload", post(reload_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Query string of the publications endpoints. Empty values mean "any".
#[derive(Debug, Default, Deserialize)]
struct PublicationsQuery {
    q: Option<String>,
    year: Option<String>,
    member: Option<String>,
    category: Option<String>,
    page: Option<usize>,
}

impl PublicationsQuery {
    fn filter(&self) -> PublicationFilter {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        PublicationFilter {
            query: non_empty(&self.q),
            year: self.year.as_deref().and_then(|y| y.trim().parse().ok()),
            member: non_empty(&self.member),
            category: non_empty(&self.category),
        }
    }
}

async fn filtered_browser(state: &AppState, query: &PublicationsQuery) -> PublicationBrowser {
    let mut browser = state.browser.read().await.clone();
    browser.apply(query.filter());
    browser.show_pages(query.page.unwrap_or(1));
    browser
}

#[derive(Debug, Serialize)]
struct PublicationsResponse {
    total: usize,
    matching: usize,
    shown: usize,
    has_more: bool,
    publications: Vec<MergedPublication>,
}

/// Filtered publications as JSON
async fn publications_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicationsQuery>,
) -> Json<PublicationsResponse> {
    let browser = filtered_browser(&state, &query).await;
    Json(PublicationsResponse {
        total: browser.total(),
        matching: browser.matching(),
        shown: browser.visible_count(),
        has_more: browser.has_more(),
        publications: browser.visible().cloned().collect(),
    })
}

/// Filtered publications as the rendered page fragment
async fn publications_html_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicationsQuery>,
) -> Html<String> {
    if let Some(page) = state.load_error.read().await.clone() {
        return Html(page);
    }
    let browser = filtered_browser(&state, &query).await;
    Html(render::publications_section(&browser))
}

async fn filters_handler(State(state): State<Arc<AppState>>) -> Json<FilterOptions> {
    Json(state.browser.read().await.options().clone())
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    status: String,
    profiles: usize,
    publications: usize,
}

/// Re-run the aggregation and swap in the result
async fn reload_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReloadResponse>) {
    info!("Reload request");
    match state.aggregator.load().await {
        Ok(aggregate) => {
            let response = ReloadResponse {
                status: "success".to_string(),
                profiles: aggregate.profiles.len(),
                publications: aggregate.publications.len(),
            };
            *state.browser.write().await = PublicationBrowser::new(aggregate, state.page_size);
            *state.load_error.write().await = None;
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            error!(error = %e, "Reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReloadResponse {
                    status: format!("error: {}", e),
                    profiles: 0,
                    publications: 0,
                }),
            )
        }
    }
}

// ============================================================================
// Cache Management
// ============================================================================

fn handle_cache(args: &SiteArgs, action: CacheAction) -> Result<()> {
    let cache = open_cache(args)?;

    match action {
        CacheAction::Clear => {
            cache.clear()?;
            println!("Cache cleared.");
        }
        CacheAction::Path => {
            println!("Cache file: {:?}", cache.path());
        }
    }

    Ok(())
}
