mod logging;
mod report;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tagsync_core::http::RateLimiter;
use tagsync_core::orchestrator::{
    BulkOptions, BulkScraper, DescriptionSync, RunStats, SkipPolicy, SyncOptions,
};
use tagsync_core::provider::wiki::truncate;
use tagsync_core::provider::{
    Credentials, DEFAULT_API_URL, DEFAULT_SITE_URL, DEFAULT_TAG_PREFIX, POST_API_STRATEGY,
    POST_PAGE_STRATEGY,
};
use tagsync_core::store::{MetadataStore, TimestampKind};
use tagsync_core::types::{ItemKind, ScrapeItem, ScrapeMode};
use tagsync_core::ScrapeStrategy;

use settings::{NetworkSettings, ProviderSettings, StoreSettings, USER_AGENT, WIKI_USER_AGENT};

#[derive(Parser)]
#[command(name = "tagsync")]
#[command(about = "Scrape metadata and tag descriptions into a media metadata store", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Metadata store URL
    #[arg(long, env = "STASH_URL", default_value = "http://localhost:9999", global = true)]
    stash_url: String,

    /// Metadata store API key
    #[arg(long, env = "STASH_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Provider site URL
    #[arg(long, default_value = DEFAULT_SITE_URL, global = true)]
    site_url: String,

    /// Provider post API URL
    #[arg(long, default_value = DEFAULT_API_URL, global = true)]
    provider_api_url: String,

    /// Namespace for tags written by the post-page strategy
    #[arg(long, default_value = DEFAULT_TAG_PREFIX, global = true)]
    tag_prefix: String,

    /// Seconds between requests (default depends on the command and store location)
    #[arg(long, global = true)]
    rate_limit: Option<f64>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Total attempts per request
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Log progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log every request
    #[arg(long, global = true)]
    debug: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

impl GlobalArgs {
    fn store(&self) -> StoreSettings {
        StoreSettings {
            url: self.stash_url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    fn provider(&self) -> ProviderSettings {
        ProviderSettings {
            site_url: self.site_url.clone(),
            api_url: self.provider_api_url.clone(),
            tag_prefix: self.tag_prefix.clone(),
            credentials: Credentials::load(),
        }
    }

    fn bulk_network(&self) -> NetworkSettings {
        NetworkSettings::for_store(&self.stash_url).with_overrides(
            self.rate_limit,
            self.timeout,
            self.max_retries,
        )
    }

    fn wiki_network(&self) -> NetworkSettings {
        NetworkSettings::for_wiki().with_overrides(self.rate_limit, self.timeout, self.max_retries)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every image and/or scene in the store
    Bulk(BulkArgs),
    /// Copy wiki descriptions onto store tags
    SyncDescriptions(SyncArgs),
    /// List the store's installed scrapers and the built-in ones
    ListScrapers {
        #[arg(short = 't', long = "type", value_enum, default_value_t = KindArg::Both)]
        kind: KindArg,
    },
    /// Check that the store answers
    TestConnection,
    /// Look up one tag's wiki description
    TestWiki {
        /// Tag name
        tag: String,
    },
    /// Scrape a single file with a built-in strategy and print the result as JSON
    ScrapeFile {
        path: String,
        /// Built-in strategy to use
        #[arg(long, value_parser = [POST_API_STRATEGY, POST_PAGE_STRATEGY], default_value = POST_PAGE_STRATEGY)]
        strategy: String,
        /// md5 of the file, when the filename does not carry it
        #[arg(long)]
        md5: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Image,
    Scene,
    Both,
}

impl KindArg {
    fn kinds(self) -> &'static [ItemKind] {
        match self {
            KindArg::Image => &[ItemKind::Image],
            KindArg::Scene => &[ItemKind::Scene],
            KindArg::Both => &[ItemKind::Image, ItemKind::Scene],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum TimestampArg {
    #[default]
    Mtime,
    Ctime,
}

impl From<TimestampArg> for TimestampKind {
    fn from(arg: TimestampArg) -> Self {
        match arg {
            TimestampArg::Mtime => TimestampKind::Mtime,
            TimestampArg::Ctime => TimestampKind::Ctime,
        }
    }
}

#[derive(Args)]
struct BulkArgs {
    /// Which items to scrape
    #[arg(short = 't', long = "type", value_enum, default_value_t = KindArg::Image)]
    kind: KindArg,

    /// Strategy to try first (name as listed by list-scrapers)
    #[arg(short, long)]
    scraper: Option<String>,

    /// Stop after this many items per kind
    #[arg(short, long)]
    limit: Option<usize>,

    /// Fall back to other strategies when the first has nothing
    #[arg(long)]
    try_all_scrapers: bool,

    /// Leave organized items alone
    #[arg(long)]
    skip_organized: bool,

    /// Leave items that already have tags alone
    #[arg(long)]
    skip_tagged: bool,

    /// Leave items carrying this tag alone (repeatable)
    #[arg(long)]
    skip_if_has_tag: Vec<String>,

    /// File timestamp used by the date filters
    #[arg(long, value_enum, default_value_t = TimestampArg::Mtime)]
    timestamp_type: TimestampArg,

    /// Only items dated on or after YYYY-MM-DD
    #[arg(long)]
    since: Option<String>,

    /// Only items dated on or before YYYY-MM-DD
    #[arg(long)]
    before: Option<String>,

    /// Only items dated within START and END, inclusive
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    between: Option<Vec<String>>,

    /// Report what would change without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Write detailed results to this JSON file
    #[arg(long)]
    json_output: Option<PathBuf>,
}

#[derive(Args)]
struct SyncArgs {
    /// Comma-separated tag names (default: every tag)
    #[arg(long)]
    tags: Option<String>,

    /// Process at most this many tags
    #[arg(long)]
    limit: Option<usize>,

    /// Report what would change without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Overwrite existing descriptions
    #[arg(short, long)]
    force: bool,

    /// Also look up tags that already have a description
    #[arg(long)]
    include_existing: bool,

    /// Print results as JSON instead of the summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let global = &cli.global;
    logging::init(global.verbose, global.debug, global.log_file.as_deref())?;

    match cli.command {
        Commands::Bulk(args) => bulk(global, args).await,
        Commands::SyncDescriptions(args) => sync_descriptions(global, args).await,
        Commands::ListScrapers { kind } => list_scrapers(global, kind).await,
        Commands::TestConnection => test_connection(global).await,
        Commands::TestWiki { tag } => test_wiki(global, &tag).await,
        Commands::ScrapeFile {
            path,
            strategy,
            md5,
        } => scrape_file(global, path, &strategy, md5).await,
    }
}

async fn connect_store(
    global: &GlobalArgs,
    network: &NetworkSettings,
    timestamps: Option<TimestampKind>,
    scrape_limiter: Option<&RateLimiter>,
) -> Result<Arc<dyn MetadataStore>> {
    let store = global
        .store()
        .connect(network, timestamps, scrape_limiter)?;
    println!("Connecting to store at {}...", global.stash_url);
    store
        .test_connection()
        .await
        .context("Failed to connect to the store. Check URL and API key.")?;
    println!("✓ Connected to store");
    Ok(Arc::new(store))
}

fn dry_run_banner() {
    println!("{}", "=".repeat(70));
    println!("DRY RUN MODE - No changes will be made");
    println!("{}\n", "=".repeat(70));
}

async fn bulk(global: &GlobalArgs, args: BulkArgs) -> Result<ExitCode> {
    let network = global.bulk_network();
    let dates = settings::date_filter(
        args.since.as_deref(),
        args.before.as_deref(),
        args.between.as_deref(),
    )?;
    let timestamps = dates.is_active().then(|| args.timestamp_type.into());

    // Paces every scrape attempt, retries included.
    let limiter = RateLimiter::new(network.interval());
    let store = connect_store(global, &network, timestamps, Some(&limiter)).await?;
    if settings::is_localhost(&global.stash_url) {
        println!(
            "  Localhost detected - {}s rate limit, {} attempts per request",
            network.rate_limit, network.max_attempts
        );
    }
    println!();
    if args.dry_run {
        dry_run_banner();
    }
    if !args.skip_if_has_tag.is_empty() {
        tracing::info!(tags = ?args.skip_if_has_tag, "will skip items with these tags");
    }
    if dates.is_active() {
        tracing::info!(since = ?dates.since, before = ?dates.before, timestamp = ?args.timestamp_type, "date filter active");
    }

    let options = BulkOptions {
        dry_run: args.dry_run,
        try_all: args.try_all_scrapers,
        skip: SkipPolicy {
            skip_organized: args.skip_organized,
            skip_tagged: args.skip_tagged,
            exclusion_tags: args.skip_if_has_tag.clone(),
            dates,
        },
    };
    let provider_fetcher = network.shared_fetcher(USER_AGENT, &limiter)?;
    let mut scraper = global
        .provider()
        .builtin_strategies(&provider_fetcher)
        .into_iter()
        .fold(BulkScraper::new(store, options), BulkScraper::with_strategy);

    let mut combined = RunStats::new();
    let mut all_results = Vec::new();
    for &kind in args.kind.kinds() {
        tracing::info!(%kind, "starting scrape");
        let results = scraper
            .run(kind, args.scraper.as_deref(), args.limit)
            .await
            .with_context(|| format!("{kind} scrape failed"))?;
        println!("{}", report::bulk_summary(scraper.stats()));
        combined.total += scraper.stats().total;
        all_results.extend(results);
    }

    if let Some(path) = &args.json_output {
        for result in &all_results {
            combined.record(result);
        }
        report::write_json(path, &report::bulk_json(&combined, &all_results))?;
        println!("\nDetailed results saved to: {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn sync_descriptions(global: &GlobalArgs, args: SyncArgs) -> Result<ExitCode> {
    let network = global.wiki_network();
    let store = connect_store(global, &network, None, None).await?;
    if args.dry_run {
        dry_run_banner();
    }

    let wiki = global
        .provider()
        .wiki(network.throttled_fetcher(WIKI_USER_AGENT)?);
    let options = SyncOptions {
        dry_run: args.dry_run,
        include_existing: args.include_existing,
        force: args.force,
    };
    let mut sync = DescriptionSync::new(store, wiki, options);

    let names = args.tags.as_deref().map(settings::split_names);
    let tags = sync
        .select_tags(names.as_deref(), args.limit)
        .await
        .context("Failed to list tags")?;
    if tags.is_empty() {
        if names.is_some() {
            eprintln!("No matching tags found");
            return Ok(ExitCode::FAILURE);
        }
        println!("No tags to process");
        return Ok(ExitCode::SUCCESS);
    }
    println!("Processing {} tags...", tags.len());

    let results = sync.sync_tags(&tags).await;
    if args.json {
        let json = report::sync_json(&sync.stats(), &results);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", report::sync_summary(&sync.stats()));
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_scrapers(global: &GlobalArgs, kind: KindArg) -> Result<ExitCode> {
    let network = global.bulk_network();
    let store = global.store().connect(&network, None, None)?;
    let provider = global.provider();
    let builtins = provider.builtin_strategies(&network.unthrottled_fetcher(USER_AGENT)?);

    println!("Available scrapers:\n");
    for &kind in kind.kinds() {
        let installed = store
            .list_strategies(kind)
            .await
            .with_context(|| format!("Failed to list {kind} scrapers"))?;
        println!("{} scrapers:", kind.content_type());
        let infos = installed.iter().chain(builtins.iter().map(|s| s.info()));
        for info in infos {
            let modes: Vec<&str> = info.supported_modes.iter().map(ScrapeMode::as_str).collect();
            println!("  - {} (supports: {})", info.name, modes.join(", "));
        }
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

async fn test_connection(global: &GlobalArgs) -> Result<ExitCode> {
    let store = global.store().connect(&global.bulk_network(), None, None)?;
    match store.test_connection().await {
        Ok(()) => {
            println!("✓ Connected to store at {}", global.stash_url);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ Failed to connect to store at {}: {e}", global.stash_url);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn test_wiki(global: &GlobalArgs, tag: &str) -> Result<ExitCode> {
    let network = global.wiki_network();
    let wiki = global
        .provider()
        .wiki(network.throttled_fetcher(WIKI_USER_AGENT)?);

    println!("Testing wiki lookup for tag: '{tag}'");
    match wiki.scrape_tag(tag).await {
        Ok(found) => {
            println!("Success: true");
            println!("Description: {}", truncate(found.description.as_str(), 500));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("Success: false");
            println!("Error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints `{}` whenever nothing could be scraped.
async fn scrape_file(
    global: &GlobalArgs,
    path: String,
    strategy: &str,
    md5: Option<String>,
) -> Result<ExitCode> {
    let network = global.wiki_network();
    let fetcher = network.throttled_fetcher(USER_AGENT)?;
    let provider = global.provider();
    let strategy: Box<dyn ScrapeStrategy> = if strategy == POST_API_STRATEGY {
        Box::new(provider.post_api_strategy(&fetcher))
    } else {
        Box::new(provider.post_page_strategy(&fetcher))
    };

    let item = ScrapeItem {
        id: path.clone(),
        kind: ItemKind::Image,
        title: None,
        path: Some(path),
        checksum: md5,
        tags: Vec::new(),
        organized: false,
        added_at: None,
    };
    let output = match strategy.scrape(&item).await {
        Ok(Some(data)) => serde_json::to_value(&data)?,
        Ok(None) => serde_json::json!({}),
        Err(e) => {
            tracing::error!(error = %e, "scrape failed");
            serde_json::json!({})
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}
