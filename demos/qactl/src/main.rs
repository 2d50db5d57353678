use clap::{Parser, Subcommand};
use qa::{Action, Browser, CrawlConfig, Error, ErrorKind, PoolConfig, RemoteConfig, Result, TestSpec};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "qactl", about = "Drive a crawl or a test run against a remote browser server")]
struct Args {
    /// Base URL of the remote browser server.
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    /// Maximum number of pooled browser contexts.
    #[arg(long, default_value_t = 4)]
    pool_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl a site starting from one URL and print a coverage summary.
    Crawl {
        start_url: String,
        #[arg(long, default_value_t = 50)]
        max_pages: usize,
        #[arg(long, default_value_t = 3)]
        max_depth: u32,
    },
    /// Run a small built-in test spec against `target_url` and print its outcome.
    Test { target_url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "qactl=info,qa=info".into());
    let fmt = tracing_subscriber::fmt::layer().pretty();
    tracing_subscriber::registry().with(fmt).with(env).init();

    let remote = RemoteConfig::builder().with_base_url(args.base_url).build().map_err(|e| Error::new(ErrorKind::ValidationError, e.to_string()))?;
    let pool = PoolConfig::builder().with_min_size(1usize).with_max_size(args.pool_size).build().map_err(|e| Error::new(ErrorKind::ValidationError, e.to_string()))?;
    let browser = Browser::connect(remote, pool).await?;

    match args.command {
        Command::Crawl { start_url, max_pages, max_depth } => run_crawl(&browser, &start_url, max_pages, max_depth).await?,
        Command::Test { target_url } => run_test(&browser, &target_url).await?,
    }

    browser.shutdown().await;
    Ok(())
}

async fn run_crawl(browser: &Browser, start_url: &str, max_pages: usize, max_depth: u32) -> Result<()> {
    let config = CrawlConfig::builder()
        .with_max_pages(max_pages)
        .with_max_depth(max_depth)
        .build()
        .map_err(|e| Error::new(ErrorKind::ValidationError, e.to_string()))?;
    let crawler = browser.crawler(config)?;
    let result = crawler.crawl(start_url).await?;

    println!("crawled {} pages, skipped {}, failed {}", result.pages_crawled.len(), result.pages_skipped.len(), result.pages_failed.len());
    println!("coverage score: {:.2}", result.coverage_score);
    for page in &result.pages_crawled {
        println!("  {} (depth {})", page.url, page.depth);
    }
    Ok(())
}

/// A minimal navigate-and-assert spec, built directly in Rust: this binary
/// never parses a DSL source, matching how `qa_runner` itself only ever
/// consumes already-typed `TestSpec`/`Action` values.
fn demo_spec(target_url: &str) -> TestSpec {
    TestSpec::new(
        "homepage_loads",
        vec![
            Action::Navigate { url: target_url.to_string() },
            Action::AssertVisible { selector: "body".to_string() },
        ],
    )
}

async fn run_test(browser: &Browser, target_url: &str) -> Result<()> {
    let spec = demo_spec(target_url);

    let engine = browser.healing_engine(None);
    let executor = qa::browser_executor(browser.transport().clone(), Some(std::sync::Arc::new(engine)));
    let runner = browser.runner(executor, qa::RunnerConfig::default());
    let result = runner.run_spec(spec, std::collections::HashMap::new()).await;

    println!("test {:?}: {:?} ({} / {} steps)", result.test_name, result.status, result.steps.len(), result.total_steps);
    if let Some(error) = &result.error {
        println!("  error: {error}");
    }
    Ok(())
}
