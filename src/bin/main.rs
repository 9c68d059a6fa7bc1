use clap::Parser;
use probate_scraper::{Config, DirectoryStore, Runner};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "probate-scraper")]
#[command(about = "Scrape probate case records from a county record portal")]
#[command(version)]
struct Cli {
    /// Config file to run
    #[arg(default_value = "configs/delaware.yaml")]
    config: PathBuf,

    /// First filing date to search, MM/DD/YYYY (overrides config)
    #[arg(long, value_name = "MM/DD/YYYY")]
    from: Option<String>,

    /// Last filing date to search, MM/DD/YYYY (defaults to today)
    #[arg(long, value_name = "MM/DD/YYYY")]
    to: Option<String>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Output directory (overrides config)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Search from --from even if later records were already saved
    #[arg(long)]
    no_resume: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> probate_scraper::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let mut config = Config::load(&cli.config)?;

    if cli.from.is_some() {
        config.search.from = cli.from.clone();
    }
    if cli.to.is_some() {
        config.search.to = cli.to.clone();
    }
    if let Some(ref out) = cli.out {
        config.output.debug_dir = Some(out.join("debug"));
        config.output.dir = out.clone();
    }
    if cli.no_resume {
        config.search.resume = false;
    }
    if cli.headless {
        config.browser.headless = true;
    }
    config.validate()?;

    if cli.check {
        println!("Config valid: {}", config.name);
        println!("  Entry: {}", config.site.entry_url);
        println!(
            "  Search: {} - {}",
            config.search.from.as_deref().unwrap_or("(resume)"),
            config.search.to.as_deref().unwrap_or("today")
        );
        println!("  Resume: {}", config.search.resume);
        println!(
            "  Walk: {} rows/page, {} pages max",
            config.walk.row_budget, config.walk.max_pages
        );
        if let Some(max) = config.walk.max_records {
            println!("  Record budget: {}", max);
        }
        println!("  Retry attempts: {}", config.retry.attempts);
        println!("  Output: {}", config.output.dir.display());
        return Ok(());
    }

    println!("Running: {}", config.name);

    let mut store = DirectoryStore::new(&config.output.dir);
    let runner = Runner::launch(&config.browser).await?;
    let result = runner.run(&config, &mut store).await;
    runner.close().await?;
    let report = result?;

    println!();
    if report.success {
        println!("✓ Success");
    } else {
        println!("✗ Failed");
        if let Some(ref error) = report.error {
            println!("  Error: {}", error);
        }
    }
    println!("  Search: {}", report.criteria);
    println!("  Records: {} ({} new)", report.records_found, report.added);
    println!("  Pages: {}", report.pages_visited);
    if let Some(ref stop) = report.stop {
        println!("  Stopped: {}", stop);
    }
    println!("  Duration: {}ms", report.duration_ms);
    println!("  Output: {}", store.dir().display());

    if !report.success {
        std::process::exit(1);
    }

    Ok(())
}
