//! chapter-cache command-line front end
//!
//! Loads the session from the settings database, runs one navigation, and
//! writes the session back.

use anyhow::Context;
use chapter_cache::config::{load_config_with_hash, Config};
use chapter_cache::settings::{SettingsStore, SqliteSettings};
use chapter_cache::{
    CacheEvent, Chapter, ChapterNavigator, ChapterRate, Navigation, NavigationTask, Session,
    Strategy,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// chapter-cache: fetch a chapter's images into a local cache
///
/// Resolves the page of the current chapter, checks robots.txt, downloads
/// and converts its images to `001.png`, `002.png`, ... in the cache
/// directory, and remembers where you are.
#[derive(Parser, Debug)]
#[command(name = "chapter-cache")]
#[command(version = "1.0.0")]
#[command(about = "Chapter acquisition pipeline for image-based series", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Title to read (replaces the saved one)
    #[arg(long, global = true)]
    title: Option<String>,

    /// Chapter to start from (replaces the saved one)
    #[arg(long, global = true)]
    chapter: Option<f64>,

    /// Step used by next and previous
    #[arg(long, global = true)]
    chapter_rate: Option<f64>,

    /// Provider id
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Resolution strategy: direct, site-search, google, duckduckgo or bing
    #[arg(long, global = true)]
    strategy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advance by the chapter rate and cache that chapter
    Next,
    /// Go back by the chapter rate and cache that chapter
    Previous,
    /// Cache the current chapter again
    Reload,
    /// List series titles matching TEXT on the provider's site
    Search {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Show the saved session and the cache contents
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let mut store = SqliteSettings::new(Path::new(&config.settings.database_path))
        .context("failed to open settings database")?;
    let session = load_session(&config, &store, &cli)?;
    let mut navigator = ChapterNavigator::from_config(&config, session)?;

    match cli.command {
        Command::Status => print_status(&navigator)?,
        Command::Search { text } => {
            let titles = navigator.search_titles(&text).await?;
            if titles.is_empty() {
                println!("No titles found for \"{}\"", text);
            }
            for title in titles {
                println!("{}", title);
            }
        }
        Command::Next => navigator = navigate(navigator, Navigation::Next, &mut store).await?,
        Command::Previous => {
            navigator = navigate(navigator, Navigation::Previous, &mut store).await?
        }
        Command::Reload => navigator = navigate(navigator, Navigation::Reload, &mut store).await?,
    }

    store.save(&navigator.settings())?;
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("chapter_cache=info,warn"),
            1 => EnvFilter::new("chapter_cache=debug,info"),
            2 => EnvFilter::new("chapter_cache=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Config defaults, then saved settings, then command-line overrides
fn load_session(config: &Config, store: &SqliteSettings, cli: &Cli) -> anyhow::Result<Session> {
    let mut session = Session::from_config(config)?;
    if let Some(saved) = store.load()? {
        saved
            .apply(&mut session)
            .context("saved settings are invalid")?;
    }

    if let Some(title) = &cli.title {
        session.title.set(title.clone());
    }
    if let Some(chapter) = cli.chapter {
        session.chapter = Chapter::new(chapter)?;
    }
    if let Some(rate) = cli.chapter_rate {
        session.chapter_rate = ChapterRate::new(rate)?;
    }
    if let Some(provider) = &cli.provider {
        session.provider_id = provider.to_lowercase();
    }
    if let Some(strategy) = &cli.strategy {
        session.strategy = strategy.parse::<Strategy>()?;
    }
    if session.title.is_empty() {
        anyhow::bail!("no title set; pass --title or set [session] title in the config");
    }
    Ok(session)
}

/// Runs `action`; on failure restores the previous chapter and reloads it
async fn navigate(
    navigator: ChapterNavigator,
    action: Navigation,
    store: &mut SqliteSettings,
) -> anyhow::Result<ChapterNavigator> {
    let last_good = navigator.session().chapter;

    let (mut navigator, success) = run_task(navigator, action).await?;
    if success {
        report_success(&navigator)?;
        store.save(&navigator.settings())?;
        return Ok(navigator);
    }

    eprintln!(
        "Failed to load the {} chapter ({}), see the log for details",
        action,
        navigator.session().chapter
    );
    if action == Navigation::Reload && navigator.session().chapter == last_good {
        return Ok(navigator);
    }

    navigator.session_mut().chapter = last_good;
    tracing::info!(chapter = %last_good, "Restoring previous chapter");
    let (navigator, reloaded) = run_task(navigator, Navigation::Reload).await?;
    if reloaded {
        report_success(&navigator)?;
    } else {
        eprintln!("Reloading chapter {} failed as well", last_good);
    }
    Ok(navigator)
}

/// Drives a navigation task, printing progress; Ctrl-C cancels cooperatively
async fn run_task(
    navigator: ChapterNavigator,
    action: Navigation,
) -> anyhow::Result<(ChapterNavigator, bool)> {
    let mut task = NavigationTask::spawn(navigator, action);
    let mut success = false;
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = task.next_event() => match event {
                Some(CacheEvent::Progress(value)) => {
                    eprint!("\r{:>8}: {:>3}%", action, value);
                    let _ = std::io::stderr().flush();
                }
                Some(CacheEvent::Finished(ok)) => success = ok,
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                tracing::warn!("Interrupted, finishing images already in flight");
                task.cancel();
            }
        }
    }
    eprintln!();

    let navigator = task.join().await?;
    Ok((navigator, success))
}

fn report_success(navigator: &ChapterNavigator) -> anyhow::Result<()> {
    let images = navigator.pipeline().cached_images()?;
    let session = navigator.session();
    println!(
        "{} chapter {}: {} images in {}",
        session.title.text(),
        session.chapter,
        images.len(),
        navigator.pipeline().cache_dir().display()
    );
    if let Some(url) = &session.current_url {
        println!("Source: {}", url);
    }
    Ok(())
}

fn print_status(navigator: &ChapterNavigator) -> anyhow::Result<()> {
    let session = navigator.session();
    println!("=== chapter-cache status ===\n");
    println!("Title:        {}", session.title.text());
    println!("Slug:         {}", session.title.slug());
    println!("Chapter:      {}", session.chapter);
    println!("Chapter rate: {}", session.chapter_rate);
    println!("Provider:     {}", session.provider_id);
    println!("Strategy:     {}", session.strategy);
    println!("Providers:    {}", navigator.providers().ids().join(", "));

    println!("\nBlacklisted Domains ({}):", session.blacklist.len());
    for domain in session.blacklist.domains() {
        println!("  - {}", domain);
    }

    let images = navigator.pipeline().cached_images()?;
    println!(
        "\nCache: {} ({} images)",
        navigator.pipeline().cache_dir().display(),
        images.len()
    );
    Ok(())
}
