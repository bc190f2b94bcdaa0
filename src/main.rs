use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedscout::config::Config;
use feedscout::discovery::{Discoverer, Feed, FeedResultSet};
use feedscout::util::{pad_to_width, strip_control_chars, truncate_to_width};

const TITLE_WIDTH: usize = 40;
const FORMAT_WIDTH: usize = 8;

/// Get the config directory path (~/.config/feedscout/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedscout"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedscout",
    about = "Find RSS and Atom feeds for a URL or a search phrase"
)]
struct Args {
    /// A URL, a bare domain, or words to search the web for
    #[arg(required = true, value_name = "QUERY")]
    query: Vec<String>,

    /// Config file (defaults to ~/.config/feedscout/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "feedscout=debug"
    } else {
        "feedscout=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_table(feeds: &FeedResultSet) {
    let mut rows: Vec<(&String, &Feed)> = feeds.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    println!(
        "{}  {}  {:>8}  URL",
        pad_to_width("TITLE", TITLE_WIDTH),
        pad_to_width("FORMAT", FORMAT_WIDTH),
        "ARTICLES"
    );
    for (url, feed) in rows {
        let title = strip_control_chars(&feed.title);
        let title = truncate_to_width(&title, TITLE_WIDTH);
        println!(
            "{}  {}  {:>8}  {}",
            pad_to_width(&title, TITLE_WIDTH),
            pad_to_width(&feed.format.to_string(), FORMAT_WIDTH),
            feed.articles.len(),
            url
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let discoverer = Discoverer::new(config.discovery_settings())
        .context("Failed to initialize HTTP client")?;

    let query = args.query.join(" ");
    let feeds = match discoverer.search(&query).await {
        Ok(feeds) => feeds,
        Err(e) => {
            tracing::debug!(error = ?e, "Discovery failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&feeds).context("Failed to serialize feeds")?;
        println!("{json}");
    } else if feeds.is_empty() {
        println!("No feeds found for \"{query}\"");
    } else {
        print_table(&feeds);
    }

    Ok(())
}
