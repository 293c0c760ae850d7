//! Answer a question with a chat model backed by DuckDuckGo results.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable. Model,
//! search and fetch calls are cached under `.cache/` in the working
//! directory, so asking the same question twice is free.
//!
//! # Examples
//!
//! ```sh
//! gpt-search "What year did the Berlin Wall fall?"
//!
//! # Higher-capacity model, with progress on stderr
//! gpt-search -4 -v "Who won the 2018 Fields Medal?"
//!
//! # Skip the on-disk cache
//! gpt-search --no-cache "What is the tallest building in Europe?"
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use gpt_search::cache::{CallStore, DiskStore, MemoryStore};
use gpt_search::config::{CacheMode, ModelProfile, SearchConfig};
use gpt_search::pipeline::Pipeline;
use gpt_search::web::{DuckDuckGo, HttpFetcher};
use gpt_search::{ChatClient, OPENAI_URL, Result};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Combine a chat model with DuckDuckGo to answer questions.
///
/// Beware that a run makes at least two model calls, and more when the
/// retrieved pages have to be summarized to fit the context window.
#[derive(Parser)]
#[command(name = "gpt-search", version)]
struct Cli {
    /// What do you want to ask?
    question: String,

    /// Use gpt-4 (slower, costs more money)
    #[arg(short = '4', long = "gpt4", conflicts_with = "model")]
    gpt4: bool,

    /// Model to use by name
    #[arg(long)]
    model: Option<String>,

    /// Log progress to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Keep cached calls in memory only for this run
    #[arg(long, conflicts_with = "cache_dir")]
    no_cache: bool,

    /// Directory for cached calls
    #[arg(long, default_value = ".cache")]
    cache_dir: PathBuf,

    /// Chat completions endpoint
    #[arg(long, default_value = OPENAI_URL)]
    api_url: String,
}

impl Cli {
    fn profile(&self) -> Result<ModelProfile> {
        match (&self.model, self.gpt4) {
            (Some(name), _) => ModelProfile::lookup(name),
            (None, true) => Ok(ModelProfile::GPT_4),
            (None, false) => Ok(ModelProfile::default()),
        }
    }

    fn config(&self) -> Result<SearchConfig> {
        let cache = if self.no_cache {
            CacheMode::Memory
        } else {
            CacheMode::Disk(self.cache_dir.clone())
        };
        Ok(SearchConfig::default()
            .with_profile(self.profile()?)
            .with_api_url(&self.api_url)
            .with_cache(cache))
    }
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn open_store(mode: &CacheMode) -> Result<Box<dyn CallStore>> {
    Ok(match mode {
        CacheMode::Disk(dir) => Box::new(DiskStore::new(dir.clone())?),
        CacheMode::Memory => Box::new(MemoryStore::new()),
    })
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    let client = ChatClient::from_env(&config.api_url)?;
    let store = open_store(&config.cache)?;
    let search = DuckDuckGo::new()?;
    let fetcher = HttpFetcher::new()?;

    let report = Pipeline::new(&client, &search, &fetcher, store.as_ref(), &config)
        .run(&cli.question)
        .await?;
    print!("{report}");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level_for(cli.verbose));
    tracing_subscriber::registry().with(fmt_layer).init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gpt-search").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_the_cheaper_model_and_disk_cache() {
        let cli = parse(&["What year did the Berlin Wall fall?"]);
        let config = cli.config().unwrap();
        assert_eq!(config.profile, ModelProfile::GPT_35_TURBO);
        assert_eq!(config.cache, CacheMode::Disk(PathBuf::from(".cache")));
        assert_eq!(config.api_url, OPENAI_URL);
    }

    #[test]
    fn gpt4_flag_selects_the_larger_profile() {
        let config = parse(&["-4", "q"]).config().unwrap();
        assert_eq!(config.profile.context_tokens, 8192);
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(parse(&["--model", "gpt-2", "q"]).config().is_err());
    }

    #[test]
    fn no_cache_uses_memory() {
        let config = parse(&["--no-cache", "q"]).config().unwrap();
        assert_eq!(config.cache, CacheMode::Memory);
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(parse(&["q"]).verbose), LevelFilter::WARN);
        assert_eq!(level_for(parse(&["-v", "q"]).verbose), LevelFilter::INFO);
        assert_eq!(level_for(parse(&["-vv", "q"]).verbose), LevelFilter::DEBUG);
        assert_eq!(level_for(parse(&["-vvvv", "q"]).verbose), LevelFilter::TRACE);
    }

    #[test]
    fn question_is_required() {
        assert!(Cli::try_parse_from(["gpt-search"]).is_err());
    }
}
