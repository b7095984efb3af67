//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use fathom_core::pipeline::{
    ProgressReporter, ResearchPhase, ResearchPipeline, SearchOptions, SilentProgress,
};
use fathom_provider::{LanguageModel, OpenRouterClient};
use fathom_shared::{
    AppConfig, ChatTurn, ResearchRequest, SearchMode, SearchResult, init_config, load_config,
    validate_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Fathom — research any topic with a language model and the open web.
#[derive(Parser)]
#[command(
    name = "fathom",
    version,
    about = "Plan multi-step research reports or search and summarize the web.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Produce a structured research report on a topic.
    Research {
        /// Research topic.
        topic: String,
    },

    /// Retrieve web sources for a query and summarize them.
    Search {
        /// Search query.
        query: String,

        /// Analysis depth: quick, comprehensive, or exploratory.
        #[arg(short, long)]
        mode: Option<SearchMode>,

        /// Number of sources to return (1-10).
        #[arg(long)]
        max_sources: Option<usize>,

        /// Smaller batches and looser content thresholds.
        #[arg(long, overrides_with = "no_fast")]
        fast: bool,

        /// Disable fast mode even when the config enables it.
        #[arg(long, overrides_with = "fast")]
        no_fast: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Re-summarize previously fetched search results.
    Summarize {
        /// Query the results were fetched for.
        query: String,

        /// JSON file with `{summary, sources, totalPages}`.
        #[arg(long)]
        results: PathBuf,

        /// Analysis depth: quick, comprehensive, or exploratory.
        #[arg(short, long)]
        mode: Option<SearchMode>,
    },

    /// Ask a question, optionally continuing an earlier conversation.
    Chat {
        /// Message to send.
        message: String,

        /// JSON file with prior turns (`[{isUser, content}]`).
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Process a JSON request envelope and print the JSON response.
    Request {
        /// Request file (reads stdin when omitted).
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "fathom=info",
        1 => "fathom=debug",
        _ => "fathom=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Research { topic } => cmd_research(&topic).await,
        Command::Search {
            query,
            mode,
            max_sources,
            fast,
            no_fast,
            json,
        } => cmd_search(&query, mode, max_sources, fast_override(fast, no_fast), json).await,
        Command::Summarize {
            query,
            results,
            mode,
        } => cmd_summarize(&query, &results, mode).await,
        Command::Chat { message, history } => cmd_chat(&message, history.as_deref()).await,
        Command::Request { file } => cmd_request(file.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Explicit fast-mode choice from the `--fast`/`--no-fast` pair, if any.
fn fast_override(fast: bool, no_fast: bool) -> Option<bool> {
    match (fast, no_fast) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Load config, check the API key, and build a pipeline around OpenRouter.
fn build_pipeline(require_key: bool) -> Result<ResearchPipeline> {
    let config = load_config()?;
    if require_key {
        validate_api_key(&config)?;
    }

    let client = OpenRouterClient::from_env(&config.openrouter)?;
    info!(model = client.model_name(), "using language model");
    let model: Arc<dyn LanguageModel> = Arc::new(client);

    Ok(ResearchPipeline::from_config(model, &config))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("invalid JSON in {}", path.display()))
}

fn print_search_result(result: &SearchResult) {
    println!();
    println!("{}", result.summary);
    println!();
    println!("  Sources ({}):", result.total_pages);
    for (i, source) in result.sources.iter().enumerate() {
        let marker = if source.synthetic { " (synthesized)" } else { "" };
        println!("  [{}] {}{marker}", i + 1, source.title);
        println!("      {}", source.url);
    }
    println!();
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_research(topic: &str) -> Result<()> {
    let pipeline = build_pipeline(true)?;
    info!(topic, "starting research");

    let reporter = CliProgress::new();
    let report = pipeline.deep_research(topic, &reporter).await?;

    println!();
    println!("{report}");
    println!();
    Ok(())
}

async fn cmd_search(
    query: &str,
    mode: Option<SearchMode>,
    max_sources: Option<usize>,
    fast: Option<bool>,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(true)?;
    let defaults = SearchOptions::defaults(pipeline.config());
    let options = SearchOptions {
        mode: mode.unwrap_or(defaults.mode),
        max_sources: max_sources.unwrap_or(defaults.max_sources),
        fast: fast.unwrap_or(defaults.fast),
    };

    info!(
        query,
        mode = %options.mode,
        max_sources = options.max_sources,
        fast = options.fast,
        "searching"
    );

    let result = if json {
        pipeline.web_search(query, options, &SilentProgress).await?
    } else {
        let reporter = CliProgress::new();
        pipeline.web_search(query, options, &reporter).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_search_result(&result);
    }
    Ok(())
}

async fn cmd_summarize(query: &str, results: &Path, mode: Option<SearchMode>) -> Result<()> {
    let pipeline = build_pipeline(true)?;
    let fetched: SearchResult = read_json_file(results)?;
    let mode = mode.unwrap_or(pipeline.config().default_search_mode);

    info!(query, sources = fetched.sources.len(), %mode, "summarizing saved results");

    let reporter = CliProgress::new();
    let result = pipeline
        .summarize_results(query, fetched, mode, &reporter)
        .await?;

    print_search_result(&result);
    Ok(())
}

async fn cmd_chat(message: &str, history: Option<&Path>) -> Result<()> {
    let pipeline = build_pipeline(true)?;
    let turns: Vec<ChatTurn> = match history {
        Some(path) => read_json_file(path)?,
        None => Vec::new(),
    };

    let reporter = CliProgress::new();
    let reply = pipeline.chat(message, &turns, &reporter).await?;

    println!();
    println!("{reply}");
    println!();
    Ok(())
}

async fn cmd_request(file: Option<&Path>) -> Result<()> {
    let request: ResearchRequest = match file {
        Some(path) => read_json_file(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("failed to read request from stdin")?;
            serde_json::from_str(&buf).wrap_err("invalid JSON request on stdin")?
        }
    };

    // Provider problems are reported inside the response envelope.
    let pipeline = build_pipeline(false)?;
    let response = pipeline.respond(&request, &SilentProgress).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        return Err(eyre!("request failed; see the error field in the response"));
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: ResearchPhase) {
        self.spinner.set_message(phase.to_string());
    }

    fn subtask_finished(&self, task_id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Executing subtasks [{current}/{total}] finished {task_id}"));
    }

    fn done(&self, _elapsed: Duration) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
