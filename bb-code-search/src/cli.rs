///
/// This module implements the CLI interface for bb-code-search: flag parsing, settings and
/// credential loading, pipeline invocation and result printing.
///
/// All core logic (data model, translation, pagination, HTTP clients) lives in the
/// [`bb-code-search-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: run the `bb-code-search` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a parsed [`Cli`].
///
/// [`bb-code-search-core`]: ../../bb-code-search-core/
use crate::load_config::{load_credentials, load_settings, resolve_workspace};
use crate::present::{render, OutputMode, NO_MATCHES};
use anyhow::Result;
use bb_code_search_core::bitbucket::BitbucketClient;
use bb_code_search_core::config::{
    SearchRequest, DEFAULT_MAX_PAGES, DEFAULT_MODEL, DEFAULT_NUM_CTX, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};
use bb_code_search_core::llm::LlmClient;
use bb_code_search_core::pipeline::{run_raw_search, run_search};
use clap::Parser;
use std::path::PathBuf;

/// CLI for bb-code-search: find code in a Bitbucket workspace from a plain-language prompt.
#[derive(Debug, Parser)]
#[clap(
    name = "bb-code-search",
    version,
    about = "Search a Bitbucket workspace's code with a natural-language prompt"
)]
pub struct Cli {
    /// What to look for, in plain language
    #[clap(long)]
    pub prompt: Option<String>,

    /// Bitbucket workspace name (falls back to WORKSPACE_NAME)
    #[clap(long)]
    pub workspace: Option<String>,

    /// LLM model to use
    #[clap(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Temperature for LLM generation, within [0, 2]
    #[clap(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Nucleus sampling for LLM generation, within [0, 1]
    #[clap(long = "top_p", default_value_t = DEFAULT_TOP_P)]
    pub top_p: f32,

    /// Upper bound on result pages fetched from Bitbucket
    #[clap(long = "max_pages", default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    /// Number of context tokens for the LLM
    #[clap(long = "n_ctx", default_value_t = DEFAULT_NUM_CTX)]
    pub n_ctx: u32,

    /// Logging level (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[clap(long = "log_level", default_value = "INFO")]
    pub log_level: String,

    /// Optional YAML settings file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Print only the matching file names
    #[clap(long = "names_only")]
    pub names_only: bool,

    /// Search the prompt verbatim and print highlighted matches
    #[clap(long)]
    pub debug: bool,

    /// Search the prompt verbatim and print results as JSON
    #[clap(long = "debug_json", conflicts_with = "debug")]
    pub debug_json: bool,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.debug_json {
            OutputMode::Json
        } else if self.names_only {
            OutputMode::NamesOnly
        } else {
            OutputMode::Matches {
                highlight: self.debug,
            }
        }
    }

    /// Whether the prompt is searched as-is instead of being translated.
    pub fn is_verbatim(&self) -> bool {
        self.debug || self.debug_json
    }
}

/// Maps a log level name to a tracing level. Python-style `WARNING` and `CRITICAL` are accepted.
pub fn parse_log_level(raw: &str) -> Option<tracing::Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(tracing::Level::WARN),
        "critical" | "fatal" => Some(tracing::Level::ERROR),
        other => other.parse().ok(),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("search_initialised");

    let settings = load_settings(cli.config.as_deref())?;
    let workspace = resolve_workspace(cli.workspace.as_deref())?;
    let request = SearchRequest::new(
        cli.prompt.clone().unwrap_or_default(),
        workspace,
        cli.model.clone(),
        cli.temperature,
        cli.top_p,
        cli.max_pages,
    )?;
    request.trace_loaded();
    let credentials = load_credentials()?;

    let backend = BitbucketClient::new(settings.bitbucket, request.workspace(), credentials)?;

    let report = if cli.is_verbatim() {
        run_raw_search(&backend, request.prompt(), request.max_pages()).await
    } else {
        let llm = LlmClient::new(settings.llm)?;
        run_search(
            &request,
            &settings.template,
            Some(cli.n_ctx),
            &llm,
            &backend,
        )
        .await?
    };

    tracing::info!(
        search_query = %report.query.search_query(),
        max_pages = report.query.max_pages,
        template_version = report.template_version.as_deref().unwrap_or("<verbatim>"),
        pages_fetched = report.outcome.pages_fetched,
        hits = report.outcome.hits.len(),
        "Search finished"
    );

    // No placeholder for a search that stopped on an error.
    let rendered = render(&report.outcome.hits, cli.output_mode())?;
    if report.outcome.is_complete() || rendered != NO_MATCHES {
        println!("{rendered}");
    }

    match report.outcome.error {
        Some(e) => {
            tracing::error!(error = %e, "Search stopped early; partial results printed");
            let pages_ok = report.outcome.pages_fetched.saturating_sub(1);
            Err(anyhow::Error::new(e).context(format!(
                "search stopped after {pages_ok} successful page(s), {} hit(s) printed",
                report.outcome.hits.len()
            )))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::parse_from(["bb-code-search", "--prompt", "find ABCD"]);
        assert_eq!(cli.model, "llama3.3");
        assert_eq!(cli.temperature, 0.2);
        assert_eq!(cli.top_p, 1.0);
        assert_eq!(cli.max_pages, 100);
        assert_eq!(cli.n_ctx, 8192);
        assert_eq!(cli.output_mode(), OutputMode::Matches { highlight: false });
        assert!(!cli.is_verbatim());
    }

    #[test]
    fn underscore_flags_are_accepted() {
        let cli = Cli::parse_from([
            "bb-code-search",
            "--prompt",
            "x",
            "--top_p",
            "0.9",
            "--max_pages",
            "3",
            "--n_ctx",
            "4096",
            "--log_level",
            "DEBUG",
            "--names_only",
        ]);
        assert_eq!(cli.top_p, 0.9);
        assert_eq!(cli.max_pages, 3);
        assert_eq!(cli.n_ctx, 4096);
        assert_eq!(cli.output_mode(), OutputMode::NamesOnly);
    }

    #[test]
    fn debug_modes_are_verbatim() {
        let cli = Cli::parse_from(["bb-code-search", "--prompt", "x", "--debug"]);
        assert!(cli.is_verbatim());
        assert_eq!(cli.output_mode(), OutputMode::Matches { highlight: true });

        let cli = Cli::parse_from(["bb-code-search", "--prompt", "x", "--debug_json"]);
        assert_eq!(cli.output_mode(), OutputMode::Json);

        assert!(Cli::try_parse_from(["bb-code-search", "--debug", "--debug_json"]).is_err());
    }

    #[test]
    fn log_levels_accept_python_names() {
        assert_eq!(parse_log_level("WARNING"), Some(tracing::Level::WARN));
        assert_eq!(parse_log_level("CRITICAL"), Some(tracing::Level::ERROR));
        assert_eq!(parse_log_level("debug"), Some(tracing::Level::DEBUG));
        assert_eq!(parse_log_level("loud"), None);
    }
}
