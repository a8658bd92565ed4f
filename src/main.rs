use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paper_relay::config::{default_config_path, find_config_file, load_config, ENV_PREFIX};
use paper_relay::diagnostics::probe;
use paper_relay::export::{write_csv, write_text, ResultSet};
use paper_relay::models::{MatchMode, PaperRecord, SearchCriteria};
use paper_relay::ui::{self, SortKey, Status};
use paper_relay::utils::validate_url;
use paper_relay::{
    BackendConfig, BackendMode, DownloadOrchestrator, NetworkProfile, RequestExecutor,
    SearchOrchestrator, SettingsFile,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// paper-relay - Search arXiv and batch-download papers, directly or through a relay server
#[derive(Parser, Debug)]
#[command(name = "paper-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search arXiv and batch-download papers, directly or through a relay server", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend mode for this invocation (overrides the settings file)
    #[arg(long, value_enum, global = true)]
    mode: Option<ModeArg>,

    /// Relay server profile for this invocation (overrides the settings file)
    #[arg(long, value_enum, global = true)]
    profile: Option<ProfileArg>,

    /// Request timeout in seconds (clamped to 5-120)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    /// Call the public arXiv API
    Direct,
    /// Call the configured relay server
    Proxied,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ProfileArg {
    Local,
    External,
}

/// Client-side ordering of displayed results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    /// Keep the backend's order (newest submissions first)
    Default,
    /// Sort by title
    Title,
    /// Sort by publication date
    Date,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for papers by keyword
    #[command(alias = "s")]
    Search {
        /// Keywords; every keyword must match
        #[arg(required = true, num_args = 1..)]
        keywords: Vec<String>,

        /// Match keywords in the title OR the abstract instead of both
        #[arg(long)]
        fuzzy: bool,

        /// First submission year (inclusive)
        #[arg(long)]
        start_year: Option<u16>,

        /// Last submission year (inclusive)
        #[arg(long)]
        end_year: Option<u16>,

        /// Maximum number of results (1-1000)
        #[arg(long, short, default_value_t = 100, value_parser = clap::value_parser!(u16).range(1..=1000))]
        max_results: u16,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Auto)]
        output: OutputFormat,

        /// Sort displayed results
        #[arg(long, value_enum, default_value_t = SortField::Default)]
        sort: SortField,

        /// Reverse the sort order
        #[arg(long)]
        desc: bool,

        /// Save the result set as JSON (input for `download --from`)
        #[arg(long)]
        save: Option<PathBuf>,

        /// Export results as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Export results as a plain-text report
        #[arg(long)]
        text: Option<PathBuf>,

        /// Download a selection of the results right away (e.g. "1,3-5" or "all")
        #[arg(long, value_name = "SELECTION")]
        download: Option<String>,

        /// Download directory (defaults to the configured one)
        #[arg(long, requires = "download")]
        dir: Option<PathBuf>,
    },

    /// Download papers from a saved result set
    #[command(alias = "d")]
    Download {
        /// Result set written by `search --save`
        #[arg(long)]
        from: PathBuf,

        /// Which results to download (e.g. "1,3-5" or "all")
        #[arg(long, default_value = "all")]
        select: String,

        /// Download directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Show or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that the configured backend is reachable
    #[command(alias = "diag")]
    Doctor {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings (API keys masked)
    Show,
    /// Print the settings file path
    Path,
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Change one setting, e.g. `config set mode direct` or `config set server.api_key KEY`
    Set { key: String, value: String },
}

/// Print all supported environment variables.
fn print_env_vars() {
    println!("paper-relay - Environment Variables");
    println!();
    println!("Backend:");
    println!("  {ENV_PREFIX}__BACKEND__MODE               direct | proxied (default: proxied)");
    println!("  {ENV_PREFIX}__BACKEND__NETWORK_PROFILE    local | external (default: local)");
    println!("  {ENV_PREFIX}__BACKEND__TIMEOUT_SECONDS    Request timeout, 5-120 (default: 30)");
    println!("  {ENV_PREFIX}__BACKEND__REQUEST_DELAY_MS   Pause between downloads (default: 1000)");
    println!("  {ENV_PREFIX}__BACKEND__DIRECT_ENDPOINT    Alternative arXiv query endpoint");
    println!();
    println!("Relay servers:");
    println!("  {ENV_PREFIX}__SERVERS__LOCAL__URL         (default: http://127.0.0.1:5000)");
    println!("  {ENV_PREFIX}__SERVERS__LOCAL__API_KEY");
    println!("  {ENV_PREFIX}__SERVERS__EXTERNAL__URL      (default: http://example.com:80)");
    println!("  {ENV_PREFIX}__SERVERS__EXTERNAL__API_KEY");
    println!();
    println!("Downloads and logging:");
    println!("  {ENV_PREFIX}__DOWNLOADS__DIRECTORY        (default: ./papers)");
    println!("  {ENV_PREFIX}__LOGGING__LEVEL              (default: info)");
    println!("  RUST_LOG                                  Overrides the log filter entirely");
    println!();
    println!("Proxy:");
    println!("  HTTP_PROXY / HTTPS_PROXY / NO_PROXY       Standard proxy settings");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
        if cli.command.is_none() {
            return Ok(());
        }
    }

    let config_path = cli
        .config
        .clone()
        .or_else(find_config_file)
        .unwrap_or_else(default_config_path);
    let mut settings = load_config(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path.display()))?;
    apply_overrides(&mut settings, &cli);

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => settings.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_relay={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if config_path.is_file() {
        tracing::debug!("Using config file: {}", config_path.display());
    }

    // Ctrl-C cancels whatever is in flight
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let executor = RequestExecutor::new().context("Failed to create HTTP client")?;
    let backend = settings.backend_config();

    match cli.command {
        Some(Commands::Search {
            keywords,
            fuzzy,
            start_year,
            end_year,
            max_results,
            output,
            sort,
            desc,
            save,
            csv,
            text,
            download,
            dir,
        }) => {
            let mut criteria = SearchCriteria::from_tokens(&keywords)
                .match_mode(if fuzzy { MatchMode::Any } else { MatchMode::All })
                .max_results(usize::from(max_results));
            if let Some(year) = start_year {
                criteria = criteria.start_year(year);
            }
            if let Some(year) = end_year {
                criteria = criteria.end_year(year);
            }

            let spinner = if cli.quiet || !ui::is_terminal() {
                ui::Spinner::hidden()
            } else {
                ui::Spinner::new(&format!("Searching via {}", backend.describe()))
            };

            let started = Instant::now();
            let result = SearchOrchestrator::new(executor.clone())
                .search_with_cancel(&criteria, &backend, &cancel)
                .await;
            spinner.finish();

            let mut papers = result.context("Search failed")?;
            ui::sort_records(&mut papers, sort_key(sort), desc);

            let format = resolve_format(output);
            if format == OutputFormat::Table && !cli.quiet {
                ui::print_search_header(&criteria.keyword_line(), papers.len(), started.elapsed());
            }
            output_papers(&papers, format);

            if let Some(path) = save {
                ResultSet::new(Some(criteria.clone()), papers.clone())
                    .save(&path)
                    .with_context(|| format!("Failed to save results to {}", path.display()))?;
                report_saved(cli.quiet, "results", &path);
            }
            export_results(&papers, csv.as_deref(), text.as_deref(), cli.quiet)?;

            if let Some(selection) = download {
                let selected = select_papers(&papers, &selection)?;
                let dir = dir.unwrap_or_else(|| settings.downloads.directory.clone());
                run_download(&executor, &selected, &dir, &backend, &cancel, cli.quiet).await?;
            }
        }

        Some(Commands::Download { from, select, dir }) => {
            let set = ResultSet::load(&from)
                .with_context(|| format!("Failed to read result set {}", from.display()))?;
            let selected = select_papers(&set.papers, &select)?;
            let dir = dir.unwrap_or_else(|| settings.downloads.directory.clone());
            run_download(&executor, &selected, &dir, &backend, &cancel, cli.quiet).await?;
        }

        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => {
                let mut shown = settings.clone();
                mask_key(&mut shown.servers.local.api_key);
                mask_key(&mut shown.servers.external.api_key);
                println!("# {}", config_path.display());
                println!("{}", toml::to_string_pretty(&shown)?);
                println!("# active backend: {}", backend.describe());
            }
            ConfigAction::Path => {
                println!("{}", config_path.display());
            }
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                SettingsFile::default().save(&config_path)?;
                report_saved(cli.quiet, "settings", &config_path);
            }
            ConfigAction::Set { key, value } => {
                let mut file = if config_path.is_file() {
                    SettingsFile::load(&config_path)?
                } else {
                    SettingsFile::default()
                };
                if (key.ends_with("url") || key.ends_with("endpoint")) && !value.trim().is_empty() {
                    validate_url(&value)?;
                }
                file.set(&key, &value)?;
                file.save(&config_path)?;
                if !cli.quiet {
                    ui::print_status(
                        Status::Success,
                        &format!("Set {} in {}", key, config_path.display()),
                    );
                }
            }
        },

        Some(Commands::Doctor { json }) => {
            let report = probe(&executor, &backend, &cancel).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ui::print_probe_report(&report);
            }
            if !report.reachable {
                bail!("{} is unreachable: {}", report.target, report.detail);
            }
        }

        None => {
            println!("paper-relay {}", paper_relay::VERSION);
            println!("Active backend: {}", backend.describe());
            println!();
            println!("Run `paper-relay --help` for usage.");
        }
    }

    Ok(())
}

/// Fold command-line overrides into the loaded settings
fn apply_overrides(settings: &mut SettingsFile, cli: &Cli) {
    if let Some(mode) = cli.mode {
        settings.backend.mode = match mode {
            ModeArg::Direct => BackendMode::Direct,
            ModeArg::Proxied => BackendMode::Proxied,
        };
    }
    if let Some(profile) = cli.profile {
        settings.backend.network_profile = match profile {
            ProfileArg::Local => NetworkProfile::Local,
            ProfileArg::External => NetworkProfile::External,
        };
    }
    if let Some(timeout) = cli.timeout {
        settings.backend.timeout_seconds = timeout;
    }
    settings.normalize();
}

fn sort_key(field: SortField) -> SortKey {
    match field {
        SortField::Default => SortKey::Default,
        SortField::Title => SortKey::Title,
        SortField::Date => SortKey::Date,
    }
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if ui::is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn output_papers(papers: &[PaperRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(papers) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize results: {}", e),
        },
        OutputFormat::Plain => ui::print_plain(papers),
        OutputFormat::Table | OutputFormat::Auto => {
            if papers.is_empty() {
                ui::print_status(Status::Info, "No matching papers");
            } else {
                println!("{}", ui::paper_table(papers));
            }
        }
    }
}

/// Write the requested CSV and text exports; nothing is written for an empty result
fn export_results(
    papers: &[PaperRecord],
    csv: Option<&Path>,
    text: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    if papers.is_empty() {
        if (csv.is_some() || text.is_some()) && !quiet {
            ui::print_status(Status::Info, "No results to export");
        }
        return Ok(());
    }

    if let Some(path) = csv {
        write_csv(path, papers)
            .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
        report_saved(quiet, "CSV", path);
    }
    if let Some(path) = text {
        write_text(path, papers)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        report_saved(quiet, "report", path);
    }
    Ok(())
}

fn select_papers(papers: &[PaperRecord], selection: &str) -> Result<Vec<PaperRecord>> {
    let indexes = ui::parse_selection(selection, papers.len())?;
    Ok(indexes.into_iter().map(|i| papers[i].clone()).collect())
}

async fn run_download(
    executor: &RequestExecutor,
    papers: &[PaperRecord],
    dir: &Path,
    backend: &BackendConfig,
    cancel: &CancellationToken,
    quiet: bool,
) -> Result<()> {
    if !quiet {
        ui::print_status(
            Status::Download,
            &format!(
                "Downloading {} papers to {} via {}",
                papers.len(),
                dir.display(),
                backend.describe()
            ),
        );
    }

    let progress = if quiet || !ui::is_terminal() {
        ui::DownloadProgress::hidden()
    } else {
        ui::DownloadProgress::new(papers.len())
    };

    let report = DownloadOrchestrator::new(executor.clone())
        .download_batch_observed(papers, dir, backend, cancel, &progress)
        .await;
    progress.finish();

    if !ui::is_terminal() && !quiet {
        for outcome in &report.outcomes {
            eprintln!("{}", ui::outcome_line(outcome));
        }
    }
    ui::print_batch_summary(&report);

    if report.is_failure() && report.requested > 0 {
        bail!("no papers were downloaded ({})", report.summary());
    }
    Ok(())
}

fn report_saved(quiet: bool, what: &str, path: &Path) {
    if !quiet {
        ui::print_status(
            Status::Success,
            &format!("Saved {} to {}", what, path.display()),
        );
    }
}

fn mask_key(key: &mut String) {
    if !key.is_empty() {
        *key = "********".to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "paper-relay",
            "--mode",
            "direct",
            "search",
            "graph",
            "networks",
            "--fuzzy",
            "--start-year",
            "2015",
            "-m",
            "20",
        ])
        .unwrap();

        assert_eq!(cli.mode, Some(ModeArg::Direct));
        match cli.command {
            Some(Commands::Search {
                keywords,
                fuzzy,
                start_year,
                max_results,
                ..
            }) => {
                assert_eq!(keywords, vec!["graph", "networks"]);
                assert!(fuzzy);
                assert_eq!(start_year, Some(2015));
                assert_eq!(max_results, 20);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_max_results_range_enforced() {
        assert!(Cli::try_parse_from(["paper-relay", "search", "x", "-m", "0"]).is_err());
        assert!(Cli::try_parse_from(["paper-relay", "search", "x", "-m", "1001"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "paper-relay",
            "--mode",
            "direct",
            "--profile",
            "external",
            "--timeout",
            "500",
            "doctor",
        ])
        .unwrap();

        let mut settings = SettingsFile::default();
        apply_overrides(&mut settings, &cli);
        assert_eq!(settings.backend.mode, BackendMode::Direct);
        assert_eq!(settings.backend.network_profile, NetworkProfile::External);
        assert_eq!(settings.backend.timeout_seconds, 120);
        assert!(settings.backend_config().api_key().is_empty());
    }

    #[test]
    fn test_export_skips_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("out.csv");
        let text = dir.path().join("out.txt");

        export_results(&[], Some(&csv), Some(&text), true).unwrap();
        assert!(!csv.exists());
        assert!(!text.exists());

        let papers = vec![paper_relay::models::PaperRecordBuilder::new(
            "http://arxiv.org/abs/2301.00001v1",
            "Graph Networks",
        )
        .build()];
        export_results(&papers, Some(&csv), Some(&text), true).unwrap();
        assert!(csv.exists());
        assert!(text.exists());
    }

    #[test]
    fn test_mask_key() {
        let mut key = "secret".to_string();
        mask_key(&mut key);
        assert_eq!(key, "********");

        let mut empty = String::new();
        mask_key(&mut empty);
        assert!(empty.is_empty());
    }
}
