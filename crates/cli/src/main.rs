//! hunkmerge command-line tool.
//!
//! Parses conflict markers in files, and drives a merge session against a
//! Git working tree that is in the middle of `git merge`: inspect conflicts,
//! resolve files or hunks, then commit or abort the merge.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use hunkmerge_core::config::AppConfig;
use hunkmerge_core::{GitBackend, MergeDriver, MergeSession, Resolution};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// hunkmerge command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "hunkmerge",
    version,
    about = "Inspect and resolve merge conflicts hunk by hunk"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse conflict markers in files and list the hunks.
    Scan {
        /// Files to scan.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the conflicts of an in-progress merge.
    Status {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Print the reconstructed content of one conflicted file.
    Show {
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Conflicted file path, relative to the repository root.
        #[arg(long)]
        path: String,

        /// Resolve every hunk of the file this way before printing.
        #[arg(long)]
        accept: Option<Strategy>,
    },

    /// Resolve conflicts and optionally commit the merge.
    Resolve {
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Strategy to apply.
        #[arg(long, required_unless_present = "mark")]
        accept: Option<Strategy>,

        /// Files to resolve (default: every conflicted file).
        #[arg(long = "path")]
        paths: Vec<String>,

        /// Resolve a single hunk (requires exactly one --path).
        #[arg(long)]
        hunk: Option<String>,

        /// Force-mark the files resolved without choosing per-hunk content.
        #[arg(long, conflicts_with_all = ["accept", "hunk"])]
        mark: bool,

        /// Commit the merge once every file is resolved.
        #[arg(long)]
        commit: bool,

        /// Merge commit message (default from the config template).
        #[arg(short, long, requires = "commit")]
        message: Option<String>,
    },

    /// Abort the in-progress merge, discarding all resolutions.
    Abort {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./hunkmerge.toml")]
        output: PathBuf,
    },

    /// Validate the configuration file.
    Validate,
}

/// Resolution strategies accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    Ours,
    Theirs,
    Both,
}

impl From<Strategy> for Resolution {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Ours => Resolution::Ours,
            Strategy::Theirs => Resolution::Theirs,
            Strategy::Both => Resolution::Both,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { output } = &cli.command {
        init_logging(cli.log_level.as_deref(), "warn");
        return cmd_init(output);
    }

    let config_path = cli
        .config
        .clone()
        .or_else(AppConfig::default_path)
        .context("no configuration path given and no config directory found")?;

    if let Commands::Validate = cli.command {
        init_logging(cli.log_level.as_deref(), "warn");
        return cmd_validate(&config_path);
    }

    let config = AppConfig::load_and_resolve(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    init_logging(cli.log_level.as_deref(), &config.logging.level);
    debug!(path = %config_path.display(), mode = %config.parser.mode, "configuration loaded");

    match cli.command {
        Commands::Scan { files } => cmd_scan(&config, &files, cli.json),
        Commands::Status { repo } => cmd_status(&config, &repo, cli.json).await,
        Commands::Show { repo, path, accept } => cmd_show(&config, &repo, &path, accept).await,
        Commands::Resolve {
            repo,
            accept,
            paths,
            hunk,
            mark,
            commit,
            message,
        } => {
            let request = ResolveRequest {
                resolution: accept.map(Resolution::from),
                paths,
                hunk,
                mark,
                commit,
                message,
            };
            cmd_resolve(&config, &repo, request, cli.json).await
        }
        Commands::Abort { repo } => cmd_abort(&config, &repo).await,
        Commands::Init { .. } | Commands::Validate => unreachable!(),
    }
}

/// `RUST_LOG` wins, then `--log-level`, then the config value.
fn init_logging(cli_level: Option<&str>, config_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = cli_level.unwrap_or(config_level);
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

async fn open_driver(config: &AppConfig, repo: &Path) -> Result<MergeDriver<GitBackend>> {
    let backend = GitBackend::open(repo)
        .context("failed to open Git repository")?
        .with_author(config.commit_author());
    let mut driver = MergeDriver::new(backend, config.parser());
    driver.start().await.context("failed to load merge conflicts")?;
    Ok(driver)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# hunkmerge configuration

[parser]
# lenient: ignore stray markers, keep nested starts as content
# strict : reject malformed marker sequences
mode = "lenient"

[logging]
level = "warn"

[merge]
# {source} is replaced by the merge source (first line of MERGE_MSG)
message_template = "{source}"
fallback_source = "Merge incoming changes"
# author_name = "Merge Bot"
# author_email = "merge-bot@example.com"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;
    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    println!("  [OK] Environment overrides processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Parser mode     : {}", config.parser.mode);
    println!("  Log level       : {}", config.logging.level);
    println!("  Message template: {}", config.merge.message_template);
    println!(
        "  Commit author   : {}",
        config
            .commit_author()
            .map(|a| format!("{} <{}>", a.name, a.email))
            .unwrap_or_else(|| "repository default".to_string())
    );
    Ok(())
}

fn cmd_scan(config: &AppConfig, files: &[PathBuf], json: bool) -> Result<()> {
    let parser = config.parser();
    let mut scanned = Vec::new();

    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let display = path.display().to_string();
        let hunks = parser
            .detect_conflicts(&text, &display)
            .with_context(|| format!("failed to parse {}", display))?;
        scanned.push((display, hunks));
    }

    if json {
        let mut value = serde_json::Map::new();
        for (path, hunks) in &scanned {
            value.insert(path.clone(), serde_json::to_value(hunks)?);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let total: usize = scanned.iter().map(|(_, h)| h.len()).sum();
    if total == 0 {
        println!("{}", style::success("No conflict markers found"));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Hunk", "Lines", "Ours", "Base", "Theirs"]);

    for (path, hunks) in &scanned {
        for h in hunks {
            table.add_row(vec![
                Cell::new(path),
                Cell::new(&h.id),
                Cell::new(format!("{}-{}", h.start_line, h.end_line)),
                Cell::new(h.our_content.len()),
                Cell::new(
                    h.base_content
                        .as_ref()
                        .map(|b| b.len().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(h.their_content.len()),
            ]);
        }
    }

    println!("{}", table);
    println!("{} hunk(s) in {} file(s)", total, scanned.len());
    Ok(())
}

async fn cmd_status(config: &AppConfig, repo: &Path, json: bool) -> Result<()> {
    let driver = open_driver(config, repo).await?;
    let session = driver.session();

    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    print_session(session);
    Ok(())
}

async fn cmd_show(
    config: &AppConfig,
    repo: &Path,
    path: &str,
    accept: Option<Strategy>,
) -> Result<()> {
    let mut driver = open_driver(config, repo).await?;
    if let Some(strategy) = accept {
        driver
            .session_mut()
            .resolve_file(path, strategy.into())
            .context("failed to resolve file")?;
    }
    let content = driver
        .session()
        .resolved_content(path)
        .context("failed to reconstruct file")?;
    println!("{}", content);
    Ok(())
}

struct ResolveRequest {
    resolution: Option<Resolution>,
    paths: Vec<String>,
    hunk: Option<String>,
    mark: bool,
    commit: bool,
    message: Option<String>,
}

async fn cmd_resolve(
    config: &AppConfig,
    repo: &Path,
    request: ResolveRequest,
    json: bool,
) -> Result<()> {
    let mut driver = open_driver(config, repo).await?;

    let targets: Vec<String> = if request.paths.is_empty() {
        driver.session().files().map(|f| f.path().to_string()).collect()
    } else {
        request.paths.clone()
    };

    let session = driver.session_mut();
    match (&request.hunk, request.mark) {
        (Some(hunk_id), _) => {
            let [path] = targets.as_slice() else {
                anyhow::bail!("--hunk requires exactly one --path");
            };
            let resolution = request.resolution.clone().context("--accept is required")?;
            session
                .resolve_hunk(path, hunk_id, resolution)
                .context("failed to resolve hunk")?;
        }
        (None, true) => {
            for path in &targets {
                session
                    .mark_file_resolved(path)
                    .context("failed to mark file resolved")?;
            }
        }
        (None, false) => {
            let resolution = request.resolution.clone().context("--accept is required")?;
            for path in &targets {
                session
                    .resolve_file(path, resolution.clone())
                    .context("failed to resolve file")?;
            }
        }
    }

    if !request.commit {
        if json {
            println!("{}", serde_json::to_string_pretty(&driver.session().summary())?);
        } else {
            print_session(driver.session());
        }
        return Ok(());
    }

    let message = request
        .message
        .clone()
        .unwrap_or_else(|| config.commit_message(driver.session().merge_source()));
    let outcome = driver
        .complete(&message)
        .await
        .context("failed to complete merge")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "{}",
            style::success(&format!(
                "Merge committed as {} ({} file(s))",
                outcome.commit_id,
                outcome.merge.files.len()
            ))
        );
    }
    Ok(())
}

async fn cmd_abort(config: &AppConfig, repo: &Path) -> Result<()> {
    let mut driver = open_driver(config, repo).await?;
    let dropped = driver.abort().await.context("failed to abort merge")?;
    println!(
        "{}",
        style::success(&format!("Merge aborted ({} conflicted file(s) reset)", dropped))
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_session(session: &MergeSession) {
    let summary = session.summary();

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Merging {}",
            session.merge_source().unwrap_or("(unknown source)")
        ))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Hunks", "Unresolved", "Resolutions", "State"]);

    for file in session.files() {
        let resolutions = file
            .hunks()
            .iter()
            .map(|h| format!("{}={}", h.id, style::resolution(&h.resolution)))
            .collect::<Vec<_>>()
            .join(" ");
        let state = match (file.is_resolved(), file.is_force_resolved()) {
            (true, true) => "marked",
            (true, false) => "resolved",
            (false, _) => "conflicted",
        };
        table.add_row(vec![
            Cell::new(file.path()),
            Cell::new(file.hunks().len()),
            Cell::new(file.unresolved_count()),
            Cell::new(resolutions),
            Cell::new(state),
        ]);
    }

    println!("{}", table);
    println!();
    println!(
        "  Files resolved : {}/{}",
        summary.resolved_files, summary.files
    );
    println!("  Open conflicts : {}", summary.unresolved_hunks);
    if summary.can_complete {
        println!("{}", style::success("Ready to commit (use resolve --commit)"));
    } else {
        println!(
            "{}",
            style::warn(&format!("{} conflict(s) remain", summary.unresolved_hunks))
        );
    }
    println!("{}", style::dim("Resolutions are not saved between invocations."));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from([
            "hunkmerge", "resolve", "--accept", "theirs", "--path", "a.txt", "--commit", "-m", "Merge",
        ])
        .unwrap();
        match cli.command {
            Commands::Resolve { accept, paths, commit, message, .. } => {
                assert!(matches!(accept, Some(Strategy::Theirs)));
                assert_eq!(paths, vec!["a.txt"]);
                assert!(commit);
                assert_eq!(message.as_deref(), Some("Merge"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_mark_with_accept() {
        let result = Cli::try_parse_from(["hunkmerge", "resolve", "--mark", "--accept", "ours"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_requires_accept_or_mark() {
        assert!(Cli::try_parse_from(["hunkmerge", "resolve"]).is_err());
        assert!(Cli::try_parse_from(["hunkmerge", "resolve", "--mark"]).is_ok());
    }

    #[test]
    fn test_strategy_into_resolution() {
        assert_eq!(Resolution::from(Strategy::Both), Resolution::Both);
    }
}
