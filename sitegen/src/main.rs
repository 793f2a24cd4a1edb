use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sitegen::stubs::{StubMode, export_stubs};
use sitegen::tree_assembly::tree_json;
use sitegen::tree_text::tree_lines;
use sitegen::{Overrides, Settings, build_site, load_forest};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rulenavi")]
#[command(about = "Build the backend-free rule navigator site")]
struct Cli {
    /// Settings file (default: rulenavi.toml found by walking up from the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// SQLite database with the category/rule/chapter tables
    #[arg(long, conflicts_with = "rows")]
    database: Option<PathBuf>,

    /// JSON array of flat rows
    #[arg(long)]
    rows: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TreeFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the tree, convert body documents and write all pages
    Build {
        /// Directory for the HTML pages and assets
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Document root holding one directory per tree node
        #[arg(long)]
        build_dir: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Assemble the tree only and print or save it
    Tree {
        #[arg(long, value_enum, default_value = "json")]
        format: TreeFormat,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Write Markdown body documents for every rule and chapter in the database
    Stubs {
        /// Replace documents that already exist
        #[arg(long, conflicts_with = "check_only")]
        overwrite: bool,

        /// Only report which documents exist
        #[arg(long)]
        check_only: bool,

        /// SQLite database with the category/rule/chapter tables
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn resolve_settings(cwd: &Path, config: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    Settings::discover(cwd, config, overrides).context("Failed to resolve settings")
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    match cli.command {
        Commands::Build {
            out_dir,
            build_dir,
            source,
        } => {
            let overrides = Overrides {
                out_dir,
                build_dir,
                database: source.database,
                rows: source.rows,
            };
            let settings = resolve_settings(&cwd, cli.config.as_deref(), &overrides)?;
            let report = build_site(&settings).context("Build failed")?;
            println!("{report}");
            for path in &report.decode_failures {
                println!("could not decode: {}", path.display());
            }
        }
        Commands::Tree {
            format,
            out,
            source,
        } => {
            let overrides = Overrides {
                database: source.database,
                rows: source.rows,
                ..Overrides::default()
            };
            let settings = resolve_settings(&cwd, cli.config.as_deref(), &overrides)?;
            let (_, forest) = load_forest(&settings).context("Failed to assemble tree")?;
            let mut text = match format {
                TreeFormat::Json => tree_json(&forest)?,
                TreeFormat::Text => tree_lines(&forest).join("\n"),
            };
            text.push('\n');

            match out {
                Some(path) => {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("Failed to create {}", parent.display()))?;
                    }
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Wrote: {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::Stubs {
            overwrite,
            check_only,
            database,
        } => {
            let overrides = Overrides {
                database,
                ..Overrides::default()
            };
            let settings = resolve_settings(&cwd, cli.config.as_deref(), &overrides)?;
            let mode = if check_only {
                StubMode::CheckOnly
            } else if overwrite {
                StubMode::Overwrite
            } else {
                StubMode::Create
            };
            let report = export_stubs(&settings, mode).context("Stub export failed")?;

            println!("DB      : {}", settings.source.path().display());
            println!("OUT_ROOT: {}", settings.build_dir.display());
            println!("MD_NAME : {}", settings.body_filename);
            println!();
            for line in report.tree_lines() {
                println!("{line}");
            }
            println!();
            println!("Summary: OK={}, NG={}", report.ok(), report.failed());
            if report.failed() > 0 {
                anyhow::bail!("{} body documents missing or failed", report.failed());
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }
}
