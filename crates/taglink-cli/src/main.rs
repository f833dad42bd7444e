//! Taglink CLI
//!
//! Keeps a directory of Markdown notes cross-linked by tag:
//! - `--init <DIR>` / `sync <DIR>`: full synchronization pass
//! - `rename`: rename a tag across documents, link list and index
//! - `update`: re-synchronize a single document
//! - `origin` / `check`: inspect where a tag lives and whether it is listed
//!
//! Errors are printed as `Error: <message>` on stdout. The exit status stays
//! 0 unless `--strict` is given.

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use taglink_core::{BacklinkStyle, CorpusStore, PassReport, SyncConfig};
use tracing::Level;

#[derive(Parser)]
#[command(name = "taglink")]
#[command(
    author,
    version,
    about = "Taglink: keep Markdown notes cross-linked by tag"
)]
struct Cli {
    /// Run a full synchronization pass over DIR (same as `sync DIR`).
    #[arg(long, value_name = "DIR")]
    init: Option<PathBuf>,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalArgs {
    /// More log output (repeat for debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Exit with status 1 when an operation fails.
    #[arg(long, global = true)]
    strict: bool,

    /// Link-list file name, relative to DIR.
    #[arg(long, global = true, value_name = "NAME")]
    linklist: Option<String>,

    /// Index file name, relative to DIR.
    #[arg(long, global = true, value_name = "NAME")]
    index: Option<String>,

    /// Back-link style in the link list: none, plain or timestamped.
    #[arg(long, global = true, value_name = "STYLE")]
    backlinks: Option<BacklinkStyle>,

    /// Only look at documents directly inside DIR.
    #[arg(long, global = true)]
    no_recursive: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Declare, index and link every document under DIR.
    Sync {
        dir: PathBuf,
    },

    /// Rename a tag everywhere. Nothing is written if the rename cannot
    /// complete.
    Rename {
        dir: PathBuf,
        old: String,
        new: String,
    },

    /// Re-synchronize one document against the existing index.
    Update {
        dir: PathBuf,
        /// Document path, relative to DIR or absolute.
        file: PathBuf,
    },

    /// Print the document a tag's links point at.
    Origin {
        dir: PathBuf,
        tag: String,
    },

    /// Report which tags the link list already contains.
    Check {
        dir: PathBuf,
        #[arg(required = true)]
        tags: Vec<String>,
    },
}

fn init_logging(args: &GlobalArgs) {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn open_store(dir: &Path, args: &GlobalArgs) -> Result<CorpusStore> {
    let mut config = SyncConfig::load(dir)
        .with_context(|| format!("loading configuration under {}", dir.display()))?;
    if let Some(name) = &args.linklist {
        config.linklist_name = name.clone();
    }
    if let Some(name) = &args.index {
        config.index_name = name.clone();
    }
    if let Some(style) = args.backlinks {
        config.backlinks = style;
    }
    if args.no_recursive {
        config.recursive = false;
    }
    Ok(CorpusStore::new(config))
}

fn print_report(verb: &str, report: &PassReport, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!(
        "{} {} documents, {} tags, {} new links",
        verb.green().bold(),
        report.documents,
        report.tags,
        report.links_added
    );
    for warning in &report.warnings {
        eprintln!("  {} {}", "warning:".yellow().bold(), warning);
    }
}

fn cmd_sync(dir: &Path, args: &GlobalArgs) -> Result<()> {
    let store = open_store(dir, args)?;
    let report = store.sync()?;
    print_report("synced", &report, args.quiet);
    Ok(())
}

fn cmd_rename(dir: &Path, old: &str, new: &str, args: &GlobalArgs) -> Result<()> {
    let store = open_store(dir, args)?;
    let report = store.rename(old, new)?;
    if !args.quiet {
        eprintln!(
            "{} '{}' -> '{}' in {} documents",
            "renamed".green().bold(),
            report.old,
            report.new.bold(),
            report.documents_changed.len()
        );
    }
    Ok(())
}

fn cmd_update(dir: &Path, file: &Path, args: &GlobalArgs) -> Result<()> {
    let store = open_store(dir, args)?;
    let report = store.update(file)?;
    print_report("updated", &report, args.quiet);
    Ok(())
}

fn cmd_origin(dir: &Path, tag: &str, args: &GlobalArgs) -> Result<()> {
    let store = open_store(dir, args)?;
    println!("{}", store.origin(tag)?);
    Ok(())
}

fn cmd_check(dir: &Path, tags: &[String], args: &GlobalArgs) -> Result<()> {
    let store = open_store(dir, args)?;
    let found = store.check_list(tags)?;
    for tag in tags {
        if found.contains(tag) {
            println!("{} {}", "listed ".green(), tag);
        } else {
            println!("{} {}", "missing".red(), tag);
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let args = &cli.global;
    match (&cli.init, &cli.command) {
        (Some(_), Some(_)) => Err(anyhow!("--init cannot be combined with a subcommand")),
        (Some(dir), None) => cmd_sync(dir, args),
        (None, Some(Commands::Sync { dir })) => cmd_sync(dir, args),
        (None, Some(Commands::Rename { dir, old, new })) => cmd_rename(dir, old, new, args),
        (None, Some(Commands::Update { dir, file })) => cmd_update(dir, file, args),
        (None, Some(Commands::Origin { dir, tag })) => cmd_origin(dir, tag, args),
        (None, Some(Commands::Check { dir, tags })) => cmd_check(dir, tags, args),
        (None, None) => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("Error: {err:#}");
            if cli.global.strict {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
