//! Twig CLI - a small git-compatible object store and clone client.

use clap::{ArgGroup, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{CatFileMode, Result};
use config::Config;

/// Twig - git objects and HTTP cloning
#[derive(Parser, Debug)]
#[command(name = "twig")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Show the content, kind, or size of an object
    #[command(group(ArgGroup::new("mode").required(true).args(["pretty", "kind", "size"])))]
    CatFile {
        /// Print the payload
        #[arg(short = 'p')]
        pretty: bool,
        /// Print the object kind
        #[arg(short = 't')]
        kind: bool,
        /// Print the payload size
        #[arg(short = 's')]
        size: bool,
        /// Object id
        object: String,
    },

    /// Compute the blob id of a file
    HashObject {
        /// Store the blob in the repository
        #[arg(short = 'w')]
        write: bool,
        /// File to hash
        file: PathBuf,
    },

    /// List the entries of a tree
    LsTree {
        /// Print entry names only
        #[arg(long)]
        name_only: bool,
        /// Tree or commit id
        object: String,
    },

    /// Store the work tree as tree objects
    WriteTree,

    /// Create a commit from a tree
    CommitTree {
        /// Tree id
        tree: String,
        /// Parent commit id
        #[arg(short = 'p', value_name = "PARENT")]
        parent: Option<String>,
        /// Commit message
        #[arg(short = 'm', value_name = "MESSAGE")]
        message: String,
        /// Commit time in seconds since the Unix epoch
        #[arg(long, value_name = "SECONDS")]
        date: Option<i64>,
    },

    /// Clone a repository over HTTP
    Clone {
        /// Remote URL
        url: String,
        /// Destination directory
        dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("twig_cli={log_level},twig_storage={log_level},twig_git={log_level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let cwd = std::env::current_dir()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Init { path } => {
            commands::init(&cwd.join(path.unwrap_or_default()), &mut out)?;
        }
        Commands::CatFile {
            kind, size, object, ..
        } => {
            let mode = if kind {
                CatFileMode::Kind
            } else if size {
                CatFileMode::Size
            } else {
                CatFileMode::Pretty
            };
            commands::cat_file(&cwd, &config, mode, &object, &mut out)?;
        }
        Commands::HashObject { write, file } => {
            commands::hash_object(&cwd, &config, &file, write, &mut out)?;
        }
        Commands::LsTree { name_only, object } => {
            commands::ls_tree(&cwd, &config, &object, name_only, &mut out)?;
        }
        Commands::WriteTree => commands::write_tree(&cwd, &config, &mut out)?,
        Commands::CommitTree {
            tree,
            parent,
            message,
            date,
        } => {
            commands::commit_tree(
                &cwd,
                &config,
                &tree,
                parent.as_deref(),
                &message,
                date,
                &mut out,
            )?;
        }
        Commands::Clone { url, dir } => {
            commands::clone(&cwd, &config, &url, dir.as_deref(), &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
