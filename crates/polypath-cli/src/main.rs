//! polypath-cli - Command-line interface for polypath
//!
//! One set of file commands for every backend polypath knows:
//! - Local paths (`/tmp/x`, `file:///tmp/x`)
//! - Object stores (`s3://`, `gs://`, `az://`, `azure://`)
//! - The in-process `memory://` store, handy inside a single command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

/// polypath - path-oriented file commands for local disk and object stores
#[derive(Parser)]
#[command(name = "polypath")]
#[command(author, version, about = "File commands for local disk and cloud object stores", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "POLYPATH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        /// Directory to list
        path: String,

        /// Show size, modification time and kind
        #[arg(short, long)]
        long: bool,
    },

    /// Print a file to stdout
    Cat {
        /// File to print
        path: String,
    },

    /// Write stdin (or a local file) to a path
    Put {
        /// Destination path
        path: String,

        /// Read the content from this local file instead of stdin
        #[arg(short, long)]
        from: Option<PathBuf>,

        /// Append instead of replacing
        #[arg(short, long)]
        append: bool,
    },

    /// Copy a file or a directory tree, across backends if needed
    Cp {
        /// Source path
        source: String,

        /// Destination path; an existing directory receives the file by name
        target: String,

        /// Copy directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Copy symlinks as symlinks
        #[arg(long)]
        no_follow: bool,
    },

    /// Move a file or a directory tree, across backends if needed
    Mv {
        /// Source path
        source: String,

        /// Destination path
        target: String,
    },

    /// Remove files or directories
    Rm {
        /// Paths to remove
        #[arg(required = true)]
        paths: Vec<String>,

        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,

        /// Ignore missing paths
        #[arg(short, long)]
        force: bool,
    },

    /// Create directories
    Mkdir {
        /// Directories to create
        #[arg(required = true)]
        paths: Vec<String>,

        /// Create missing parents and accept existing directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Walk a directory tree top-down
    Walk {
        /// Root of the walk
        path: String,
    },

    /// Match a glob pattern below a directory
    Glob {
        /// Directory to search
        path: String,

        /// Pattern such as `*.txt` or `**/*.log`
        pattern: String,

        /// Match at any depth (same as prefixing the pattern with `**/`)
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show file status
    Stat {
        /// Path to inspect
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered URI schemes
    Schemes,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with_all = ["init", "path"])]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with_all = ["show", "path"])]
        init: bool,

        /// Show configuration file path
        #[arg(long, conflicts_with_all = ["show", "init"])]
        path: bool,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let result = run();

    match result {
        Ok(_) => process::exit(0),
        Err(e) => {
            error!("Error: {:#}", e);
            process::exit(map_error_to_exit_code(&e));
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);
    let config = commands::load_config(cli.config.as_deref())?;
    commands::install_schemes(&config);

    match cli.command {
        Commands::Ls { path, long } => commands::ls(&path, long),
        Commands::Cat { path } => commands::cat(&path),
        Commands::Put { path, from, append } => commands::put(&path, from.as_deref(), append),
        Commands::Cp {
            source,
            target,
            recursive,
            no_follow,
        } => commands::cp(&source, &target, recursive, !no_follow),
        Commands::Mv { source, target } => commands::mv(&source, &target),
        Commands::Rm {
            paths,
            recursive,
            force,
        } => commands::rm(&paths, recursive, force),
        Commands::Mkdir { paths, parents } => commands::mkdir(&paths, parents),
        Commands::Walk { path } => commands::walk(&path),
        Commands::Glob {
            path,
            pattern,
            recursive,
        } => commands::glob(&path, &pattern, recursive),
        Commands::Stat { path, json } => commands::stat(&path, json),
        Commands::Schemes => commands::schemes(),
        Commands::Config { show, init, path } => {
            commands::config(cli.config.as_deref(), &config, show, init, path)
        }
    }
}

/// Exit codes: 2 for missing paths, 3 for invalid input, 1 otherwise
fn map_error_to_exit_code(err: &anyhow::Error) -> i32 {
    use polypath_core::Error;

    if let Some(err) = err.downcast_ref::<Error>() {
        match err {
            Error::NotFound(_) => 2,
            Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => 2,
            Error::InvalidPath(_)
            | Error::InvalidArgument(_)
            | Error::InvalidMode(_)
            | Error::UnsupportedScheme(_)
            | Error::UnsupportedMode(_)
            | Error::AlreadyExists(_)
            | Error::IsADirectory(_)
            | Error::NotADirectory(_)
            | Error::DirectoryNotEmpty(_) => 3,
            _ => 1,
        }
    } else if let Some(io) = err.downcast_ref::<std::io::Error>() {
        if io.kind() == std::io::ErrorKind::NotFound {
            2
        } else {
            1
        }
    } else {
        1
    }
}
