use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::format::ArchiveFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create a new archive from specified files and directories.
    #[command(alias = "c")]
    Compress {
        /// One or more input files or directories to add to the archive.
        #[arg(required = true)]
        items: Vec<PathBuf>,

        /// The path for the output archive file (e.g., backup.zip).
        #[arg(short, long)]
        output: PathBuf,

        /// Archive format. Inferred from the output extension when omitted, falling back to zip.
        #[arg(long, value_enum)]
        format: Option<ArchiveFormat>,

        /// Compression level (0-9). 0 stores without compression; higher levels compress harder.
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,

        /// Relative folder the items are placed under inside the archive (e.g., "backup/2024").
        #[arg(long)]
        structure: Option<PathBuf>,

        /// Set a password to protect the archive. If not provided, the archive will be unprotected.
        #[arg(long)]
        password: Option<String>,

        /// Prompt for the password instead of passing it on the command line.
        #[arg(long, conflicts_with = "password")]
        ask_password: bool,
    },

    /// Extract files from an archive.
    #[command(alias = "x")]
    Extract {
        /// The archive file to extract.
        #[arg(required = true)]
        archive: PathBuf,

        /// Specific member paths to extract. If empty, all files will be extracted.
        files: Vec<String>,

        /// The directory where files will be extracted. Defaults to the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// The password for the archive. If not provided, will try SHELLARCH_PASSWORD.
        #[arg(long)]
        password: Option<String>,

        /// Prompt for the password instead of passing it on the command line.
        #[arg(long, conflicts_with = "password")]
        ask_password: bool,
    },

    /// List the contents of an archive without extracting it.
    #[command(alias = "l")]
    List {
        /// The archive file to list contents of.
        #[arg(required = true)]
        archive: PathBuf,

        /// The password for the archive. If not provided, will try SHELLARCH_PASSWORD.
        #[arg(long)]
        password: Option<String>,

        /// Prompt for the password instead of passing it on the command line.
        #[arg(long, conflicts_with = "password")]
        ask_password: bool,

        /// Print the listing as JSON instead of a tree.
        #[arg(long)]
        json: bool,
    },
}

/// Gets the password from the command-line option, the `SHELLARCH_PASSWORD` environment variable, or prompts the user if requested.
///
/// This function centralizes password retrieval logic.
/// Priority:
/// 1. `--password` command-line argument.
/// 2. `SHELLARCH_PASSWORD` environment variable.
/// 3. Interactive prompt when `ask` is set.
/// 4. Returns `Ok(None)` otherwise, meaning the operation runs without a password.
pub fn get_password_from_opt_or_env(
    password_opt: Option<String>,
    ask: bool,
) -> Result<Option<String>, std::io::Error> {
    if let Some(pass) = password_opt {
        return Ok(Some(pass));
    }
    if let Ok(pass) = std::env::var("SHELLARCH_PASSWORD") {
        return Ok(Some(pass));
    }
    if ask {
        return Ok(Some(rpassword::prompt_password("Archive password: ")?));
    }
    Ok(None)
}

/// Parses command-line arguments using `clap` and returns the command to execute.
///
/// This is the main entry point for the CLI logic.
/// It handles parsing and returns a `Commands` enum variant, or an error if parsing fails.
pub fn run() -> Result<Commands, Box<dyn std::error::Error>> {
    let args = Args::parse();
    Ok(args.command)
}
