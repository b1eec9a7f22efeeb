//! Main entry point for the shellarch CLI app

use std::io::{self, Write};
use std::path::PathBuf;

use shellarch::archiver::{Archiver, CompressOptions, ExtractOptions, ExtractedEntry};
use shellarch::cli::{self, Commands};
use shellarch::events::ArchiverEvent;
use shellarch::listing::{ArchiveEntryNode, ListingResult};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(e) = run_app().await {
        if e.downcast_ref::<clap::Error>().is_none() {
            eprintln!("Error: {}", e);
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let command = cli::run()?;

    let archiver = Archiver::new();
    archiver.on_event(|event| {
        if let ArchiverEvent::Progress { percent } = event {
            eprint!("\r{percent:>3}%");
            let _ = io::stderr().flush();
        }
    });

    match command {
        Commands::Compress { items, output, format, level, structure, password, ask_password } => {
            let password = cli::get_password_from_opt_or_env(password, ask_password)?;
            let options = CompressOptions { format, level, custom_structure: structure, password };
            let report = archiver.compress(&items, &output, &options).await?;
            finish_progress();
            println!("Created '{}' at {}", report.file_name, report.full_path.display());
        }
        Commands::Extract { archive, files, output, password, ask_password } => {
            let password = cli::get_password_from_opt_or_env(password, ask_password)?;
            let output = output.unwrap_or_else(|| PathBuf::from("."));
            let options = ExtractOptions { password, selected_files: files };
            let report = archiver.extract(&archive, &output, &options).await?;
            finish_progress();
            println!("{}", report.message);
            print_extracted(&report.files, 0);
        }
        Commands::List { archive, password, ask_password, json } => {
            let password = cli::get_password_from_opt_or_env(password, ask_password)?;
            let listing = archiver.list(&archive, password.as_deref()).await?;
            finish_progress();
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&listing);
            }
        }
    }

    Ok(())
}

/// Clear the carriage-return progress line before printing results.
fn finish_progress() {
    eprint!("\r    \r");
}

fn print_listing(listing: &ListingResult) {
    print_nodes(&listing.entries, 0);
    let protected = if listing.is_protected { ", password protected" } else { "" };
    println!("{} entries, {} bytes{}", listing.total_files, listing.total_size, protected);
}

fn print_nodes(nodes: &[ArchiveEntryNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        if let Some(children) = node.children() {
            println!("{indent}{}/", node.name());
            print_nodes(children, depth + 1);
        } else {
            match node.size() {
                Some(size) => println!("{indent}{} ({} bytes)", node.name(), size),
                None => println!("{indent}{}", node.name()),
            }
        }
    }
}

fn print_extracted(entries: &[ExtractedEntry], depth: usize) {
    for entry in entries {
        let indent = "  ".repeat(depth);
        if entry.is_directory {
            println!("{indent}{}/", entry.name);
            print_extracted(&entry.children, depth + 1);
        } else {
            println!("{indent}{} ({} bytes)", entry.name, entry.size);
        }
    }
}
