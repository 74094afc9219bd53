mod catalog;
mod resolve;
mod scan;
mod stats;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use msgforge::{Config, Pipeline};
use tracing_subscriber::EnvFilter;

use crate::{
    catalog::{run_compile_command, run_refresh_command},
    resolve::{run_lookup_command, run_resolve_command},
    scan::run_scan_command,
    stats::print_stats,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file; relative paths inside it resolve against its directory
    #[arg(short, long, default_value = "msgforge.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan sources and print the extracted messages.
    Scan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan sources, merge into the catalogs and save every format.
    Refresh {
        /// Only refresh this locale (all configured locales by default)
        #[arg(short, long)]
        locale: Option<String>,

        /// Drop entries no source mentions any more
        #[arg(long)]
        prune: bool,
    },

    /// Regenerate the binary and native catalogs from the text catalog.
    Compile {
        #[arg(short, long)]
        locale: String,
    },

    /// Resolve the active locale from persisted and override hints.
    Resolve {
        /// Locale remembered for the session
        #[arg(long)]
        persisted: Option<String>,

        /// One-shot locale requested for this request
        #[arg(long = "override")]
        override_hint: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Translate one message with a locale's runtime catalog.
    Lookup {
        #[arg(short, long)]
        locale: String,

        /// Message context (msgctxt)
        #[arg(long)]
        context: Option<String>,

        /// Count used to pick a plural form
        #[arg(long)]
        count: Option<u64>,

        /// Plural source text, returned on a miss when count != 1
        #[arg(long)]
        plural: Option<String>,

        msgid: String,
    },

    /// Show translation coverage per locale.
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Spinner shared by the long-running commands.
pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress_bar.set_message(message);
    progress_bar
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let pipeline = match Config::from_file(&args.config).and_then(Pipeline::new) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error loading {}: {}", args.config.display(), e);
            std::process::exit(1);
        }
    };

    let result = match args.commands {
        Commands::Scan { json } => run_scan_command(&pipeline, json),
        Commands::Refresh { locale, prune } => run_refresh_command(&pipeline, locale, prune),
        Commands::Compile { locale } => run_compile_command(&pipeline, &locale),
        Commands::Resolve {
            persisted,
            override_hint,
            json,
        } => run_resolve_command(&pipeline, persisted, override_hint, json),
        Commands::Lookup {
            locale,
            context,
            count,
            plural,
            msgid,
        } => run_lookup_command(&pipeline, &locale, context, count, plural, &msgid),
        Commands::Stats { json } => print_stats(&pipeline, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
