//! TrackerGraph CLI
//!
//! CLI tool for replaying captured browser events and inspecting the
//! resulting site -> trackers graph.

mod replay;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use tg_core::url::hostname_of;
use tg_core::{SiteTree, Store, TrackerConfig, VerdictFlags};
use tg_refdata::{load_reference_tables, LoadReport};

use crate::replay::{run_replay, ReplayOptions};

#[derive(Parser)]
#[command(name = "tg-cli")]
#[command(about = "TrackerGraph capture replay and graph tools")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay NDJSON capture events into the store
    Replay {
        /// Input event files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// TLD risk table (overrides config)
        #[arg(long)]
        tld: Option<PathBuf>,

        /// Blocklist files (replace the configured ones)
        #[arg(short, long)]
        blocklist: Vec<PathBuf>,

        /// Do not print surfaced alerts
        #[arg(short, long)]
        quiet: bool,
    },

    /// Export the store snapshot as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Pretty-print
        #[arg(long)]
        pretty: bool,
    },

    /// Print sites and the trackers seen on them
    Tree {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Remove every stored record
    Reset,

    /// Dump store info
    Info,

    /// Load reference data and report what was found
    Refdata {
        /// TLD risk table (overrides config)
        #[arg(long)]
        tld: Option<PathBuf>,

        /// Blocklist files (replace the configured ones)
        #[arg(short, long)]
        blocklist: Vec<PathBuf>,
    },

    /// Classify hostnames or URLs against the reference data
    Classify {
        /// Hostnames or URLs
        #[arg(required = true)]
        hosts: Vec<String>,

        /// TLD risk table (overrides config)
        #[arg(long)]
        tld: Option<PathBuf>,

        /// Blocklist files (replace the configured ones)
        #[arg(short, long)]
        blocklist: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = load_config(cli.config.as_deref(), cli.db).and_then(|config| match cli.command {
        Commands::Replay {
            input,
            tld,
            blocklist,
            quiet,
        } => {
            let config = with_refdata(config, tld, blocklist);
            let (tables, report) = load_reference_tables(config.tld_risk_path.as_deref(), &config.blocklist_paths);
            warn_failures(&report);
            run_replay(&config, tables, ReplayOptions { inputs: input, quiet })
        }
        Commands::Export { output, pretty } => cmd_export(&config, output.as_deref(), pretty),
        Commands::Tree { json } => cmd_tree(&config, json),
        Commands::Reset => cmd_reset(&config),
        Commands::Info => cmd_info(&config),
        Commands::Refdata { tld, blocklist } => cmd_refdata(&with_refdata(config, tld, blocklist)),
        Commands::Classify { hosts, tld, blocklist } => cmd_classify(&with_refdata(config, tld, blocklist), &hosts),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>, db: Option<PathBuf>) -> Result<TrackerConfig, String> {
    let mut config = TrackerConfig::load_or_default(path).map_err(|e| e.to_string())?;
    if let Some(db) = db {
        config.database_path = db;
    }
    Ok(config)
}

fn with_refdata(mut config: TrackerConfig, tld: Option<PathBuf>, blocklist: Vec<PathBuf>) -> TrackerConfig {
    if tld.is_some() {
        config.tld_risk_path = tld;
    }
    if !blocklist.is_empty() {
        config.blocklist_paths = blocklist;
    }
    config
}

fn warn_failures(report: &LoadReport) {
    for failure in &report.failures {
        eprintln!("Warning: {failure}");
    }
}

fn open_store(config: &TrackerConfig) -> Result<Store, String> {
    Store::open(&config.database_path)
        .map_err(|e| format!("Failed to open '{}': {}", config.database_path.display(), e))
}

fn cmd_export(config: &TrackerConfig, output: Option<&str>, pretty: bool) -> Result<(), String> {
    let store = open_store(config)?;
    let snapshot = store.snapshot().map_err(|e| format!("Failed to read store: {}", e))?;

    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)
    } else {
        serde_json::to_string(&snapshot)
    }
    .map_err(|e| format!("Failed to serialize snapshot: {}", e))?;

    match output {
        Some(path) => {
            let mut file = fs::File::create(path).map_err(|e| format!("Failed to create '{}': {}", path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Exported {} hosts to '{}'", snapshot.len(), path);
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_tree(config: &TrackerConfig, json: bool) -> Result<(), String> {
    let store = open_store(config)?;
    let snapshot = store.snapshot().map_err(|e| format!("Failed to read store: {}", e))?;
    let tree = SiteTree::from_snapshot(&snapshot);

    if json {
        let text = serde_json::to_string_pretty(&tree).map_err(|e| format!("Failed to serialize tree: {}", e))?;
        println!("{text}");
    } else if tree.is_empty() {
        println!("No sites recorded");
    } else {
        print!("{}", tree.render());
    }

    Ok(())
}

fn cmd_reset(config: &TrackerConfig) -> Result<(), String> {
    let store = open_store(config)?;
    store.reset().map_err(|e| format!("Failed to reset store: {}", e))?;
    println!("Store '{}' reset", config.database_path.display());
    Ok(())
}

fn cmd_info(config: &TrackerConfig) -> Result<(), String> {
    let store = open_store(config)?;
    let records = store.listed_records().map_err(|e| format!("Failed to read store: {}", e))?;

    let first_parties = records.iter().filter(|r| r.is_first_party).count();
    let trackers = records.iter().filter(|r| !r.observed_parents.is_empty()).count();
    let edges: usize = records.iter().map(|r| r.observed_parents.len()).sum();
    let last_activity = records.iter().map(|r| r.last_request_time).max();

    println!("Store: {}", config.database_path.display());
    println!("  Hosts:         {}", records.len());
    println!("  First parties: {}", first_parties);
    println!("  Trackers:      {}", trackers);
    println!("  Edges:         {}", edges);
    if let Some(at) = last_activity {
        println!("  Last activity: {}", format_timestamp(at));
    }

    Ok(())
}

fn format_timestamp(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => millis.to_string(),
    }
}

fn cmd_refdata(config: &TrackerConfig) -> Result<(), String> {
    let (tables, report) = load_reference_tables(config.tld_risk_path.as_deref(), &config.blocklist_paths);
    warn_failures(&report);

    println!("Reference data:");
    println!("  TLD risk:    {} entries", tables.tld_risk_len());
    println!(
        "  Blocklist:   {} -> {} domains (dedupe removed {})",
        report.blocklist.before, report.blocklist.after, report.blocklist.deduped
    );

    if !report.is_clean() {
        return Err(format!("{} reference file(s) failed to load", report.failures.len()));
    }
    Ok(())
}

fn cmd_classify(config: &TrackerConfig, hosts: &[String]) -> Result<(), String> {
    let (tables, report) = load_reference_tables(config.tld_risk_path.as_deref(), &config.blocklist_paths);
    warn_failures(&report);
    let classifier = config.classifier(tables);

    for input in hosts {
        let host = if input.contains("://") {
            hostname_of(input).ok_or_else(|| format!("Malformed URL: '{}'", input))?
        } else {
            input.trim().to_ascii_lowercase()
        };

        let verdict = classifier.classify(&host);
        let mut labels = Vec::new();
        if verdict.flags.contains(VerdictFlags::BLOCKLISTED) {
            labels.push("blocklisted");
        }
        if verdict.flags.contains(VerdictFlags::AD_KEYWORD) {
            labels.push("ad-keyword");
        }
        if verdict.flags.contains(VerdictFlags::RISKY_TLD) {
            labels.push("risky-tld");
        }

        println!("{host}");
        println!("  Root domain: {}", verdict.root_domain);
        println!("  TLD risk:    {}", verdict.tld_risk);
        if let Some(description) = &verdict.description {
            println!("  Blocklist:   {}", description);
        }
        println!(
            "  Verdict:     {}",
            if labels.is_empty() { "clean".to_string() } else { labels.join(", ") }
        );
    }

    Ok(())
}
