//! Kavram - interactive host
//!
//! Reads the line protocol from stdin, keeps the engine in memory and
//! persists it to a snapshot file. Decay and autosave run on tokio
//! intervals in the background.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kavram_brain::command::HELP;
use kavram_brain::config::{print_banner, Config};
use kavram_brain::{Command, Engine, InMemoryDictionary, RecentMemoryLog};
use kavram_core::KavramResult;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notes kept by the in-process memory log
const MEMORY_LOG_CAPACITY: usize = 512;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        tracing::error!("Kavram stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> KavramResult<()> {
    let config = Config::from_env();
    let engine_config = config.engine_config()?;

    println!("Kavram v{}", VERSION);
    print_banner(&config, &engine_config);

    let mut engine = Engine::open(engine_config, &config.data_path)?
        .with_memory_log(Arc::new(RecentMemoryLog::new(MEMORY_LOG_CAPACITY)));
    if let Some(path) = &config.dictionary_path {
        match InMemoryDictionary::load(path) {
            Ok(dictionary) => engine = engine.with_dictionary(Arc::new(dictionary)),
            Err(e) => warn!("Dictionary not loaded: {}", e),
        }
    }
    let engine = Arc::new(engine);

    // Periodic decay
    let engine_decay = engine.clone();
    let decay_secs = config.decay_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(decay_secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            let report = engine_decay.decay();
            if report.decayed > 0 {
                info!("Decay pass: {}/{} associations weakened", report.decayed, report.examined);
            }
        }
    });

    // Auto-save when something changed
    let engine_save = engine.clone();
    let save_path = config.data_path.clone();
    let autosave_secs = config.autosave_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(autosave_secs));
        let mut saved_version = engine_save.version();
        interval.tick().await;
        loop {
            interval.tick().await;
            let version = engine_save.version();
            if version == saved_version {
                continue;
            }
            match engine_save.save(&save_path) {
                Ok(()) => saved_version = version,
                Err(e) => warn!("Failed to save snapshot: {}", e),
            }
        }
    });

    println!("Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<(String, String)> = None;

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            None => continue,
            Some(Err(usage)) => {
                println!("{}", usage);
                continue;
            }
            Some(Ok(command)) => command,
        };

        match command {
            Command::Train { query, response } => match engine.train(&query, &response) {
                Ok(summary) => println!(
                    "learned ({:?}): {} new node(s), {} new association(s), {} reinforced",
                    summary.example,
                    summary.nodes_created,
                    summary.associations_created,
                    summary.associations_reinforced
                ),
                Err(e) => println!("not learned: {}", e),
            },
            Command::Ask(query) => {
                let answer = engine.ask(&query);
                println!("{}", answer.text);
                println!("  [{} {:.2}{}]", answer.method, answer.confidence,
                    if answer.reinforced { ", reinforced" } else { "" });
                for snippet in &answer.context {
                    println!("  ~ {}", snippet);
                }
                if !answer.is_fallback() {
                    last = Some((query, answer.text));
                }
            }
            Command::Good | Command::Bad => {
                let positive = command == Command::Good;
                match &last {
                    Some((query, response)) => match engine.feedback(query, response, positive) {
                        Ok(report) => println!("noted: {} pair(s) updated", report.updated),
                        Err(e) => println!("no feedback applied: {}", e),
                    },
                    None => println!("nothing to give feedback on yet"),
                }
            }
            Command::Decay => {
                let report = engine.decay();
                println!("{}/{} associations weakened", report.decayed, report.examined);
            }
            Command::Save => match engine.save(&config.data_path) {
                Ok(()) => println!("saved to {}", config.data_path.display()),
                Err(e) => println!("save failed: {}", e),
            },
            Command::Stats => match serde_json::to_string_pretty(&engine.stats()) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("stats unavailable: {}", e),
            },
            Command::Export(path) => match engine.snapshot().export_json(std::path::Path::new(&path)) {
                Ok(()) => println!("exported to {}", path),
                Err(e) => println!("export failed: {}", e),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    engine.save(&config.data_path)?;
    info!("Goodbye");
    Ok(())
}
