//! Kavram Training System
//!
//! Teaches the engine a file of `query<TAB>response` lines, then asks
//! every query back and reports how many answers came out as taught.
//!
//! ```text
//! kavram-train <pairs.tsv> [--export <snapshot.json>]
//! ```

use std::path::PathBuf;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use kavram_brain::config::Config;
use kavram_brain::{Engine, Method};
use kavram_core::text;

struct Args {
    pairs: PathBuf,
    export: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut pairs = None;
    let mut export = None;
    while let Some(arg) = args.next() {
        if arg == "--export" {
            let path = args.next().ok_or("--export needs a path")?;
            export = Some(PathBuf::from(path));
        } else if pairs.is_none() {
            pairs = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument '{}'", arg));
        }
    }
    let pairs = pairs.ok_or("usage: kavram-train <pairs.tsv> [--export <snapshot.json>]")?;
    Ok(Args { pairs, export })
}

/// Split one line into a training pair; `None` for blanks and comments
fn parse_line(line: &str) -> Option<Result<(&str, &str), ()>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return None;
    }
    Some(line.split_once('\t').ok_or(()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    println!("Kavram Training System");
    println!("======================");
    println!();

    let args = parse_args()?;
    let config = Config::from_env();
    let engine = Engine::open(config.engine_config()?, &config.data_path)?;
    let content = tokio::fs::read_to_string(&args.pairs).await?;

    println!("Training from {}...", args.pairs.display());
    let started = Instant::now();
    let mut taught: Vec<(&str, &str)> = Vec::new();
    let mut malformed = 0usize;
    let mut rejected = 0usize;
    let mut associations_created = 0usize;

    for (number, line) in content.lines().enumerate() {
        let (query, response) = match parse_line(line) {
            None => continue,
            Some(Err(())) => {
                println!("   line {}: no tab separator, skipped", number + 1);
                malformed += 1;
                continue;
            }
            Some(Ok(pair)) => pair,
        };
        match engine.train(query, response) {
            Ok(summary) => {
                associations_created += summary.associations_created;
                taught.push((query, response));
            }
            Err(e) => {
                println!("   line {}: {}", number + 1, e);
                rejected += 1;
            }
        }
    }
    let elapsed = started.elapsed();

    println!("Testing answers...");
    let mut exact = 0usize;
    for (query, response) in &taught {
        let answer = engine.ask(query);
        if answer.method == Method::Exact && text::normalize(&answer.text) == text::normalize(response) {
            exact += 1;
        }
    }

    engine.save(&config.data_path)?;
    if let Some(path) = &args.export {
        engine.snapshot().export_json(path)?;
        println!("Exported to {}", path.display());
    }

    let rate = if taught.is_empty() { 0.0 } else { exact as f32 / taught.len() as f32 * 100.0 };
    println!();
    println!("======================");
    println!("Training Complete!");
    println!("   Pairs taught: {} in {:.2?}", taught.len(), elapsed);
    println!("   New associations: {}", associations_created);
    println!("   Malformed lines: {}, rejected pairs: {}", malformed, rejected);
    println!("   Exact recall: {}/{} ({:.1}%)", exact, taught.len(), rate);
    println!("   Saved to {}", config.data_path.display());

    Ok(())
}
