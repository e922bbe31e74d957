//! EddyKV interactive shell.
//!
//! Reads newline-terminated commands from stdin and drives the engine:
//! `get <k>`, `put <k> <v>`, `delete <k>`, `exit`. Key-level errors are
//! logged and the loop continues.

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use engine::{Engine, EngineOptions};

#[derive(Parser, Debug)]
#[command(name = "eddykv")]
#[command(about = "Embedded ordered key-value store", version)]
struct Args {
    /// Root directory for the store's files
    root_dir: PathBuf,

    /// Memtable entry bound before freeze-and-flush
    #[arg(long, default_value_t = 1024)]
    memtable_flush_limit: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut engine = Engine::open(EngineOptions {
        root_dir: args.root_dir,
        memtable_flush_limit: args.memtable_flush_limit,
    })?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["get", key] => match engine.get(key.as_bytes()) {
                Ok(value) => println!("{}", String::from_utf8_lossy(value)),
                Err(err) => tracing::error!(key = %key, "get failed: {}", err),
            },
            ["put", key, value] => {
                if let Err(err) = engine.put(key.as_bytes(), value.as_bytes()) {
                    tracing::error!(key = %key, "put failed: {}", err);
                }
            }
            ["delete", key] => {
                if let Err(err) = engine.remove(key.as_bytes()) {
                    tracing::error!(key = %key, "delete failed: {}", err);
                }
            }
            ["exit"] => break,
            [] => continue,
            _ => println!("invalid command"),
        }
    }

    engine.close()?;
    println!("bye ;)");
    Ok(())
}
