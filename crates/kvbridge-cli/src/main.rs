//! kvbridge CLI — command-line client for the kvbridge store contract.
//!
//! Connects to one backend per invocation, runs a single command, and exits
//! non-zero on any store error.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kvbridge_core::{KvPair, Store, StoreError, WriteOptions, new_store};
use tracing::debug;

use crate::config::{GlobalArgs, init_logging};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

/// kvbridge — versioned keys, compare-and-swap and directories over Redis.
#[derive(Parser)]
#[command(
    name = "kvbridge",
    version,
    about = "kvbridge CLI — read, write, list and compare-and-swap keys",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         KVBRIDGE_BACKEND    redis or memory (default: redis)\n  \
         KVBRIDGE_ENDPOINT   Engine address (default: 127.0.0.1:6379)\n  \
         KVBRIDGE_PASSWORD   Engine password\n  \
         KVBRIDGE_LOG_LEVEL  Log filter (default: warn)\n\n\
         {DIM}Examples:{RESET}\n  \
         kvbridge put app/db/host 10.0.0.1\n  \
         kvbridge list app/db\n  \
         kvbridge cas-put app/leader node-2 --index 1718035200123456789"
    ),
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a value, replacing any existing one.
    Put {
        /// Key path (e.g., "app/db/host").
        key: String,
        /// Value to store.
        value: String,
        /// Expire the key after this many seconds.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Read a value and its index.
    Get {
        /// Key path.
        key: String,
    },
    /// Delete a key.
    Delete {
        /// Key path.
        key: String,
    },
    /// Check whether a key exists.
    Exists {
        /// Key path.
        key: String,
    },
    /// List every key under a directory.
    List {
        /// Directory path.
        directory: String,
    },
    /// Delete every key under a directory.
    #[command(name = "delete-tree")]
    DeleteTree {
        /// Directory path.
        directory: String,
    },
    /// Write only if the key is still at `--index` (or absent, without `--index`).
    #[command(name = "cas-put")]
    CasPut {
        /// Key path.
        key: String,
        /// Value to store.
        value: String,
        /// Index the key must currently have.
        #[arg(long)]
        index: Option<u64>,
        /// Expire the key after this many seconds.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Delete only if the key is still at `--index`.
    #[command(name = "cas-delete")]
    CasDelete {
        /// Key path.
        key: String,
        /// Index the key must currently have.
        #[arg(long)]
        index: Option<u64>,
    },
}

// ── Entry point ──────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match run(&cli.global, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(global: &GlobalArgs, cmd: Commands) -> Result<()> {
    let backend = global.backend()?;
    let config = global.store_config();
    debug!(%backend, endpoints = ?global.endpoint, "opening store");

    let store: Arc<dyn Store> = new_store(backend, &global.endpoint, Some(&config))
        .await
        .with_context(|| format!("failed to open {backend} store"))?;

    let result = dispatch(store.as_ref(), cmd).await;
    store.close().await;
    result
}

async fn dispatch(store: &dyn Store, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Put { key, value, ttl } => {
            store.put(&key, value.as_bytes(), write_options(ttl)).await?;
            success(&format!("Wrote {BOLD}{key}{RESET}"));
        }
        Commands::Get { key } => {
            let pair = store.get(&key).await?;
            print_pair(&pair);
        }
        Commands::Delete { key } => {
            store.delete(&key).await?;
            success(&format!("Deleted {BOLD}{key}{RESET}"));
        }
        Commands::Exists { key } => {
            let exists = store.exists(&key).await?;
            println!("{exists}");
        }
        Commands::List { directory } => {
            let pairs = store.list(&directory).await?;
            print_list(&directory, &pairs);
        }
        Commands::DeleteTree { directory } => {
            store.delete_tree(&directory).await?;
            success(&format!("Deleted everything under {BOLD}{directory}{RESET}"));
        }
        Commands::CasPut {
            key,
            value,
            index,
            ttl,
        } => {
            let previous = index.map(|i| expected(&key, i));
            let (_, pair) = store
                .atomic_put(&key, value.as_bytes(), previous.as_ref(), write_options(ttl))
                .await
                .map_err(explain_cas)?;
            success(&format!(
                "Wrote {BOLD}{key}{RESET} at index {CYAN}{}{RESET}",
                pair.last_index
            ));
        }
        Commands::CasDelete { key, index } => {
            let previous = index.map(|i| expected(&key, i));
            store
                .atomic_delete(&key, previous.as_ref())
                .await
                .map_err(explain_cas)?;
            success(&format!("Deleted {BOLD}{key}{RESET}"));
        }
    }
    Ok(())
}

fn write_options(ttl: Option<u64>) -> Option<WriteOptions> {
    ttl.map(|secs| WriteOptions::with_ttl(Duration::from_secs(secs)))
}

/// The pair a compare-and-swap expects; only the index is compared.
fn expected(key: &str, index: u64) -> KvPair {
    KvPair {
        key: key.to_owned(),
        value: Vec::new(),
        last_index: index,
    }
}

fn explain_cas(e: StoreError) -> anyhow::Error {
    if matches!(e, StoreError::KeyModified) {
        anyhow::Error::new(e).context("the key changed since the given index was read")
    } else {
        e.into()
    }
}

// ── Output helpers ───────────────────────────────────────────────────

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn print_pair(pair: &KvPair) {
    println!("{WHITE}{}{RESET}", String::from_utf8_lossy(&pair.value));
    println!("  {DIM}index {}{RESET}", pair.last_index);
}

fn print_list(directory: &str, pairs: &[KvPair]) {
    println!("{BOLD}{CYAN}{directory}{RESET}");
    if pairs.is_empty() {
        println!("  {DIM}(empty){RESET}");
        return;
    }
    for pair in pairs {
        println!(
            "  {CYAN}├─{RESET} {} = {WHITE}{}{RESET} {DIM}(index {}){RESET}",
            pair.key,
            String::from_utf8_lossy(&pair.value),
            pair.last_index
        );
    }
}
