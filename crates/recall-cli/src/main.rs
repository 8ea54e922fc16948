//! recall: Persistent-Recall Maintenance CLI
//!
//! Operational entry points for the recall subsystem.
//!
//! Usage:
//!   recall --list <owner>   - Show what the assistant remembers for an owner
//!   recall --sweep          - Run one decay sweep and exit
//!   recall --watch          - Run the periodic decay sweeper until Ctrl-C
//!   recall --help           - Show help

use recall_core::{Config, MemoryStore, RecallManager};
use recall_sweep::{SweepConfig, Sweeper};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Read-only "what do you remember" view
    List { owner: String, limit: usize },
    /// One decay sweep, then exit
    Sweep,
    /// Periodic decay sweeper until Ctrl-C
    Watch,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("recall {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    // Open the store once and inject it everywhere it is needed
    let store = MemoryStore::new(&config.memory.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open memory store: {}", e))?;
    let manager = RecallManager::new(Arc::new(Mutex::new(store)), config.memory.clone());

    match mode {
        RunMode::List { owner, limit } => {
            let memories = manager.list_recent(&owner, limit)?;
            if memories.is_empty() {
                println!("No memories for {}", owner);
                return Ok(());
            }

            println!("Memories for {} ({} shown):", owner, memories.len());
            for memory in memories {
                println!(
                    "[{}] salience {:.2}  created {}  {}",
                    memory.sector,
                    memory.salience,
                    memory.created_at.format("%Y-%m-%d %H:%M"),
                    truncate(&memory.content, 80),
                );
            }
            Ok(())
        }
        RunMode::Sweep => {
            let sweeper = Sweeper::new(manager.store(), SweepConfig::from(&config.memory));
            let stats = sweeper.run_once()?;
            println!("Decayed {} memories, deleted {}", stats.decayed, stats.deleted);
            Ok(())
        }
        RunMode::Watch => {
            let sweeper = Sweeper::new(manager.store(), SweepConfig::from(&config.memory));
            let handle = sweeper.start();

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down sweeper...");
            handle.stop().await;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list" | "-l" => {
                let Some(owner) = iter.next().cloned() else {
                    return RunMode::Help;
                };
                let limit = iter.next().and_then(|s| s.parse().ok()).unwrap_or(20);
                return RunMode::List { owner, limit };
            }
            "--sweep" | "-s" => return RunMode::Sweep,
            "--watch" | "-w" => return RunMode::Watch,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Help
}

/// Print help message
fn print_help() {
    println!("recall - Persistent-Recall Maintenance CLI");
    println!();
    println!("Usage:");
    println!("  recall --list <owner> [limit]  Show recent memories for an owner");
    println!("  recall --sweep                 Run one decay sweep and exit");
    println!("  recall --watch                 Run the periodic decay sweeper until Ctrl-C");
    println!("  recall --help                  Show this help message");
    println!("  recall --version               Show version");
    println!();
    println!("Environment Variables:");
    println!("  DB_PATH               Path to the SQLite database (default: data/recall.db)");
    println!("  DECAY_RATE            Salience multiplier per sweep (default: 0.98)");
    println!("  MIN_SALIENCE          Deletion floor (default: 0.1)");
    println!("  GRACE_HOURS           Decay grace window in hours (default: 24)");
    println!("  SWEEP_INTERVAL_HOURS  Hours between sweeps (default: 24)");
    println!("  MAX_CONTEXT           Memories injected per context (default: 8)");
    println!("  COMMAND_PREFIX        Prefix marking command turns (default: /)");
}

/// Truncate a string for display, character-safe
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("a rather long memory line", 8), "a rather...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("記憶のテスト", 3), "記憶の...");
    }
}
