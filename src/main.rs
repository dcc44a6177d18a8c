//! Crew Heist - demo runner
//!
//! Plays one heist end to end against the configured store:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Planning │───▶│ Resolve  │───▶│  Report  │
//! │  (YAML)  │    │ (window) │    │ (rolls)  │    │ (stdout) │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! The first id in `--members` organizes, the rest join. Every member is
//! given `--funds` credits in an in-memory ledger.

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

use crew_heist::config::AppConfig;
use crew_heist::core_types::{Credits, GuildId, MemberId};
use crew_heist::heist::{
    HeistRegistry, HeistReport, HeistResult, OutcomeStatus, ThemeCatalog, VaultRecoveryWorker,
};
use crew_heist::ledger::MemoryLedger;
use crew_heist::logging::init_logging;
use crew_heist::persistence::{HeistStore, MemoryStore, PgHeistStore};

// ============================================================
// COMMAND LINE
// ============================================================

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_guild() -> GuildId {
    get_arg(&["--guild"]).and_then(|g| g.parse().ok()).unwrap_or(1)
}

/// Comma separated member ids, organizer first
fn get_members() -> Vec<MemberId> {
    get_arg(&["--members"])
        .map(|list| list.split(',').filter_map(|m| m.trim().parse().ok()).collect())
        .unwrap_or_else(|| vec![101, 102, 103])
}

fn get_funds() -> Credits {
    get_arg(&["--funds"]).and_then(|f| f.parse().ok()).unwrap_or(1_000)
}

/// Planning window override in seconds
fn get_wait_override() -> Option<u64> {
    get_arg(&["--wait"]).and_then(|w| w.parse().ok())
}

fn use_json_output() -> bool {
    std::env::args().any(|a| a == "--json")
}

// ============================================================
// REPORT
// ============================================================

fn print_result(result: &HeistResult) {
    println!("\n=== {} ({}) ===", result.target, result.heist_id);
    for outcome in &result.outcomes {
        let label = match outcome.status {
            OutcomeStatus::Escaped => "ESCAPED",
            OutcomeStatus::Apprehended => "CAUGHT",
            OutcomeStatus::Dead => "DEAD",
        };
        println!(
            "  {:>8} {:<8} +{:<6} {}",
            outcome.member_id,
            label,
            outcome.total(),
            outcome.message
        );
    }
    println!(
        "  escaped {} / caught {} / dead {}, stolen {}",
        result.tally.escaped, result.tally.apprehended, result.tally.dead, result.tally.total_stolen
    );
    println!("  vault {} -> {}", result.vault_before, result.vault_after);
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = match AppConfig::load(&env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config/{}.yaml not loaded ({}), using defaults", env, e);
            AppConfig::default()
        }
    };
    if let Some(wait) = get_wait_override() {
        app_config.heist.planning_wait_secs = wait;
    }
    app_config.heist.validate()?;

    let _log_guard = init_logging(&app_config);
    info!("Starting crew-heist in {} mode", env);

    let store: Arc<dyn HeistStore> = match &app_config.persistence.postgres_url {
        Some(url) => {
            let pg = PgHeistStore::connect(url).await?;
            pg.ensure_schema().await?;
            info!("PostgreSQL store ready");
            Arc::new(pg)
        }
        None => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let mut themes = ThemeCatalog::builtin();
    if let Some(dir) = &app_config.themes_dir {
        let loaded = themes.load_dir(Path::new(dir))?;
        info!(count = loaded, dir = %dir, "Themes loaded");
    }

    let guild_id = get_guild();
    let members = get_members();
    let (&organizer, joiners) = members
        .split_first()
        .ok_or_else(|| anyhow!("--members needs at least one id"))?;

    let ledger = Arc::new(MemoryLedger::new());
    let funds = get_funds();
    for &member_id in &members {
        ledger.open_account(guild_id, member_id, funds);
    }

    let registry = HeistRegistry::new(
        store.clone(),
        ledger.clone(),
        Arc::new(themes),
        app_config.heist.clone(),
        app_config.rng_seed,
    );

    // Background vault recovery
    let worker = VaultRecoveryWorker::new(store.clone(), &app_config.vault_recovery);
    tokio::spawn(async move {
        worker.run().await;
    });

    let snapshot = registry.start_heist(guild_id, organizer).await?;
    println!(
        "Heist {} planned by {} in guild {}, closes at {}",
        snapshot.heist_id, organizer, guild_id, snapshot.planning_ends_at
    );

    for &member_id in joiners {
        match registry.join_heist(guild_id, member_id).await {
            Ok(snap) => println!("  {} joined (crew {})", member_id, snap.crew_size()),
            Err(e) => {
                warn!(member_id, code = e.code(), "Join refused");
                println!("  {} refused: {}", member_id, e);
            }
        }
    }

    let report = registry
        .run_heist(guild_id, |snap| {
            let left = (snap.planning_ends_at - chrono::Utc::now()).num_seconds().max(0);
            println!("  crew {} assembling, {}s left", snap.crew_size(), left);
        })
        .await?;

    match report {
        None => println!("Heist was reset before it started"),
        Some(HeistReport::Cancelled { crew_size, .. }) => {
            println!("Heist cancelled: crew of {} is too small", crew_size)
        }
        Some(HeistReport::Completed(result)) => {
            if use_json_output() {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
    }

    println!("\n=== Crew ===");
    for &member_id in &members {
        let stats = registry.member_stats(guild_id, member_id).await?;
        println!(
            "  {:>8} {:<12} {:<11} level {:<3} jail {:>5}s  balance {}",
            member_id,
            stats.tier.as_str(),
            stats.member.status().as_str(),
            stats.member.criminal_level(),
            stats.remaining_jail.as_secs(),
            ledger.balance(guild_id, member_id)
        );
    }

    Ok(())
}
