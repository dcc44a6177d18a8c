//! End-to-end heist lifecycle against the in-memory store and ledger.

use std::sync::Arc;
use std::time::Duration;

use crew_heist::config::VaultRecoveryConfig;
use crew_heist::heist::{
    GuildConfig, HeistError, HeistRegistry, HeistReport, HeistResult, HeistState, Ineligible,
    OutcomeStatus, Target, ThemeCatalog, VaultRecoveryWorker,
};
use crew_heist::ledger::MemoryLedger;
use crew_heist::persistence::{HeistStore, MemoryStore};

const GUILD: u64 = 77;

struct World {
    registry: Arc<HeistRegistry>,
    store: Arc<MemoryStore>,
    ledger: Arc<MemoryLedger>,
}

fn world(config: GuildConfig, seed: u64) -> World {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    let registry = HeistRegistry::new(
        store.clone(),
        ledger.clone(),
        Arc::new(ThemeCatalog::builtin()),
        config,
        Some(seed),
    )
    .with_status_interval(Duration::from_millis(20));
    World {
        registry: Arc::new(registry),
        store,
        ledger,
    }
}

fn fund(w: &World, members: impl IntoIterator<Item = u64>, credits: u64) {
    for m in members {
        w.ledger.open_account(GUILD, m, credits);
    }
}

async fn coin_flip_heist(seed: u64) -> (HeistResult, World) {
    let w = world(GuildConfig::default(), seed);
    w.store
        .put_target(&Target::new(GUILD, "heist", "Armored Truck", 3, 50.0, 10_000))
        .await
        .unwrap();
    fund(&w, [1, 2, 3], 1_000);

    w.registry.start_heist(GUILD, 1).await.unwrap();
    w.registry.join_heist(GUILD, 2).await.unwrap();
    w.registry.join_heist(GUILD, 3).await.unwrap();

    let HeistReport::Completed(result) = w.registry.start(GUILD).await.unwrap() else {
        panic!("crew of three must complete");
    };
    (result, w)
}

#[tokio::test]
async fn seeded_heist_is_reproducible() {
    let (a, _) = coin_flip_heist(42).await;
    let (b, _) = coin_flip_heist(42).await;

    assert_eq!(a.target, "Armored Truck");
    assert_eq!(a.outcomes, b.outcomes);
    assert_eq!(a.tally, b.tally);
    assert_eq!(
        a.tally.escaped + a.tally.apprehended + a.tally.dead,
        3,
        "every crew member gets exactly one outcome"
    );
}

#[tokio::test]
async fn vault_pays_exactly_what_escapees_carry() {
    let (result, w) = coin_flip_heist(9).await;

    assert_eq!(result.vault_before, 10_000);
    assert_eq!(result.vault_after, 10_000 - result.tally.total_stolen);

    let stored = w
        .store
        .get_target(GUILD, "heist", "Armored Truck")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.vault(), result.vault_after);

    for outcome in &result.outcomes {
        let expected = 900 + outcome.total();
        assert_eq!(w.ledger.balance(GUILD, outcome.member_id), expected);
        if outcome.status != OutcomeStatus::Escaped {
            assert_eq!(outcome.total(), 0);
        }
    }
}

#[tokio::test]
async fn one_live_heist_per_guild() {
    let w = world(GuildConfig::default(), 1);
    fund(&w, 1..=10, 1_000);

    let mut handles = Vec::new();
    for organizer in 1..=10 {
        let registry = w.registry.clone();
        handles.push(tokio::spawn(async move {
            registry.start_heist(GUILD, organizer).await
        }));
    }

    let mut started = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => started += 1,
            Err(e) => assert_eq!(e, HeistError::AlreadyInProgress),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(w.registry.active_heists(), 1);

    // Only the organizer who won the slot paid.
    let charged = (1..=10)
        .filter(|&m| w.ledger.balance(GUILD, m) < 1_000)
        .count();
    assert_eq!(charged, 1);

    // Another guild is unaffected.
    w.ledger.open_account(GUILD + 1, 1, 1_000);
    w.registry.start_heist(GUILD + 1, 1).await.unwrap();
}

#[tokio::test]
async fn concurrent_joins_each_land_once() {
    let w = world(GuildConfig::default(), 1);
    fund(&w, 1..=21, 1_000);
    w.registry.start_heist(GUILD, 1).await.unwrap();

    let mut handles = Vec::new();
    for member in 2..=21 {
        let registry = w.registry.clone();
        handles.push(tokio::spawn(async move {
            // Every member tries twice; the second attempt must be refused.
            let first = registry.join_heist(GUILD, member).await;
            let second = registry.join_heist(GUILD, member).await;
            (first, second)
        }));
    }
    for handle in handles {
        let (first, second) = handle.await.unwrap();
        assert!(first.is_ok());
        assert_eq!(
            second.unwrap_err(),
            HeistError::NotEligible(Ineligible::AlreadyJoined)
        );
    }

    let snap = w.registry.session_snapshot(GUILD).await.unwrap();
    assert_eq!(snap.crew_size(), 21);
    for member in 1..=21 {
        assert_eq!(w.ledger.balance(GUILD, member), 900);
    }
}

#[tokio::test]
async fn short_crew_is_cancelled_after_window() {
    let w = world(
        GuildConfig {
            planning_wait_secs: 1,
            ..GuildConfig::default()
        },
        1,
    );
    fund(&w, [1], 1_000);
    w.registry.start_heist(GUILD, 1).await.unwrap();

    let report = w.registry.run_heist(GUILD, |_| {}).await.unwrap();
    assert!(matches!(
        report,
        Some(HeistReport::Cancelled { crew_size: 1, .. })
    ));
    assert!(w.registry.session_snapshot(GUILD).await.is_none());
    assert_eq!(w.ledger.balance(GUILD, 1), 900);
}

#[tokio::test]
async fn full_run_reports_progress_then_completes() {
    let w = world(
        GuildConfig {
            planning_wait_secs: 1,
            ..GuildConfig::default()
        },
        3,
    );
    fund(&w, [1, 2], 1_000);
    w.registry.start_heist(GUILD, 1).await.unwrap();

    let registry = w.registry.clone();
    let joiner = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.join_heist(GUILD, 2).await
    });

    let mut largest_crew = 0;
    let report = w
        .registry
        .run_heist(GUILD, |snap| {
            assert_eq!(snap.state, HeistState::Planning);
            largest_crew = largest_crew.max(snap.crew_size());
        })
        .await
        .unwrap();

    joiner.await.unwrap().unwrap();
    assert_eq!(largest_crew, 2);
    let result = match report {
        Some(HeistReport::Completed(result)) => result,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.target, "Corner Bodega");
}

#[tokio::test]
async fn reset_stops_a_running_wait() {
    let w = world(GuildConfig::default(), 1);
    fund(&w, [1], 1_000);
    w.registry.start_heist(GUILD, 1).await.unwrap();

    let registry = w.registry.clone();
    let runner = tokio::spawn(async move { registry.run_heist(GUILD, |_| {}).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    w.registry.reset(GUILD).unwrap();
    let report = tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(report.is_none());
    assert_eq!(w.registry.reset(GUILD).unwrap_err(), HeistError::NoHeist);
}

#[tokio::test]
async fn police_alert_blocks_next_heist() {
    let (_, w) = coin_flip_heist(5).await;
    fund(&w, [50], 1_000);

    let remaining = w.registry.police_alert_remaining(GUILD);
    assert!(remaining > Duration::ZERO);
    assert!(remaining <= Duration::from_secs(60));

    match w.registry.start_heist(GUILD, 50).await {
        Err(HeistError::NotEligible(Ineligible::PoliceAlert { remaining })) => {
            assert!(remaining <= Duration::from_secs(60));
        }
        other => panic!("expected police alert, got {other:?}"),
    }
}

#[tokio::test]
async fn caught_member_bails_out_and_rejoins() {
    let w = world(
        GuildConfig {
            death_chance: 0.0,
            police_alert_secs: 0,
            ..GuildConfig::default()
        },
        11,
    );
    w.store
        .put_target(&Target::new(GUILD, "heist", "Police Station", 5, 0.0, 5_000))
        .await
        .unwrap();
    fund(&w, [1, 2, 3], 1_000);

    w.registry.start_heist(GUILD, 1).await.unwrap();
    w.registry.join_heist(GUILD, 2).await.unwrap();
    let HeistReport::Completed(result) = w.registry.start(GUILD).await.unwrap() else {
        panic!("expected completion");
    };
    assert_eq!(result.tally.apprehended, 2);

    // Jailed organizer cannot plan the next one.
    match w.registry.start_heist(GUILD, 1).await {
        Err(HeistError::NotEligible(Ineligible::InJail { bail_cost, .. })) => {
            assert_eq!(bail_cost, 250)
        }
        other => panic!("expected jail, got {other:?}"),
    }

    w.registry.pay_bail(GUILD, 1).await.unwrap();
    assert_eq!(w.ledger.balance(GUILD, 1), 900 - 250);
    w.registry.start_heist(GUILD, 1).await.unwrap();

    // Member 2 stays jailed until bailed.
    assert!(matches!(
        w.registry.join_heist(GUILD, 2).await.unwrap_err(),
        HeistError::NotEligible(Ineligible::InJail { .. })
    ));
    w.registry.join_heist(GUILD, 3).await.unwrap();

    // Recaptured while out on bail: bail triples.
    w.registry.start(GUILD).await.unwrap();
    let stats = w.registry.member_stats(GUILD, 1).await.unwrap();
    assert_eq!(stats.bail_cost, 750);
    assert_eq!(stats.member.jail_counter(), 2);
    // Second capture since the last clear doubles the sentence.
    assert!(stats.remaining_jail > Duration::from_secs(600));
    assert!(stats.remaining_jail <= Duration::from_secs(1_200));
}

#[tokio::test]
async fn vault_recovers_after_heist() {
    let w = world(GuildConfig::default(), 1);
    let mut drained = Target::new(GUILD, "heist", "Bank", 3, 50.0, 1_000);
    drained.set_vault(500);
    w.store.put_target(&drained).await.unwrap();

    let worker = VaultRecoveryWorker::new(
        w.store.clone(),
        &VaultRecoveryConfig {
            interval_secs: 60,
            rate: 0.04,
        },
    );
    worker.tick().await.unwrap();

    let targets = w.registry.list_targets(GUILD).await.unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].vault(), 540);
}

#[tokio::test]
async fn theme_switch_requires_known_theme() {
    let w = world(GuildConfig::default(), 1);
    assert_eq!(
        w.registry.set_theme(GUILD, "space").await.unwrap_err(),
        HeistError::ThemeNotFound("space".to_string())
    );

    let config = w.registry.set_theme(GUILD, "pirate").await.unwrap();
    assert_eq!(config.theme, "pirate");
    fund(&w, [1, 2], 1_000);
    w.registry.start_heist(GUILD, 1).await.unwrap();
    w.registry.join_heist(GUILD, 2).await.unwrap();
    let HeistReport::Completed(result) = w.registry.start(GUILD).await.unwrap() else {
        panic!("expected completion");
    };
    assert_eq!(result.target, "Fishing Sloop");
}
