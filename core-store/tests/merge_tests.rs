//! Integration tests for the atomic merge pipeline.

use core_store::{
    create_test_pool, DemoPlayer, DemoRecord, LeagueTeam, LogPlayer, LogRecord, MatchRecord,
    MergePipeline, PlayerDirectory, PlayerRecord, PlayerRef, Record, RecordStore, SqlitePlayerDirectory,
    SteamId, StoreError, TransferKind, TransferRecord,
};
use sqlx::SqlitePool;

// ============================================================================
// Fixtures
// ============================================================================

fn player(account: u32, name: &str) -> PlayerRef {
    PlayerRef::new(SteamId::from_account_id(account), name)
}

fn log(logid: u64, players: &[(u32, &str)]) -> LogRecord {
    LogRecord {
        logid,
        time: 1_600_000_000 + logid as i64,
        duration: 1800,
        title: format!("Log {}", logid),
        map: Some("cp_process_final".to_string()),
        red_score: 5,
        blue_score: 3,
        uploader: Some(player(players[0].0, players[0].1)),
        players: players
            .iter()
            .enumerate()
            .map(|(i, (account, name))| LogPlayer {
                player: player(*account, name),
                team: Some(if i % 2 == 0 { "Red" } else { "Blue" }.to_string()),
                kills: 10 + i as i64,
                deaths: 5,
                assists: 3,
                damage: 4000,
            })
            .collect(),
    }
}

fn demo(demoid: u64, players: &[(u32, &str)]) -> DemoRecord {
    DemoRecord {
        demoid,
        time: 1_600_000_100,
        duration: 1790,
        title: "RED vs BLU".to_string(),
        map: Some("cp_gullywash_final1".to_string()),
        red_name: "RED".to_string(),
        blue_name: "BLU".to_string(),
        red_score: 4,
        blue_score: 2,
        uploader: None,
        url: format!("https://demos.example/{}.dem", demoid),
        players: players
            .iter()
            .map(|(account, name)| DemoPlayer {
                player: player(*account, name),
                team: Some("red".to_string()),
                class: Some("scout".to_string()),
                kills: 20,
                assists: 4,
                deaths: 9,
            })
            .collect(),
    }
}

fn profile(account: u32, name: &str, avatar: &str) -> Record {
    Record::Player(PlayerRecord {
        steamid: SteamId::from_account_id(account),
        name: name.to_string(),
        avatar_hash: Some(avatar.to_string()),
    })
}

fn league_match(matchid: u64, score1: i64, fetched: i64) -> MatchRecord {
    MatchRecord {
        matchid,
        time: Some(1_600_000_000),
        competition: "Season 40".to_string(),
        round: Some("Week 1".to_string()),
        team1: LeagueTeam {
            teamid: 10,
            name: Some("Alpha".to_string()),
        },
        team2: LeagueTeam {
            teamid: 20,
            name: None,
        },
        score1,
        score2: 1,
        forfeit: false,
        fetched,
    }
}

/// Every row of every match-data table, in a stable order.
async fn snapshot(pool: &SqlitePool) -> Vec<String> {
    let queries = [
        "SELECT nameid || ':' || name FROM name ORDER BY nameid",
        "SELECT mapid || ':' || map FROM map ORDER BY mapid",
        "SELECT steamid64 || ':' || nameid || ':' || IFNULL(avatarhash, '-') FROM player ORDER BY steamid64",
        "SELECT logid || ':' || time || ':' || IFNULL(mapid, '-') || ':' || IFNULL(demoid, '-') FROM log ORDER BY logid",
        "SELECT logid || ':' || steamid64 || ':' || nameid || ':' || kills FROM log_player ORDER BY logid, steamid64",
        "SELECT demoid || ':' || title FROM demo ORDER BY demoid",
        "SELECT demoid || ':' || steamid64 FROM demo_player ORDER BY demoid, steamid64",
        "SELECT teamid || ':' || IFNULL(name, '-') FROM league_team ORDER BY teamid",
        "SELECT matchid || ':' || score1 || ':' || fetched FROM league_match ORDER BY matchid",
        "SELECT teamid || ':' || steamid64 || ':' || time || ':' || kind FROM league_transfer ORDER BY 1",
    ];

    let mut rows = Vec::new();
    for query in queries {
        let table: Vec<String> = sqlx::query_scalar(query).fetch_all(pool).await.unwrap();
        rows.push(format!("{}: {:?}", query, table));
    }
    rows
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn mixed_batch() -> Vec<Record> {
    vec![
        Record::Log(log(100, &[(1, "alice"), (2, "bob"), (3, "carol")])),
        Record::Log(log(105, &[(2, "bob"), (4, "dave")])),
        Record::Demo(demo(7, &[(1, "alice"), (5, "erin")])),
        profile(2, "bobby", "abc123"),
        Record::Match(league_match(900, 5, 1_700_000_000)),
        Record::Transfer(TransferRecord {
            team: LeagueTeam {
                teamid: 10,
                name: None,
            },
            player: player(6, "frank"),
            kind: TransferKind::Joined,
            time: 1_650_000_000,
            fetched: 1_700_000_000,
        }),
    ]
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_merging_same_batch_twice_is_idempotent() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());
    let batch = mixed_batch();

    let first = pipeline.merge(&batch).await.unwrap();
    let after_first = snapshot(&pool).await;

    let second = pipeline.merge(&batch).await.unwrap();
    let after_second = snapshot(&pool).await;

    assert_eq!(after_first, after_second);
    assert_eq!(first.logs_inserted, 2);
    assert_eq!(first.demos_inserted, 1);
    assert_eq!(first.transfers_inserted, 1);
    assert_eq!(second.logs_inserted, 0);
    assert_eq!(second.demos_inserted, 0);
    assert_eq!(second.transfers_inserted, 0);
    assert_eq!(second.names_interned, 0);
}

#[tokio::test]
async fn test_profile_overwrites_name_and_avatar() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());
    let directory = SqlitePlayerDirectory::new(pool.clone());
    let steamid = SteamId::from_account_id(2);

    pipeline
        .merge(&[Record::Log(log(100, &[(1, "alice"), (2, "bob")]))])
        .await
        .unwrap();
    let referenced = directory.find(steamid).await.unwrap().unwrap();
    assert_eq!(referenced.name, "bob");
    assert_eq!(referenced.avatar_hash, None);

    pipeline.merge(&[profile(2, "bobby", "aaa")]).await.unwrap();
    pipeline.merge(&[profile(2, "robert", "bbb")]).await.unwrap();

    let current = directory.find(steamid).await.unwrap().unwrap();
    assert_eq!(current.name, "robert");
    assert_eq!(current.avatar_hash.as_deref(), Some("bbb"));
}

#[tokio::test]
async fn test_referenced_player_does_not_overwrite_profile() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());
    let directory = SqlitePlayerDirectory::new(pool.clone());

    pipeline.merge(&[profile(2, "bobby", "aaa")]).await.unwrap();
    pipeline
        .merge(&[Record::Log(log(100, &[(1, "alice"), (2, "old name")]))])
        .await
        .unwrap();

    let current = directory
        .find(SteamId::from_account_id(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.name, "bobby");
    assert_eq!(current.avatar_hash.as_deref(), Some("aaa"));
}

#[tokio::test]
async fn test_names_are_interned_once_and_never_rewritten() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());

    pipeline.merge(&[profile(1, "alice", "a")]).await.unwrap();
    let alice_id: i64 = sqlx::query_scalar("SELECT nameid FROM name WHERE name = 'alice'")
        .fetch_one(&pool)
        .await
        .unwrap();

    pipeline.merge(&[profile(1, "alicia", "a")]).await.unwrap();
    pipeline.merge(&[profile(3, "alice", "c")]).await.unwrap();

    assert_eq!(count(&pool, "name").await, 2);
    let still_alice: String = sqlx::query_scalar("SELECT name FROM name WHERE nameid = ?")
        .bind(alice_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(still_alice, "alice");
}

#[tokio::test]
async fn test_committed_log_is_immutable() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());

    pipeline
        .merge(&[Record::Log(log(100, &[(1, "alice"), (2, "bob")]))])
        .await
        .unwrap();

    let mut changed = log(100, &[(1, "alice"), (2, "bob"), (3, "carol")]);
    changed.title = "Rewritten".to_string();
    let report = pipeline.merge(&[Record::Log(changed)]).await.unwrap();

    assert_eq!(report.logs_inserted, 0);
    let title: String = sqlx::query_scalar("SELECT title FROM log WHERE logid = 100")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Log 100");
    assert_eq!(count(&pool, "log_player").await, 2);
}

#[tokio::test]
async fn test_duplicate_records_in_one_batch() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());
    let record = Record::Log(log(100, &[(1, "alice")]));

    let report = pipeline
        .merge(&[record.clone(), record.clone(), record])
        .await
        .unwrap();

    assert_eq!(report.records, 3);
    assert_eq!(report.logs_inserted, 1);
    assert_eq!(count(&pool, "log").await, 1);
}

#[tokio::test]
async fn test_link_demo_survives_reimport() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());
    let record = Record::Log(log(100, &[(1, "alice")]));

    pipeline.merge(&[record.clone()]).await.unwrap();
    assert_eq!(pipeline.linked_demo(100).await.unwrap(), None);

    assert!(pipeline.link_demo(100, 7).await.unwrap());
    assert!(!pipeline.link_demo(999, 7).await.unwrap());

    pipeline.merge(&[record]).await.unwrap();
    assert_eq!(pipeline.linked_demo(100).await.unwrap(), Some(7));
    assert!(matches!(
        pipeline.linked_demo(999).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_league_rows_follow_mutable_fields() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());

    pipeline
        .merge(&[Record::Match(league_match(900, 0, 1_700_000_000))])
        .await
        .unwrap();

    let mut rescored = league_match(900, 5, 1_700_100_000);
    rescored.team1.name = None;
    rescored.team2.name = Some("Bravo".to_string());
    pipeline.merge(&[Record::Match(rescored)]).await.unwrap();

    let (score1, fetched): (i64, i64) =
        sqlx::query_as("SELECT score1, fetched FROM league_match WHERE matchid = 900")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!((score1, fetched), (5, 1_700_100_000));

    let names: Vec<Option<String>> =
        sqlx::query_scalar("SELECT name FROM league_team ORDER BY teamid")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        names,
        vec![Some("Alpha".to_string()), Some("Bravo".to_string())]
    );
}

#[tokio::test]
async fn test_failed_batch_leaves_no_trace() {
    let pool = create_test_pool().await.unwrap();
    let pipeline = MergePipeline::new(pool.clone());

    // The demo row is written late in the transaction, after names and players.
    sqlx::query("DROP TABLE demo_player")
        .execute(&pool)
        .await
        .unwrap();

    let result = pipeline
        .merge(&[
            profile(1, "alice", "a"),
            Record::Log(log(100, &[(2, "bob")])),
            Record::Demo(demo(7, &[(3, "carol")])),
        ])
        .await;

    match result {
        Err(StoreError::Merge { records, .. }) => assert_eq!(records, 3),
        other => panic!("expected merge error, got {:?}", other),
    }

    for table in ["name", "map", "player", "log", "log_player", "demo"] {
        assert_eq!(count(&pool, table).await, 0, "{} should be empty", table);
    }
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let pool = create_test_pool().await.unwrap();
    let report = MergePipeline::new(pool.clone()).merge(&[]).await.unwrap();
    assert_eq!(report.records, 0);
    assert_eq!(count(&pool, "name").await, 0);
}
