//! Local sources against real files and databases.

use bridge_traits::{ItemId, PageParams, SourceAdapter};
use core_store::{Record, RecordNormalizer, SteamId};
use provider_local::{JsonDirectorySource, SnapshotSource};
use provider_logs_tf::LogsTfNormalizer;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;

async fn write_snapshot(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    for statement in [
        "CREATE TABLE log (
            id INTEGER PRIMARY KEY,
            date TEXT NOT NULL,
            title TEXT,
            map TEXT,
            duration INTEGER,
            red_score INTEGER,
            blu_score INTEGER,
            uploader_steam_id INTEGER,
            uploader_name TEXT
        )",
        "CREATE TABLE player (
            log_id INTEGER NOT NULL,
            steam_id TEXT NOT NULL,
            name TEXT,
            team TEXT,
            kills INTEGER,
            deaths INTEGER,
            assists INTEGER,
            damage INTEGER
        )",
        "INSERT INTO log VALUES
            (2, '2020-09-13 12:00:00', 'RED vs BLU', 'cp_process_final', 1800, 5, 3, 76561197960265729, 'uploader'),
            (1, '2020-09-12 12:00:00', 'scrim', 'koth_product_rc9', 900, 2, 0, NULL, NULL)",
        "INSERT INTO player VALUES
            (2, '[U:1:2]', 'scout', 'Red', 20, 10, 5, 7000),
            (2, '[U:1:3]', 'medic', 'Blue', 1, 4, 30, 300)",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

#[tokio::test]
async fn test_directory_lists_ids_ascending_and_reads_documents() {
    let dir = tempfile::tempdir().unwrap();
    for id in [300u64, 25, 1000] {
        let body = serde_json::json!({"info": {"date": 1_600_000_000 + id as i64}});
        tokio::fs::write(dir.path().join(format!("{}.json", id)), body.to_string())
            .await
            .unwrap();
    }
    tokio::fs::write(dir.path().join("README.txt"), "not a log").await.unwrap();

    let source = JsonDirectorySource::new("logs/files", dir.path());
    let page = source.list_page(&PageParams::new(0, 2)).await.unwrap();
    let rest = source.list_page(&PageParams::new(2, 2)).await.unwrap();

    let ids: Vec<u64> = page.items.iter().chain(&rest.items).map(|i| i.id.get()).collect();
    assert_eq!(ids, vec![25, 300, 1000]);
    assert_eq!(page.total, Some(3));

    let payload = source.fetch_payload(ItemId(300)).await.unwrap();
    assert_eq!(payload.body["info"]["date"], 1_600_000_300);
}

#[tokio::test]
async fn test_directory_item_deleted_after_listing_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("7.json");
    tokio::fs::write(&path, "{}").await.unwrap();

    let source = JsonDirectorySource::new("logs/files", dir.path());
    let page = source.list_page(&PageParams::new(0, 10)).await.unwrap();
    assert_eq!(page.items.len(), 1);

    tokio::fs::remove_file(&path).await.unwrap();
    let err = source.fetch_payload(ItemId(7)).await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_directory_document_with_bad_json_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("8.json"), "{ truncated").await.unwrap();

    let source = JsonDirectorySource::new("logs/files", dir.path());
    let err = source.fetch_payload(ItemId(8)).await.unwrap_err();

    assert!(err.to_string().contains("Invalid JSON"));
}

#[tokio::test]
async fn test_missing_snapshot_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = SnapshotSource::new("logs/snapshot", dir.path().join("absent.db"));

    let page = source.list_page(&PageParams::new(0, 100)).await.unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total, Some(0));
    assert!(source.fetch_payload(ItemId(1)).await.is_err());
}

#[tokio::test]
async fn test_snapshot_lists_logs_with_dates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clone.db");
    write_snapshot(&path).await;

    let source = SnapshotSource::new("logs/snapshot", &path);
    let page = source.list_page(&PageParams::new(0, 100)).await.unwrap();

    assert_eq!(page.total, Some(2));
    let ids: Vec<u64> = page.items.iter().map(|i| i.id.get()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(page.items[1].created_at - page.items[0].created_at, 86_400);
}

#[tokio::test]
async fn test_snapshot_document_normalizes_as_logs_tf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clone.db");
    write_snapshot(&path).await;

    let source = SnapshotSource::new("logs/snapshot", &path);
    let payload = source.fetch_payload(ItemId(2)).await.unwrap();
    let records = LogsTfNormalizer::new().normalize(&payload).unwrap();

    let Record::Log(log) = &records[0] else {
        panic!("expected a log record, got {:?}", records);
    };
    assert_eq!(log.logid, 2);
    assert_eq!(log.title, "RED vs BLU");
    assert_eq!(log.map.as_deref(), Some("cp_process_final"));
    assert_eq!((log.red_score, log.blue_score), (5, 3));
    assert_eq!(log.duration, 1800);
    assert_eq!(log.uploader.as_ref().unwrap().steamid, SteamId::from_account_id(1));
    assert_eq!(log.players.len(), 2);
    let medic = log
        .players
        .iter()
        .find(|p| p.player.name == "medic")
        .unwrap();
    assert_eq!(medic.player.steamid, SteamId::from_account_id(3));
    assert_eq!(medic.assists, 30);

    let bare = source.fetch_payload(ItemId(1)).await.unwrap();
    let records = LogsTfNormalizer::new().normalize(&bare).unwrap();
    let Record::Log(log) = &records[0] else {
        panic!("expected a log record, got {:?}", records);
    };
    assert_eq!(log.uploader, None);
    assert!(log.players.is_empty());
}

#[tokio::test]
async fn test_snapshot_missing_log_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clone.db");
    write_snapshot(&path).await;

    let source = SnapshotSource::new("logs/snapshot", &path);
    let err = source.fetch_payload(ItemId(99)).await.unwrap_err();

    assert!(!err.is_retryable());
}
