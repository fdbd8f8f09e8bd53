use bucket_inventory::{
    CacheError, CacheStore, CachedSource, LocalSource, RepositorySource, reconcile,
};
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn sample_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("reports/2024")).unwrap();
    fs::create_dir_all(dir.path().join("images")).unwrap();
    fs::write(dir.path().join("reports/2024/q1.csv"), vec![b'x'; 2048]).unwrap();
    fs::write(dir.path().join("reports/2024/q2.csv"), vec![b'y'; 4096]).unwrap();
    fs::write(dir.path().join("images/logo.png"), vec![0u8; 300]).unwrap();
    fs::write(dir.path().join("empty.txt"), b"").unwrap();
    dir
}

#[tokio::test]
async fn cached_inventory_survives_dropping_the_index() {
    let files = sample_tree();
    let cache = TempDir::new().unwrap();
    let store = CacheStore::new(cache.path());

    let rebuilt = store
        .rebuild("bucket1", &LocalSource::new("bucket1", files.path()))
        .await
        .unwrap();
    let expected: Vec<(String, i64, _)> = rebuilt
        .iter()
        .map(|agg| {
            (
                agg.key().to_string(),
                agg.current_size().unwrap(),
                agg.current_timestamp().unwrap(),
            )
        })
        .collect();
    drop(rebuilt);

    let loaded = store.load("bucket1").await.unwrap();
    assert_eq!(loaded.len(), expected.len());
    for (key, size, timestamp) in expected {
        let agg = loaded.get(&key).unwrap();
        assert_eq!(agg.current_size().unwrap(), size);
        assert_eq!(agg.current_timestamp().unwrap(), timestamp);
        assert_eq!(agg.version_count(), 1);
    }
    assert_eq!(loaded.summary().current_bytes, 2048 + 4096 + 300);
}

#[tokio::test]
async fn cached_source_matches_direct_load() {
    let files = sample_tree();
    let cache = TempDir::new().unwrap();
    let store = CacheStore::new(cache.path());
    store
        .rebuild("docs", &LocalSource::new("docs", files.path()))
        .await
        .unwrap();

    let source = CachedSource::new(store.clone(), "docs");
    assert_eq!(source.name(), "docs");
    let via_source = reconcile(&source, &CancellationToken::new()).await.unwrap();
    let via_load = store.load("docs").await.unwrap();
    assert_eq!(via_source, via_load);
}

#[tokio::test]
async fn refresh_picks_up_filesystem_changes() {
    let files = sample_tree();
    let cache = TempDir::new().unwrap();
    let store = CacheStore::new(cache.path());
    let source = LocalSource::new("docs", files.path());
    let cancel = CancellationToken::new();

    store
        .load_or_rebuild("docs", &source, false, &cancel)
        .await
        .unwrap();
    fs::write(files.path().join("images/banner.png"), vec![0u8; 10]).unwrap();

    let stale = store
        .load_or_rebuild("docs", &source, false, &cancel)
        .await
        .unwrap();
    assert!(!stale.contains_key("images/banner.png"));

    let fresh = store
        .load_or_rebuild("docs", &source, true, &cancel)
        .await
        .unwrap();
    assert_eq!(fresh.get("images/banner.png").unwrap().current_size().unwrap(), 10);
}

#[tokio::test]
async fn unknown_source_name_is_a_cache_miss() {
    let cache = TempDir::new().unwrap();
    let store = CacheStore::new(cache.path());
    assert!(matches!(
        store.load("never-built").await,
        Err(CacheError::NotFound(_))
    ));
}
