use anyhow::{Context, Result};
use bucket_inventory::{CacheStore, LocalSource, config::AppConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + refresh flag ---
    let (cfg, refresh) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting bucket-inventory with config: {:?}", cfg);

    // --- Cancel enumeration on Ctrl-C ---
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling enumeration");
            on_signal.cancel();
        }
    });

    // --- Load the cache, rebuilding it when asked or missing ---
    let store = CacheStore::new(&cfg.cache_dir);
    let source = LocalSource::new(&cfg.source_name, &cfg.root).with_delimiter(&cfg.delimiter);
    let inventory = store
        .load_or_rebuild(&cfg.source_name, &source, refresh, &cancel)
        .await
        .with_context(|| format!("building inventory for `{}`", cfg.source_name))?;

    let summary = inventory.summary();
    tracing::info!(
        objects = summary.objects,
        versions = summary.versions,
        delete_markers = summary.delete_markers,
        deleted_objects = summary.deleted_objects,
        current_bytes = summary.current_bytes,
        billable_bytes = summary.billable_bytes,
        "Inventory of `{}` ready",
        cfg.source_name
    );

    Ok(())
}
