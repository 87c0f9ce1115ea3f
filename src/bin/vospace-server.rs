//! The `vospace-server` binary: wires configuration, the metadata store, the
//! transfer engine, and the HTTP dispatcher together and serves them.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vospace_core::dispatch::{self, AppState};
use vospace_core::storage::NullBackend;
use vospace_core::{Config, MetadataStore, TransferEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::parse();
    tracing::info!(db_path = ?config.db_path, space_name = %config.space_name, bind_addr = %config.bind_addr, "starting vospace-server");

    let store = MetadataStore::new(&config.db_path, config.space_name.clone()).await?;

    // No deployment-specific storage backend is wired up yet; `NullBackend`
    // leaves `accepts`/`provides` empty and candidate endpoint filtering a
    // no-op, which keeps node CRUD and the async job lifecycle usable while
    // leaving the actual upload/download path to a storage-side process.
    let backend: Arc<dyn vospace_core::storage::StorageBackend> = Arc::new(NullBackend);

    let engine = TransferEngine::new(store.clone(), backend.clone(), Vec::new(), config.abort_grace_period);
    engine.recover_at_startup().await?;

    let state = AppState { store, engine, backend, directory_limit_cap: config.directory_limit_cap };
    let router = dispatch::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
