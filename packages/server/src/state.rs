use std::sync::Arc;

use common::session::{ChunkReconciler, ProcessingStatusStore, SessionMetadataStore};
use common::storage::BlobStore;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn BlobStore>,
    pub sessions: SessionMetadataStore,
    pub status: ProcessingStatusStore,
    pub reconciler: ChunkReconciler,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn BlobStore>) -> Self {
        Self {
            sessions: SessionMetadataStore::new(store.clone()),
            status: ProcessingStatusStore::new(store.clone()),
            reconciler: ChunkReconciler::new(store.clone()),
            store,
            config,
        }
    }
}
