pub mod json_file;
pub mod snapshot;
pub mod store;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::snapshot::Snapshot;

/// Storage for the scoring document.
///
/// `save` must be atomic: after an error the previously saved document is
/// still the one `load` returns.
#[async_trait]
pub trait Repository: Send + Sync {
    /// The stored document, or `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<Snapshot>>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    fn describe(&self) -> String;
}

#[async_trait]
impl<R: Repository + ?Sized> Repository for Box<R> {
    async fn load(&self) -> Result<Option<Snapshot>> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).save(snapshot).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// In-process repository. Cloning shares the underlying document.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    document: Arc<RwLock<Option<Snapshot>>>,
    fail_next_save: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            document: Arc::new(RwLock::new(Some(snapshot))),
            ..Self::default()
        }
    }

    /// Make the next `save` fail without touching the stored document.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> Option<Snapshot> {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.document.read().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            bail!("injected save failure");
        }
        *self.document.write().await = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
