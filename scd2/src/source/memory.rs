use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::EtlResult;
use crate::source::SourceProvider;
use crate::types::SourceBundle;

/// Source serving a bundle held in memory.
///
/// The bundle can be swapped between runs with [`MemorySource::replace`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bundle: Arc<RwLock<SourceBundle>>,
}

impl MemorySource {
    pub fn new(bundle: SourceBundle) -> Self {
        Self {
            bundle: Arc::new(RwLock::new(bundle)),
        }
    }

    /// Replaces the bundle returned by subsequent extracts.
    pub async fn replace(&self, bundle: SourceBundle) {
        let mut inner = self.bundle.write().await;
        *inner = bundle;
    }
}

impl SourceProvider for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn extract(&self) -> EtlResult<SourceBundle> {
        let bundle = self.bundle.read().await;

        Ok(bundle.clone())
    }
}
