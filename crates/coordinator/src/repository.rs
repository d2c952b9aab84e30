//! In-process result repository.

use async_trait::async_trait;
use sizhen_common::{CoordinationResult, Result, ResultRepository, SizhenError};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, CoordinationResult>,
    order: VecDeque<String>,
}

/// Keeps the most recent results in memory, evicting the oldest beyond capacity.
///
/// Saving an id twice overwrites the stored result.
#[derive(Clone)]
pub struct InMemoryResultRepository {
    entries: Arc<RwLock<Entries>>,
    capacity: usize,
}

impl Default for InMemoryResultRepository {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl InMemoryResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResultRepository for InMemoryResultRepository {
    async fn save(&self, result: &CoordinationResult) -> Result<()> {
        let mut entries = self.entries.write().await;
        let id = result.coordination_id.clone();

        if entries.by_id.insert(id.clone(), result.clone()).is_none() {
            entries.order.push_back(id);
        }

        while entries.by_id.len() > self.capacity {
            if let Some(evicted) = entries.order.pop_front() {
                debug!(coordination_id = %evicted, "Evicted stored coordination result");
                entries.by_id.remove(&evicted);
            }
        }
        Ok(())
    }

    async fn get_by_coordination_id(&self, coordination_id: &str) -> Result<CoordinationResult> {
        self.entries
            .read()
            .await
            .by_id
            .get(coordination_id)
            .cloned()
            .ok_or_else(|| SizhenError::NotFound(format!("coordination {coordination_id}")))
    }
}
