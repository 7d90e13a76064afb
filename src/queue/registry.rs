use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use super::fifo::{FifoQueue, QueueStatsSnapshot};

/// Name of the queue every connection starts on.
pub const DEFAULT_QUEUE: &str = "default";

/// Named queues, created on first reference and kept for the process lifetime.
pub struct QueueRegistry {
    queues: DashMap<String, Arc<FifoQueue>>,
    allow_duplicates: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub total_queues: usize,
    pub queues: BTreeMap<String, QueueStatsSnapshot>,
}

impl QueueRegistry {
    pub fn new(allow_duplicates: bool) -> Self {
        let registry = Self {
            queues: DashMap::new(),
            allow_duplicates,
        };
        registry.get_or_create(DEFAULT_QUEUE);
        registry
    }

    /// Look up `name`, registering a fresh queue if it has never been seen.
    ///
    /// Insertion goes through the shard-locked entry API, so racing first
    /// uses of a name all receive the same instance.
    pub fn get_or_create(&self, name: &str) -> Arc<FifoQueue> {
        if let Some(queue) = self.get(name) {
            return queue;
        }

        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(queue = name, allow_duplicates = self.allow_duplicates, "created queue");
                Arc::new(FifoQueue::new(name, self.allow_duplicates))
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<FifoQueue>> {
        self.queues.get(name).map(|entry| entry.value().clone())
    }

    pub fn list_queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    pub fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    pub fn stats_summary(&self) -> StatsSummary {
        let queues: BTreeMap<String, QueueStatsSnapshot> = self
            .queues
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();

        StatsSummary {
            total_queues: queues.len(),
            queues,
        }
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}
