// Queue engine and the registry of named queues

pub mod error;
pub mod fifo;
pub mod registry;

pub use error::QueueError;
pub use fifo::{hash_item, ContentHash, FifoQueue, QueueStats, QueueStatsSnapshot, HASH_LEN};
pub use registry::{QueueRegistry, StatsSummary, DEFAULT_QUEUE};
