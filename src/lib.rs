// queued - a FIFO queue exposed as a network service
//
// This library provides the queue engine and the line protocol.
// Binary entry point is in src/main.rs

pub mod config;
pub mod protocol;
pub mod queue;

pub use config::ServerConfig;
pub use protocol::{QueueClient, QueueServer};
pub use queue::{hash_item, FifoQueue, QueueError, QueueRegistry};
