use thiserror::Error;

/// Failures raised by a single queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Nothing left to dequeue. Routine, client-driven state.
    #[error("queue is empty")]
    Empty,

    /// The dedup index disagrees with the list contents.
    #[error("integrity error, index did not have data")]
    Integrity,
}
