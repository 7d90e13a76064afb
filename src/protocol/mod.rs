// Line protocol: codec, per-connection handler, listener and client

pub mod client;
pub mod codec;
pub mod error;
pub mod handler;
pub mod server;

pub use client::QueueClient;
pub use codec::PayloadEncoding;
pub use error::{ClientError, CommandError, ServerError};
pub use handler::{Response, Session};
pub use server::{handle_connection, QueueServer};
