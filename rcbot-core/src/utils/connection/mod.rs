//! Module Exports
//!
//! This file exports the modules that make up the command endpoint.
//!
//! # Modules
//! - `endpoint`: request/reply transports (ZeroMQ PAIR socket, in-memory pair).
//! - `messages`: request parsing and reply headers.
//! - `server`: the command server loop.

pub mod endpoint;
pub mod messages;
/// Module for the command server loop and request dispatch.
pub mod server;

pub use endpoint::{memory_pair, Endpoint, MemoryEndpoint, MemoryPeer, PairEndpoint};
pub use messages::{ErrorReply, FrameHeader};
