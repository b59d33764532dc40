//! JSON-RPC API Layer
//!
//! Exposes the queue manager to the surrounding service over JSON-RPC 2.0.
//! Every method takes a single params object and is versioned (`*.v1`).

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
