//! JSON-RPC 2.0 transport over HTTP(S).
//!
//! Implements [`RpcTransport`](super::RpcTransport) using `reqwest`, with
//! optional basic auth and optional outbound request rate limiting.

mod client;
mod connection;
mod protocol;

pub use client::HttpRpcClient;
