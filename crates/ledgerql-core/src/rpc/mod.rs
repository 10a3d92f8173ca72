//! JSON-RPC node access layer.
//!
//! Defines the [`RpcTransport`] trait, the method proxy ([`api::RpcApi`]),
//! the typed [`RpcClient`] facade used by resolvers, an HTTP JSON-RPC
//! transport ([`HttpRpcClient`]) and a test mock (`mock::MockTransport`).

pub mod api;
mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use api::{RpcApi, RpcApiConfig, RpcMethod, RpcRequest};
pub use http_adapter::HttpRpcClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::types::{Address, QueryConfig, Signature, Slot};

/// Minimal transport covering what the resolution pipeline needs: deliver a
/// request descriptor to the node and return the raw `result` member.
///
/// Implementations handle authentication, connection management and
/// JSON-RPC envelope decoding internally. A `null` result is returned as
/// `Value::Null`, not as an error.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, request: &RpcRequest) -> Result<Value, CoreError>;
}

// ==============================================================================
// Typed Client
// ==============================================================================

/// Typed facade over a transport. Builds requests through the method proxy,
/// sends them, and applies each request's response processor.
#[derive(Clone)]
pub struct RpcClient {
    api: RpcApi,
    transport: Arc<dyn RpcTransport>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self::with_api(transport, RpcApi::default())
    }

    pub fn with_api(transport: Arc<dyn RpcTransport>, api: RpcApi) -> Self {
        Self { api, transport }
    }

    pub fn api(&self) -> &RpcApi {
        &self.api
    }

    pub async fn send(&self, request: RpcRequest) -> Result<Value, CoreError> {
        let raw = self.transport.send(&request).await?;
        Ok(request.process_response(raw))
    }

    /// `getAccountInfo`, unwrapped from its `{context, value}` envelope.
    pub async fn get_account_info(
        &self,
        address: &Address,
        config: &QueryConfig,
    ) -> Result<Option<Value>, CoreError> {
        let result = self.send(self.api.get_account_info(address, config)).await?;
        Ok(non_null(unwrap_context(result)))
    }

    pub async fn get_block(
        &self,
        slot: Slot,
        config: &QueryConfig,
    ) -> Result<Option<Value>, CoreError> {
        let result = self.send(self.api.get_block(slot, config)).await?;
        Ok(non_null(result))
    }

    /// `getProgramAccounts` elements (`{pubkey, account}`), accepting both the
    /// plain array and the `withContext` envelope.
    pub async fn get_program_accounts(
        &self,
        program: &Address,
        config: &QueryConfig,
    ) -> Result<Vec<Value>, CoreError> {
        let result = self
            .send(self.api.get_program_accounts(program, config))
            .await?;
        match unwrap_context(result) {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(CoreError::InvalidResponse(format!(
                "getProgramAccounts result must be an array, got: {other}"
            ))),
        }
    }

    pub async fn get_slot(&self, config: &QueryConfig) -> Result<Slot, CoreError> {
        let result = self.send(self.api.get_slot(config)).await?;
        let slot = result.as_u64().ok_or_else(|| {
            CoreError::InvalidResponse(format!("getSlot result must be an integer, got: {result}"))
        })?;
        debug!(slot, "node slot");
        Ok(Slot(slot))
    }

    pub async fn get_transaction(
        &self,
        signature: &Signature,
        config: &QueryConfig,
    ) -> Result<Option<Value>, CoreError> {
        let result = self.send(self.api.get_transaction(signature, config)).await?;
        Ok(non_null(result))
    }
}

/// Strip a `{context, value}` wrapper if present.
fn unwrap_context(result: Value) -> Value {
    match result {
        Value::Object(mut obj) if obj.contains_key("context") && obj.contains_key("value") => {
            obj.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}
