//! RPC method proxy.
//!
//! [`RpcMethod`] is the closed set of node methods this crate may call. An
//! [`RpcApi`] turns a method plus its raw positional arguments into an
//! [`RpcRequest`], passing the arguments through an optional params patcher
//! and attaching a response processor built from an optional response
//! patcher. The typed builders (`get_account_info`, ...) are the
//! compile-time mapping from method to request shape.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::types::{Address, QueryConfig, Signature, Slot};

// ==============================================================================
// Methods
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    GetAccountInfo,
    GetBlock,
    GetProgramAccounts,
    GetSlot,
    GetTransaction,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 5] = [
        Self::GetAccountInfo,
        Self::GetBlock,
        Self::GetProgramAccounts,
        Self::GetSlot,
        Self::GetTransaction,
    ];

    /// Wire name of the method.
    pub fn name(self) -> &'static str {
        match self {
            Self::GetAccountInfo => "getAccountInfo",
            Self::GetBlock => "getBlock",
            Self::GetProgramAccounts => "getProgramAccounts",
            Self::GetSlot => "getSlot",
            Self::GetTransaction => "getTransaction",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ==============================================================================
// Patch Hooks
// ==============================================================================

/// `(raw_params, method) -> wire_params`
pub type ParamsPatcher = Arc<dyn Fn(Vec<Value>, RpcMethod) -> Vec<Value> + Send + Sync>;

/// `(raw_response, method) -> response`
pub type ResponsePatcher = Arc<dyn Fn(Value, RpcMethod) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct RpcApiConfig {
    pub patch_params: Option<ParamsPatcher>,
    pub patch_response: Option<ResponsePatcher>,
}

impl fmt::Debug for RpcApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcApiConfig")
            .field("patch_params", &self.patch_params.is_some())
            .field("patch_response", &self.patch_response.is_some())
            .finish()
    }
}

// ==============================================================================
// Request Descriptor
// ==============================================================================

/// A request ready for the transport: method, wire params, and the
/// processor to apply to the raw result. Immutable once built.
#[derive(Clone)]
pub struct RpcRequest {
    method: RpcMethod,
    params: Vec<Value>,
    response_patcher: Option<ResponsePatcher>,
}

impl RpcRequest {
    pub fn method(&self) -> RpcMethod {
        self.method
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Apply the response processor (identity when no patcher is set).
    pub fn process_response(&self, raw: Value) -> Value {
        match &self.response_patcher {
            Some(patch) => patch(raw, self.method),
            None => raw,
        }
    }
}

impl fmt::Debug for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcRequest")
            .field("method", &self.method)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// ==============================================================================
// API
// ==============================================================================

#[derive(Debug, Clone, Default)]
pub struct RpcApi {
    config: RpcApiConfig,
}

impl RpcApi {
    pub fn new(config: RpcApiConfig) -> Self {
        Self { config }
    }

    /// Build a request descriptor for `method` from its raw arguments.
    pub fn invoke(&self, method: RpcMethod, raw_params: Vec<Value>) -> RpcRequest {
        let params = match &self.config.patch_params {
            Some(patch) => patch(raw_params, method),
            None => raw_params,
        };
        RpcRequest {
            method,
            params,
            response_patcher: self.config.patch_response.clone(),
        }
    }

    pub fn get_account_info(&self, address: &Address, config: &QueryConfig) -> RpcRequest {
        self.invoke(
            RpcMethod::GetAccountInfo,
            vec![address.as_str().into(), config.to_param()],
        )
    }

    pub fn get_block(&self, slot: Slot, config: &QueryConfig) -> RpcRequest {
        self.invoke(RpcMethod::GetBlock, vec![slot.0.into(), config.to_param()])
    }

    pub fn get_program_accounts(&self, program: &Address, config: &QueryConfig) -> RpcRequest {
        self.invoke(
            RpcMethod::GetProgramAccounts,
            vec![program.as_str().into(), config.to_param()],
        )
    }

    pub fn get_slot(&self, config: &QueryConfig) -> RpcRequest {
        let params = if config.is_empty() {
            Vec::new()
        } else {
            vec![config.to_param()]
        };
        self.invoke(RpcMethod::GetSlot, params)
    }

    pub fn get_transaction(&self, signature: &Signature, config: &QueryConfig) -> RpcRequest {
        self.invoke(
            RpcMethod::GetTransaction,
            vec![signature.as_str().into(), config.to_param()],
        )
    }
}
