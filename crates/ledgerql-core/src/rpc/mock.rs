use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CoreError, RpcError};

use super::api::{RpcMethod, RpcRequest};
use super::RpcTransport;

#[derive(Clone)]
enum Canned {
    Result(Value),
    Error { code: i64, message: String },
}

/// A mock node for testing. Returns canned results keyed by method and, when
/// registered, by the request's first positional param (address, slot or
/// signature). Every request is recorded for later assertions.
pub struct MockTransport {
    responses: HashMap<(RpcMethod, Option<String>), Canned>,
    calls: Mutex<Vec<(RpcMethod, Vec<Value>)>>,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            responses: HashMap::new(),
        }
    }

    pub fn calls(&self) -> Vec<(RpcMethod, Vec<Value>)> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    pub fn call_count(&self, method: RpcMethod) -> usize {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .iter()
            .filter(|(m, _)| *m == method)
            .count()
    }
}

pub struct MockTransportBuilder {
    responses: HashMap<(RpcMethod, Option<String>), Canned>,
}

impl MockTransportBuilder {
    /// Result for any call to `method` without a more specific entry.
    pub fn with_result(mut self, method: RpcMethod, result: Value) -> Self {
        self.responses.insert((method, None), Canned::Result(result));
        self
    }

    /// Result for `method` when its first param equals `primary`.
    pub fn with_result_for(mut self, method: RpcMethod, primary: &str, result: Value) -> Self {
        self.responses
            .insert((method, Some(primary.to_owned())), Canned::Result(result));
        self
    }

    pub fn with_error(mut self, method: RpcMethod, code: i64, message: &str) -> Self {
        self.responses.insert(
            (method, None),
            Canned::Error {
                code,
                message: message.to_owned(),
            },
        );
        self
    }

    pub fn with_error_for(
        mut self,
        method: RpcMethod,
        primary: &str,
        code: i64,
        message: &str,
    ) -> Self {
        self.responses.insert(
            (method, Some(primary.to_owned())),
            Canned::Error {
                code,
                message: message.to_owned(),
            },
        );
        self
    }

    pub fn build(self) -> MockTransport {
        MockTransport {
            responses: self.responses,
            calls: Mutex::new(Vec::new()),
        }
    }
}

fn primary_param(params: &[Value]) -> Option<String> {
    match params.first()? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(&self, request: &RpcRequest) -> Result<Value, CoreError> {
        let method = request.method();
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push((method, request.params().to_vec()));

        // Yield so concurrent resolutions interleave like real network calls.
        tokio::task::yield_now().await;

        let canned = primary_param(request.params())
            .and_then(|primary| self.responses.get(&(method, Some(primary))))
            .or_else(|| self.responses.get(&(method, None)));

        match canned {
            Some(Canned::Result(value)) => Ok(value.clone()),
            Some(Canned::Error { code, message }) => Err(CoreError::Rpc(RpcError::ServerError {
                code: *code,
                message: message.clone(),
            })),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::api::RpcApi;
    use serde_json::json;

    #[tokio::test]
    async fn specific_entry_wins_over_method_default() {
        let rpc = MockTransport::builder()
            .with_result(RpcMethod::GetBlock, json!("default"))
            .with_result_for(RpcMethod::GetBlock, "7", json!("seven"))
            .build();
        let api = RpcApi::default();

        let seven = rpc.send(&api.invoke(RpcMethod::GetBlock, vec![json!(7)])).await;
        let other = rpc.send(&api.invoke(RpcMethod::GetBlock, vec![json!(8)])).await;

        assert_eq!(seven.unwrap(), json!("seven"));
        assert_eq!(other.unwrap(), json!("default"));
        assert_eq!(rpc.call_count(RpcMethod::GetBlock), 2);
    }

    #[tokio::test]
    async fn unknown_calls_return_null() {
        let rpc = MockTransport::builder().build();
        let result = rpc
            .send(&RpcApi::default().invoke(RpcMethod::GetTransaction, Vec::new()))
            .await
            .unwrap();
        assert!(result.is_null());
        assert_eq!(rpc.calls().len(), 1);
    }
}
