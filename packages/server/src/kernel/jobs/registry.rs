//! Task handler registry.
//!
//! Maps task type strings (e.g. "echo") to async handlers. A handler takes
//! the payload's `data` map and returns a JSON result or an error; the
//! worker treats any handler error as a failed attempt and drives the
//! retry/DLQ branch. Handlers stay pure with respect to the pipeline: they
//! never touch job state.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use serde_json::{json, Map, Value};

use super::JobPayload;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type BoxedHandler = Box<dyn Fn(Map<String, Value>) -> HandlerFuture + Send + Sync>;

#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, BoxedHandler>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", |data| async move {
            let message = data
                .get("message")
                .and_then(|value| value.as_str())
                .unwrap_or("echo")
                .to_string();
            Ok(json!({"status": "success", "output": message}))
        });
        registry
    }

    /// Register a handler for a task type, replacing any previous one.
    pub fn register<F, Fut>(&mut self, task_type: impl Into<String>, handler: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.handlers
            .insert(task_type.into(), Box::new(move |data| Box::pin(handler(data))));
    }

    pub fn is_registered(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Execute the handler for this payload. Unregistered task types fall
    /// back to echoing the data back, so synthetic and ad-hoc jobs succeed.
    pub async fn execute(&self, payload: &JobPayload) -> Result<Value> {
        match self.handlers.get(&payload.task_type) {
            Some(handler) => handler(payload.data.clone()).await,
            None => Ok(json!({"status": "success", "output": payload.data})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn payload(task_type: &str, data: Value) -> JobPayload {
        JobPayload {
            task_type: task_type.to_string(),
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn echo_returns_the_message() {
        let registry = TaskRegistry::with_builtins();
        let result = registry
            .execute(&payload("echo", json!({"message": "hi"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"status": "success", "output": "hi"}));
    }

    #[tokio::test]
    async fn echo_defaults_when_message_is_absent() {
        let registry = TaskRegistry::with_builtins();
        let result = registry
            .execute(&payload("echo", json!({})))
            .await
            .unwrap();
        assert_eq!(result, json!({"status": "success", "output": "echo"}));
    }

    #[tokio::test]
    async fn unknown_task_type_falls_back_to_data() {
        let registry = TaskRegistry::with_builtins();
        let result = registry
            .execute(&payload("synthetic", json!({"index": 3})))
            .await
            .unwrap();
        assert_eq!(result, json!({"status": "success", "output": {"index": 3}}));
    }

    #[tokio::test]
    async fn registered_handler_wins_and_errors_propagate() {
        let mut registry = TaskRegistry::new();
        registry.register("always_fails", |_data| async move {
            Err(anyhow!("boom"))
        });

        assert!(registry.is_registered("always_fails"));
        let err = registry
            .execute(&payload("always_fails", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
