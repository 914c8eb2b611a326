use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// 任务处理器返回的错误
///
/// 调度器对所有失败一视同仁：错误信息写入任务的 `error` 字段，然后按重试策略处理。
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("处理超时 ({0}ms)")]
    Timeout(u64),

    #[error("无效的任务负载: {0}")]
    InvalidPayload(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::InvalidPayload(e.to_string())
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

/// 任务处理器
///
/// 一个任务类型对应一个处理器，负责该类型的业务逻辑。
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> HandlerResult;
}

/// 把异步闭包包装成处理器
///
/// ```rust
/// use serde_json::{json, Value};
/// use taskqueue_worker::{HandlerFn, HandlerRegistry};
///
/// let mut registry = HandlerRegistry::new();
/// registry.register(
///     "double",
///     HandlerFn::new(|payload: Value| async move {
///         let n = payload["n"].as_i64().unwrap_or_default();
///         Ok(json!(n * 2))
///     }),
/// );
/// assert!(registry.contains("double"));
/// ```
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut> HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, payload: Value) -> HandlerResult {
        (self.f)(payload).await
    }
}

/// 默认处理器：原样返回负载
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl TaskHandler for EchoHandler {
    async fn handle(&self, payload: Value) -> HandlerResult {
        Ok(json!({ "echo": payload }))
    }
}

/// 任务类型到处理器的映射，未注册的类型交给默认处理器
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    fallback: Arc<dyn TaskHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(EchoHandler),
        }
    }

    pub fn with_fallback(mut self, handler: impl TaskHandler + 'static) -> Self {
        self.fallback = Arc::new(handler);
        self
    }

    /// 注册处理器，返回被替换的旧处理器
    pub fn register(
        &mut self,
        task_type: impl Into<String>,
        handler: impl TaskHandler + 'static,
    ) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.insert(task_type.into(), Arc::new(handler))
    }

    pub fn resolve(&self, task_type: &str) -> Arc<dyn TaskHandler> {
        self.handlers
            .get(task_type)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_registered_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "upper",
            HandlerFn::new(|payload: Value| async move {
                match payload.as_str() {
                    Some(text) => Ok(json!(text.to_uppercase())),
                    None => Err(HandlerError::InvalidPayload("expected string".into())),
                }
            }),
        );

        let handler = registry.resolve("upper");
        assert_eq!(handler.handle(json!("abc")).await.unwrap(), json!("ABC"));
        assert!(matches!(
            handler.handle(json!(1)).await,
            Err(HandlerError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_uses_fallback() {
        let registry = HandlerRegistry::new();
        assert!(!registry.contains("mystery"));

        let result = registry.resolve("mystery").handle(json!({"a": 1})).await;
        assert_eq!(result.unwrap(), json!({"echo": {"a": 1}}));
    }

    #[tokio::test]
    async fn test_custom_fallback() {
        let registry = HandlerRegistry::new().with_fallback(HandlerFn::new(|_: Value| async {
            Err(HandlerError::failed("no handler"))
        }));

        let err = registry.resolve("anything").handle(Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "no handler");
    }

    #[test]
    fn test_register_replaces_and_lists_types() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.register("b", EchoHandler).is_none());
        assert!(registry.register("a", EchoHandler).is_none());
        assert!(registry.register("b", EchoHandler).is_some());

        assert_eq!(registry.task_types(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(HandlerError::Timeout(1500).to_string(), "处理超时 (1500ms)");
    }
}
