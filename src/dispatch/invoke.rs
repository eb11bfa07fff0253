//! Handler invocation with fault capture.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::dispatch::environment::{Environment, Outcome};
use crate::observability::metrics;
use crate::routing::Handler;

/// A handler error or panic, reported by topic only.
#[derive(Debug, thiserror::Error)]
#[error("Server error at topic {topic}")]
pub struct HandlerFault {
    pub topic: String,
}

/// Run `handler` against `env`. Errors and panics become a [`HandlerFault`].
pub async fn invoke(handler: &Handler, env: Environment) -> Result<Outcome, HandlerFault> {
    let topic = env.topic.clone();
    let request_id = env.request_id.clone();
    let transport = env.transport;

    let cause = match AssertUnwindSafe(handler.call(env)).catch_unwind().await {
        Ok(Ok(outcome)) => return Ok(outcome),
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string()),
    };

    tracing::error!(
        topic = %topic,
        request_id = %request_id,
        transport = %transport,
        error = %cause,
        "Handler failed"
    );
    metrics::record_handler_fault(&topic);
    Err(HandlerFault { topic })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::environment::Transport;
    use crate::routing::HandlerError;

    fn env(topic: &str) -> Environment {
        Environment::new(Transport::Http, topic, topic)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let handler = Handler::new(|env| async move { Ok(env.reply("ta-da!")) });
        let outcome = invoke(&handler, env("test.call")).await.unwrap();
        assert_eq!(outcome.kind(), "reply");
    }

    #[tokio::test]
    async fn test_error_becomes_fault_with_topic() {
        let handler = Handler::new(|_env| async move { Err(HandlerError::from("boom")) });
        let fault = invoke(&handler, env("test.error")).await.unwrap_err();
        assert_eq!(fault.to_string(), "Server error at topic test.error");
    }

    #[tokio::test]
    async fn test_panic_becomes_fault() {
        let handler = Handler::new(|_env| async move {
            if true {
                panic!("I am bad at things!");
            }
            Ok(Outcome::Reply("unreachable".into()))
        });
        let fault = invoke(&handler, env("fail")).await.unwrap_err();
        assert_eq!(fault.to_string(), "Server error at topic fail");
    }
}
