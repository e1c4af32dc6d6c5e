//! Type-indexed handler registry.
//!
//! Handlers are registered per event type `E` and stored type-erased under
//! `TypeId::of::<E>()`. Running an event looks up exactly the handlers
//! registered for its type and spawns one task per handler. Each task runs
//! under its own deadline and its own tracing span.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::actions::ActionError;

/// Deadline for a single handler invocation.
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(3 * 60);

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), ActionError>> + Send>>;
type ErasedHandler = Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> HandlerFuture + Send + Sync>;

struct Entry {
    name: String,
    invoke: ErasedHandler,
}

/// How a handler invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The handler declined the event.
    Skipped(String),
    Failed(String),
    TimedOut,
}

/// Multimap from event type to handlers.
pub struct Registry {
    handlers: RwLock<HashMap<TypeId, Vec<Entry>>>,
    timeout: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_timeout(HANDLER_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Registry {
            handlers: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Registers `handler` for events of type `E`.
    pub async fn register<E, F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        E: Any + Send + Sync,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let name = name.into();
        let invoke: ErasedHandler = Arc::new(move |event: Arc<dyn Any + Send + Sync>| {
            match event.downcast::<E>() {
                Ok(event) => Box::pin(handler(event)) as HandlerFuture,
                // Unreachable: entries are keyed by the event's TypeId.
                Err(_) => Box::pin(async { Ok(()) }),
            }
        });

        debug!(handler = %name, event = std::any::type_name::<E>(), "registering handler");
        self.handlers
            .write()
            .await
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Entry { name, invoke });
    }

    /// Removes all handlers.
    pub async fn clear(&self) {
        self.handlers.write().await.clear();
    }

    /// Number of handlers registered for `E`.
    pub async fn handler_count<E: Any>(&self) -> usize {
        self.handlers
            .read()
            .await
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Spawns every handler registered for `E`.
    ///
    /// Each handler runs in its own task under a child span of `parent`.
    /// The returned handles may be awaited or dropped.
    pub async fn run<E>(&self, event: E, parent: &Span) -> Vec<JoinHandle<Outcome>>
    where
        E: Any + Send + Sync,
    {
        let event: Arc<dyn Any + Send + Sync> = Arc::new(event);
        let handlers = self.handlers.read().await;
        let Some(entries) = handlers.get(&TypeId::of::<E>()) else {
            debug!(parent: parent, event = std::any::type_name::<E>(), "no handlers registered");
            return Vec::new();
        };

        entries
            .iter()
            .map(|entry| {
                let span = info_span!(parent: parent, "handler", handler = %entry.name);
                let future = (entry.invoke)(Arc::clone(&event));
                let timeout = self.timeout;
                tokio::spawn(
                    async move { observe(tokio::time::timeout(timeout, future).await) }
                        .instrument(span),
                )
            })
            .collect()
    }
}

fn observe(result: Result<Result<(), ActionError>, tokio::time::error::Elapsed>) -> Outcome {
    match result {
        Ok(Ok(())) => {
            info!("handler finished");
            Outcome::Success
        }
        Ok(Err(ActionError::Skip(reason))) => {
            debug!(reason = %reason, "handler skipped event");
            Outcome::Skipped(reason)
        }
        Ok(Err(e)) => {
            error!(error = %e, "handler failed");
            Outcome::Failed(e.to_string())
        }
        Err(_) => {
            error!("handler timed out");
            Outcome::TimedOut
        }
    }
}
