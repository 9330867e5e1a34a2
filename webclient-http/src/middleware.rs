//! Middleware chain for HTTP client.
//!
//! A stage receives the outgoing request and a [`Next`] continuation. It
//! either calls `next.run(request)` once, possibly with a modified request,
//! or returns its own error. `Next` is consumed by `run`, so a stage cannot
//! call the rest of the chain twice.

use crate::transport::Transport;
use crate::{Response, Result};
use async_trait::async_trait;
use reqwest::Request;
use std::sync::Arc;

/// Ordering ranks of the built-in stages. Lower ranks run first.
pub mod order {
    /// Correlation-id stamping.
    pub const CORRELATION_ID: i32 = 100;
    /// Bearer-token injection.
    pub const BEARER_TOKEN: i32 = 200;
    /// Request/response logging; runs last so it sees the final request.
    pub const REQUEST_LOGGING: i32 = 300;
    /// Rank of stages that do not declare one.
    pub const DEFAULT: i32 = 1000;
}

/// Middleware trait for processing requests and responses.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stage rank; lower ranks observe the request first.
    fn order(&self) -> i32 {
        order::DEFAULT
    }

    /// Process the request and call the next stage.
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response>;
}

/// The rest of the chain after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Pass the request to the next stage, or to the transport at the end of
    /// the chain.
    pub async fn run(self, request: Request) -> Result<Response> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    transport: self.transport,
                };
                stage.handle(request, next).await
            }
            None => self.transport.send(request).await,
        }
    }
}

/// Transport plus an ordered list of stages.
///
/// Cloning is cheap: stages and transport are shared. Adding stages to a
/// clone never affects the original.
#[derive(Clone)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn Transport>,
}

impl MiddlewareChain {
    /// Create a chain with no stages.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            stages: Vec::new(),
            transport,
        }
    }

    /// Add a stage, keeping the chain sorted by rank. Stages with equal rank
    /// keep the order in which they were added.
    pub fn with_middleware(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self.stages.sort_by_key(|stage| stage.order());
        self
    }

    /// Add several stages.
    pub fn with_all<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.stages.extend(stages);
        self.stages.sort_by_key(|stage| stage.order());
        self
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[Arc<dyn Middleware>] {
        &self.stages
    }

    /// Check if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The transport at the end of the chain.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Execute the request through every stage and the transport.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        Next {
            stages: &self.stages,
            transport: self.transport.as_ref(),
        }
        .run(request)
        .await
    }
}
