//! Transports and log capture used by unit tests.

use crate::transport::Transport;
use crate::{Response, Result};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use reqwest::Request;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::Level;
use tracing::subscriber::DefaultGuard;

/// Answers every request with `200 OK`, echoing the request headers, and
/// records the headers it saw.
#[derive(Default)]
pub(crate) struct EchoTransport {
    pub(crate) seen: Mutex<Vec<HeaderMap>>,
}

#[async_trait]
impl Transport for EchoTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.seen.lock().push(request.headers().clone());
        Ok(Response::new(
            StatusCode::OK,
            request.headers().clone(),
            "ok",
            request.url().clone(),
        ))
    }
}

/// Replays queued outcomes, then answers `200 OK` with an empty body.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(u16, &'static str)>>>,
    pub(crate) calls: Mutex<u32>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Result<(u16, &'static str)>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        *self.calls.lock() += 1;
        let next = self.script.lock().pop_front().unwrap_or(Ok((200, "")));
        let (status, body) = next?;
        Ok(Response::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body,
            request.url().clone(),
        ))
    }
}

/// Formatted log output collected by a thread-local subscriber.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a plain-text subscriber at `level` for the current thread.
    pub(crate) fn install(level: Level) -> (Self, DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let guard = tracing::subscriber::set_default(
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish(),
        );
        (logs, guard)
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
