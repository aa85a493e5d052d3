//! Test utilities for HTTP-backed adapters.
//!
//! [`StubTransport`] replays queued responses in order and records every
//! requested URL, so adapters can be exercised without a network.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use quickhn_core::SourceError;

use crate::Transport;

/// Scripted [`Transport`] for tests.
///
/// # Example
///
/// ```
/// use quickhn_data::Transport;
/// use quickhn_data::test_support::StubTransport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = StubTransport::new();
/// transport.push_body("s1,Markt");
/// let body = transport.get_text("https://example.org/").await.unwrap();
/// assert_eq!(body, "s1,Markt");
/// assert_eq!(transport.requests(), vec!["https://example.org/"]);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<String, SourceError>>>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    /// Create a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response body.
    pub fn push_body(&self, body: impl Into<String>) {
        lock(&self.responses).push_back(Ok(body.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: SourceError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transport for StubTransport {
    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        lock(&self.requests).push(url.to_owned());
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| {
                Err(SourceError::Network {
                    url: url.to_owned(),
                    message: "no canned response queued".to_owned(),
                })
            })
    }
}
