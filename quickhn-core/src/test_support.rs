//! Test doubles for source adapters.
//!
//! [`StubSource`] answers from memory, counts its invocations and can be
//! slowed down or made to fail, so cache behaviour can be checked without a
//! network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use geo::{Intersects, Rect};

use crate::{Coverage, Feature, SourceAdapter, SourceError};

#[derive(Debug, Clone)]
enum StubResponse {
    Features(Vec<Feature>),
    Error(SourceError),
}

/// In-memory [`SourceAdapter`] used in tests.
///
/// A successful stub returns the configured features lying inside the
/// requested box, border points included.
#[derive(Debug)]
pub struct StubSource {
    name: String,
    coverage: Coverage,
    response: StubResponse,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubSource {
    /// Stub serving `features`.
    #[must_use]
    pub fn with_features(name: impl Into<String>, coverage: Coverage, features: Vec<Feature>) -> Self {
        Self::new(name.into(), coverage, StubResponse::Features(features))
    }

    /// Stub failing every call with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, coverage: Coverage, error: SourceError) -> Self {
        Self::new(name.into(), coverage, StubResponse::Error(error))
    }

    fn new(name: String, coverage: Coverage, response: StubResponse) -> Self {
        Self {
            name,
            coverage,
            response,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times [`SourceAdapter::fetch`] was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    async fn fetch(&self, bbox: Rect<f64>) -> Result<Vec<Feature>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.response {
            StubResponse::Features(features) => Ok(features
                .iter()
                // `Intersects` treats boundary points as inside the rectangle.
                .filter(|feature| bbox.intersects(&feature.location))
                .cloned()
                .collect()),
            StubResponse::Error(error) => Err(error.clone()),
        }
    }
}

/// Erase a list of stubs into the adapter list expected by the cache.
#[must_use]
pub fn as_adapters(stubs: &[Arc<StubSource>]) -> Vec<Arc<dyn SourceAdapter>> {
    stubs
        .iter()
        .map(|stub| Arc::clone(stub) as Arc<dyn SourceAdapter>)
        .collect()
}
