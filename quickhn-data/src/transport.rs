//! Request seam shared by every HTTP-backed adapter.

use async_trait::async_trait;
use quickhn_core::SourceError;

/// Performs a GET request and returns the response body.
///
/// Adapters build the full URL, including the bounding box, and parse the
/// body themselves. Swapping the transport lets tests serve canned payloads.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return its body as text.
    ///
    /// Non-success statuses are reported as [`SourceError::HttpStatus`].
    async fn get_text(&self, url: &str) -> Result<String, SourceError>;
}
