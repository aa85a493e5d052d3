//! Test helpers for writing sources files and stubbing the transport.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use quickhn_data::Transport;
use quickhn_data::test_support::StubTransport;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

/// Box inside the single grid cell holding the Grand-Place test data.
pub(super) const GRAND_PLACE_BBOX: &str = "4.3501,50.8401,4.3509,50.8409";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write file");
}

pub(super) fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace")
}

/// Sources document with one line feed covering central Brussels.
pub(super) fn brussels_sources() -> String {
    json!({
        "sources": [{
            "kind": "lines",
            "name": "quick-hn",
            "coverage": { "bbox": [4.24, 50.76, 4.49, 50.92] },
            "url_template": "https://hn.example/?left={left}&top={top}&right={right}&bottom={bottom}"
        }]
    })
    .to_string()
}

/// Hands out a prepared [`StubTransport`] instead of an HTTP client.
pub(super) struct StubTransportBuilder {
    pub(super) transport: Arc<StubTransport>,
}

impl TransportBuilder for StubTransportBuilder {
    fn build(&self, _config: &QueryConfig) -> Result<Arc<dyn Transport>, CliError> {
        let shared: Arc<dyn Transport> = self.transport.clone();
        Ok(shared)
    }
}
