//! Query command implementation for the quickhn CLI.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geo::{Coord, Rect};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use quickhn_core::{
    AddressIndex, CacheConfig, CellIndex, CullReport, ExtentResult, Feature, FeatureId,
    FeatureKey,
};
use quickhn_data::{
    HttpSourceConfig, HttpTransport, SourceDefinition, Transport, build_sources, parse_sources,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_CELL_VISIT_CEILING, ARG_CULL_DISTANCE_M, ARG_LOOKUP, ARG_SOURCES,
    ARG_TIMEOUT_SECS, CliError, ENV_BBOX, ENV_SOURCES,
};

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load source definitions from a JSON file and fetch the house \
                 numbers inside each bounding box through the cell cache. After \
                 every box the view is moved to its centre, so distant cells \
                 are culled exactly as an interactive client would see them.",
    about = "Fetch house numbers for one or more bounding boxes"
)]
#[ortho_config(prefix = "QUICKHN")]
pub(crate) struct QueryArgs {
    /// Path to a JSON file listing the address sources.
    #[arg(long = ARG_SOURCES, value_name = "path")]
    #[serde(default)]
    pub(crate) sources: Option<Utf8PathBuf>,
    /// Bounding box to query as `left,bottom,right,top` in degrees.
    #[arg(long = ARG_BBOX, value_name = "left,bottom,right,top")]
    #[serde(default)]
    pub(crate) bbox: Vec<String>,
    /// Feature id to look up once every box has been queried.
    #[arg(long = ARG_LOOKUP, value_name = "id")]
    #[serde(default)]
    pub(crate) lookup: Option<String>,
    /// Maximum number of cells visited per bounding box.
    #[arg(long = ARG_CELL_VISIT_CEILING, value_name = "cells")]
    #[serde(default)]
    pub(crate) cell_visit_ceiling: Option<usize>,
    /// Distance in metres beyond which cached cells are culled.
    #[arg(long = ARG_CULL_DISTANCE_M, value_name = "metres")]
    #[serde(default)]
    pub(crate) cull_distance_m: Option<f64>,
    /// Per-request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl QueryArgs {
    pub(crate) fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

/// Resolved `query` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    /// Path to the sources file.
    pub(crate) sources: Utf8PathBuf,
    /// Boxes to query, in command-line order.
    pub(crate) extents: Vec<Rect<f64>>,
    /// Optional feature to look up after the queries.
    pub(crate) lookup: Option<FeatureId>,
    /// Cache tuning.
    pub(crate) cache: CacheConfig,
    /// HTTP client settings shared by every source.
    pub(crate) http: HttpSourceConfig,
}

impl QueryConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.sources, ARG_SOURCES)
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match path.metadata() {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let sources = args.sources.ok_or(CliError::MissingArgument {
            field: ARG_SOURCES,
            env: ENV_SOURCES,
        })?;
        if args.bbox.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_BBOX,
                env: ENV_BBOX,
            });
        }
        let extents = args
            .bbox
            .iter()
            .map(String::as_str)
            .map(parse_bbox)
            .collect::<Result<Vec<_>, _>>()?;

        let mut cache = CacheConfig::default();
        let mut http = HttpSourceConfig::default();
        if let Some(ceiling) = args.cell_visit_ceiling {
            if ceiling == 0 {
                return Err(CliError::InvalidOption {
                    field: ARG_CELL_VISIT_CEILING,
                    reason: "must be at least 1",
                });
            }
            cache = cache.with_cell_visit_ceiling(ceiling);
        }
        if let Some(distance) = args.cull_distance_m {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(CliError::InvalidOption {
                    field: ARG_CULL_DISTANCE_M,
                    reason: "must be a positive number of metres",
                });
            }
            cache = cache.with_cull_distance_m(distance);
        }
        if let Some(secs) = args.timeout_secs {
            if secs == 0 {
                return Err(CliError::InvalidOption {
                    field: ARG_TIMEOUT_SECS,
                    reason: "must be at least 1",
                });
            }
            cache = cache.with_adapter_timeout(Duration::from_secs(secs));
            http = http.with_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            sources,
            extents,
            lookup: args.lookup.as_deref().map(FeatureId::parse),
            cache,
            http,
        })
    }
}

/// Parse `left,bottom,right,top` into a rectangle.
pub(crate) fn parse_bbox(value: &str) -> Result<Rect<f64>, CliError> {
    let invalid = |reason: String| CliError::InvalidBbox {
        value: value.to_owned(),
        reason,
    };
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid(err.to_string()))?;
    let [left, bottom, right, top] = parts.as_slice() else {
        return Err(invalid("expected left,bottom,right,top".to_owned()));
    };
    if ![left, bottom, right, top].iter().all(|v| v.is_finite()) {
        return Err(invalid("coordinates must be finite".to_owned()));
    }
    if left > right || bottom > top {
        return Err(invalid("left/bottom must not exceed right/top".to_owned()));
    }
    Ok(Rect::new(
        Coord {
            x: *left,
            y: *bottom,
        },
        Coord { x: *right, y: *top },
    ))
}

/// One line of output per queried box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExtentReport {
    /// The queried box as `[left, bottom, right, top]`.
    pub(crate) bbox: [f64; 4],
    pub(crate) features: Vec<Feature>,
    pub(crate) ceiling_exceeded: bool,
    pub(crate) cells_visited: usize,
    /// Cells culled when the view moved to the box centre.
    pub(crate) evicted_cells: Vec<CellIndex>,
    /// Features dropped by that cull, qualified by source.
    pub(crate) removed_features: Vec<FeatureKey>,
}

impl ExtentReport {
    fn new(extent: Rect<f64>, result: ExtentResult, culled: CullReport) -> Self {
        let (min, max) = (extent.min(), extent.max());
        Self {
            bbox: [min.x, min.y, max.x, max.y],
            features: result.features,
            ceiling_exceeded: result.ceiling_exceeded,
            cells_visited: result.cells_visited,
            evicted_cells: culled.evicted_cells,
            removed_features: culled.removed_features,
        }
    }
}

/// Output line for `--lookup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LookupReport {
    pub(crate) id: FeatureId,
    pub(crate) feature: Option<Feature>,
}

/// Builds the transport shared by every configured source.
pub(crate) trait TransportBuilder {
    fn build(&self, config: &QueryConfig) -> Result<Arc<dyn Transport>, CliError>;
}

pub(crate) struct HttpTransportBuilder;

impl TransportBuilder for HttpTransportBuilder {
    fn build(&self, config: &QueryConfig) -> Result<Arc<dyn Transport>, CliError> {
        let transport = HttpTransport::with_config(config.http.clone())?;
        Ok(Arc::new(transport))
    }
}

pub(crate) fn run_query(args: QueryArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_query_with(args, &HttpTransportBuilder, &mut stdout)
}

pub(crate) fn run_query_with(
    args: QueryArgs,
    builder: &dyn TransportBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = resolve_query_config(args)?;
    let definitions = load_sources(&config.sources)?;
    let transport = builder.build(&config)?;
    let sources = build_sources(&definitions, &transport).map_err(|source| {
        CliError::InvalidSources {
            path: config.sources.clone(),
            source,
        }
    })?;
    info!(
        "querying {} box(es) against {} source(s)",
        config.extents.len(),
        sources.len()
    );

    let index = AddressIndex::builder()
        .config(config.cache.clone())
        .sources(sources)
        .build();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    for extent in &config.extents {
        let result = runtime.block_on(index.extent(*extent));
        let culled = index.view_moved(extent.center()).unwrap_or_default();
        write_line(writer, &ExtentReport::new(*extent, result, culled))?;
    }
    if let Some(id) = config.lookup {
        let feature = index.lookup(&id);
        write_line(writer, &LookupReport { id, feature })?;
    }
    Ok(())
}

fn resolve_query_config(args: QueryArgs) -> Result<QueryConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Loads and parses the sources file.
pub(crate) fn load_sources(path: &Utf8Path) -> Result<Vec<SourceDefinition>, CliError> {
    let document = std::fs::read_to_string(path).map_err(|source| CliError::ReadSources {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sources(&document).map_err(|source| CliError::InvalidSources {
        path: path.to_path_buf(),
        source,
    })
}

fn write_line<T: Serialize>(writer: &mut dyn Write, report: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string(report).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
