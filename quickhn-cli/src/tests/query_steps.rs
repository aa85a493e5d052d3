//! Behaviour-driven step definitions driving the query CLI scenarios.

use super::helpers::{
    GRAND_PLACE_BBOX, StubTransportBuilder, brussels_sources, utf8_root, write_utf8,
};
use super::*;
use camino::Utf8PathBuf;
use quickhn_core::SourceError;
use quickhn_data::test_support::StubTransport;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::sync::Arc;
use tempfile::TempDir;

struct QueryWorld {
    _tmp: TempDir,
    sources_path: Utf8PathBuf,
    include_sources: RefCell<bool>,
    bbox: RefCell<String>,
    lookup: RefCell<Option<String>>,
    transport: Arc<StubTransport>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl QueryWorld {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let sources_path = utf8_root(&tmp).join("sources.json");
        Self {
            _tmp: tmp,
            sources_path,
            include_sources: RefCell::new(true),
            bbox: RefCell::new(GRAND_PLACE_BBOX.to_owned()),
            lookup: RefCell::new(None),
            transport: Arc::new(StubTransport::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn build_command_line(&self) -> Vec<String> {
        let mut argv = vec!["quickhn".to_owned(), "query".to_owned()];
        if *self.include_sources.borrow() {
            argv.extend([
                format!("--{ARG_SOURCES}"),
                self.sources_path.as_str().to_owned(),
            ]);
        }
        argv.extend([format!("--{ARG_BBOX}"), self.bbox.borrow().clone()]);
        if let Some(id) = self.lookup.borrow().as_ref() {
            argv.extend([format!("--{ARG_LOOKUP}"), id.clone()]);
        }
        argv
    }

    fn output_lines(&self) -> Vec<String> {
        let stdout = String::from_utf8(self.stdout.borrow().clone()).expect("stdout utf-8");
        stdout.lines().map(str::to_owned).collect()
    }

    fn extent_reports(&self) -> Vec<ExtentReport> {
        self.output_lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    fn error_kind(&self) -> String {
        let borrowed = self.result.borrow();
        let error = borrowed
            .as_ref()
            .expect("result recorded")
            .as_ref()
            .expect_err("expected error");
        format!("{error:?}")
    }
}

#[fixture]
fn world() -> QueryWorld {
    QueryWorld::new()
}

#[given("a sources file with a Brussels line feed")]
fn sources_file_exists(#[from(world)] world: &QueryWorld) {
    write_utf8(&world.sources_path, brussels_sources().as_bytes());
}

#[given("the feed serves two numbers on the Grote Markt")]
fn feed_serves_numbers(#[from(world)] world: &QueryWorld) {
    world
        .transport
        .push_body("g1,Grote Markt\n4.3502,50.8402,1,g1\n4.3503,50.8403,3,g1\n");
}

#[given("the feed is unreachable")]
fn feed_is_unreachable(#[from(world)] world: &QueryWorld) {
    world.transport.push_error(SourceError::Network {
        url: "https://hn.example/".into(),
        message: "connection refused".into(),
    });
}

#[given("I look up the first number")]
fn look_up_first_number(#[from(world)] world: &QueryWorld) {
    world.lookup.replace(Some("quick-hn:g1:1".to_owned()));
}

#[given("the sources option is omitted")]
fn omit_sources(#[from(world)] world: &QueryWorld) {
    world.include_sources.replace(false);
}

#[given("the bounding box is malformed")]
fn malformed_bbox(#[from(world)] world: &QueryWorld) {
    world.bbox.replace("4.35,50.84,west".to_owned());
}

#[when("I run the query command")]
fn run_query_command(#[from(world)] world: &QueryWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Query(args) => {
            let builder = StubTransportBuilder {
                transport: world.transport.clone(),
            };
            let mut buffer = world.stdout.borrow_mut();
            run_query_with(args, &builder, &mut *buffer)
        }
    });
    world.result.replace(Some(outcome));
}

#[then("the command prints one box with two features")]
fn prints_two_features(#[from(world)] world: &QueryWorld) {
    let reports = world.extent_reports();
    assert_eq!(reports.len(), 1);
    let report = reports.first().expect("one report");
    assert_eq!(report.features.len(), 2);
    assert!(!report.ceiling_exceeded);
    assert_eq!(report.cells_visited, 1);
}

#[then("the command prints one empty box")]
fn prints_empty_box(#[from(world)] world: &QueryWorld) {
    let borrowed = world.result.borrow();
    borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect("a failing feed is not a command failure");
    let reports = world.extent_reports();
    assert_eq!(reports.len(), 1);
    assert!(reports.iter().all(|report| report.features.is_empty()));
}

#[then("the lookup finds the Grote Markt")]
fn lookup_finds_feature(#[from(world)] world: &QueryWorld) {
    let lines = world.output_lines();
    let last = lines.last().expect("lookup line");
    let report: LookupReport = serde_json::from_str(last).expect("lookup report");
    let feature = report.feature.expect("feature still cached");
    assert_eq!(feature.street, "Grote Markt");
    assert_eq!(feature.number, "1");
}

#[then("the command fails because sources is missing")]
fn fails_missing_sources(#[from(world)] world: &QueryWorld) {
    let kind = world.error_kind();
    assert!(kind.starts_with("MissingArgument"), "unexpected {kind}");
    assert!(kind.contains(ARG_SOURCES));
}

#[then("the command fails because the bbox is invalid")]
fn fails_invalid_bbox(#[from(world)] world: &QueryWorld) {
    let kind = world.error_kind();
    assert!(kind.starts_with("InvalidBbox"), "unexpected {kind}");
}

#[scenario(path = "tests/features/query_command.feature", index = 0)]
fn query_prints_features(world: QueryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/query_command.feature", index = 1)]
fn query_requires_sources(world: QueryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/query_command.feature", index = 2)]
fn query_rejects_malformed_bbox(world: QueryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/query_command.feature", index = 3)]
fn query_survives_failing_feed(world: QueryWorld) {
    let _ = world;
}
