//! Behavioural tests for line feeds queried through the address index.

use std::cell::RefCell;
use std::sync::Arc;

use geo::{Coord, Rect};
use quickhn_core::{AddressIndex, ExtentResult};
use quickhn_data::test_support::StubTransport;
use quickhn_data::{Transport, build_sources, parse_sources};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use tokio::runtime::Runtime;

#[fixture]
fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime builds")
}

#[fixture]
fn transport() -> Arc<StubTransport> {
    Arc::new(StubTransport::new())
}

#[fixture]
fn outcome() -> RefCell<Option<ExtentResult>> {
    RefCell::new(None)
}

#[given("a line feed declaring its streets after the numbers")]
fn given_streets_last(#[from(transport)] transport: &Arc<StubTransport>) {
    transport.push_body("4.3502,50.8402,1,g1\n4.3503,50.8403,3,g1\n4.3504,50.8404,2,b7\ng1,Grote Markt\nb7,Boterstraat\n");
}

#[given("a line feed with a number on an undeclared street")]
fn given_undeclared(#[from(transport)] transport: &Arc<StubTransport>) {
    transport.push_body("g1,Grote Markt\n4.3502,50.8402,1,g1\n4.3504,50.8404,9,zz\n");
}

#[when("the index queries a cell served by the feed")]
fn when_query(
    #[from(runtime)] runtime: &Runtime,
    #[from(transport)] transport: &Arc<StubTransport>,
    #[from(outcome)] outcome: &RefCell<Option<ExtentResult>>,
) {
    let document = json!({
        "sources": [{
            "kind": "lines",
            "name": "quick-hn",
            "coverage": { "bbox": [4.24, 50.76, 4.49, 50.92] },
            "url_template": "https://hn.example/?left={left}&top={top}&right={right}&bottom={bottom}",
            "padding_deg": 0.002
        }]
    })
    .to_string();
    let definitions = parse_sources(&document).expect("valid document");
    let shared: Arc<dyn Transport> = transport.clone();
    let sources = build_sources(&definitions, &shared).expect("valid definitions");
    let index = AddressIndex::builder().sources(sources).build();
    let extent = Rect::new(Coord { x: 4.3501, y: 50.8401 }, Coord { x: 4.3509, y: 50.8409 });

    *outcome.borrow_mut() = Some(runtime.block_on(index.extent(extent)));
}

#[then("every house number carries its street name")]
fn then_streets_resolved(#[from(outcome)] outcome: &RefCell<Option<ExtentResult>>) {
    let borrowed = outcome.borrow();
    let result = borrowed.as_ref().expect("query ran");
    let mut addresses: Vec<_> = result
        .features
        .iter()
        .map(|f| format!("{} {}", f.street, f.number))
        .collect();
    addresses.sort();
    assert_eq!(addresses, vec!["Boterstraat 2", "Grote Markt 1", "Grote Markt 3"]);
}

#[then("only numbers on declared streets are returned")]
fn then_undeclared_dropped(#[from(outcome)] outcome: &RefCell<Option<ExtentResult>>) {
    let borrowed = outcome.borrow();
    let result = borrowed.as_ref().expect("query ran");
    assert_eq!(result.features.len(), 1);
    assert!(result.features.iter().all(|f| f.street == "Grote Markt"));
}

#[scenario(path = "tests/features/line_feed.feature", index = 0)]
fn streets_resolved_after_body(
    runtime: Runtime,
    transport: Arc<StubTransport>,
    outcome: RefCell<Option<ExtentResult>>,
) {
    let _ = (runtime, transport, outcome);
}

#[scenario(path = "tests/features/line_feed.feature", index = 1)]
fn undeclared_streets_dropped(
    runtime: Runtime,
    transport: Arc<StubTransport>,
    outcome: RefCell<Option<ExtentResult>>,
) {
    let _ = (runtime, transport, outcome);
}
