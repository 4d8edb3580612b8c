//! Integration test for export -> load -> export round trips.

use callgraph::export::{export_json, tree_to_payload};
use callgraph::{
    CallAttributes, CallGraphPayload, CallGraphStore, CallRecord, Function, Loader,
    ResolutionMethod, Visibility,
};
use tempfile::TempDir;

// main fans out to three helpers; parse recurses, two paths reach emit
fn payload() -> CallGraphPayload {
    CallGraphPayload::new()
        .with_function(
            Function::new("c:main", "main")
                .at("main.c", 10)
                .with_params(["int", "char**"])
                .with_language("c"),
        )
        .with_function(Function::new("c:parse", "parse").at("parse.c", 3).with_language("c"))
        .with_function(
            Function::new("c:check", "check")
                .with_visibility(Visibility::Static)
                .with_language("c"),
        )
        .with_function(Function::new("c:emit", "emit").with_language("c"))
        .with_function(Function::new("c:unused", "unused").with_language("c"))
        .with_call(
            "c:main",
            "c:parse",
            CallAttributes::direct().at("main.c", 12).with_callsite("cs-1"),
        )
        .with_call(
            "c:main",
            "c:check",
            CallAttributes::direct().at("main.c", 13).with_callsite("cs-2"),
        )
        .with_call(
            "c:main",
            "c:emit",
            CallAttributes::indirect(true)
                .resolved(ResolutionMethod::Dynamic)
                .with_callsite("cs-3"),
        )
        .with_call("c:parse", "c:parse", CallAttributes::direct().at("parse.c", 8))
        .with_call("c:parse", "c:emit", CallAttributes::direct().at("parse.c", 9))
        .with_call("c:check", "c:emit", CallAttributes::direct())
}

fn loaded(payload: &CallGraphPayload) -> CallGraphStore {
    let mut store = CallGraphStore::in_memory().unwrap();
    Loader::default().load(&mut store, payload).unwrap();
    store
}

fn sorted_ids(payload: &CallGraphPayload) -> Vec<String> {
    let mut ids: Vec<String> = payload.functions.iter().map(|f| f.id.to_string()).collect();
    ids.sort();
    ids
}

#[test]
fn test_export_load_export_is_stable() {
    let original = loaded(&payload());

    for depth in [Some(0), Some(1), Some(2), None] {
        let first = original.query().export_subgraph("c:main", depth).unwrap();
        let reloaded = loaded(&first);
        let second = reloaded.query().export_subgraph("c:main", depth).unwrap();

        assert_eq!(sorted_ids(&first), sorted_ids(&second), "depth {depth:?}");
        assert_eq!(first.calls, second.calls, "depth {depth:?}");
    }
}

#[test]
fn test_export_keeps_full_records() {
    let store = loaded(&payload());
    let exported = store.query().export_subgraph("c:main", Some(1)).unwrap();

    assert!(!sorted_ids(&exported).contains(&"c:unused".to_string()));
    let main = exported.functions.iter().find(|f| f.id.as_str() == "c:main").unwrap();
    assert_eq!(main.params, vec!["int", "char**"]);
    assert_eq!(main.line, Some(10));

    let indirect: Vec<&CallRecord> = exported
        .calls
        .iter()
        .filter(|c| c.attributes.indirect)
        .collect();
    assert_eq!(indirect.len(), 1);
    assert_eq!(indirect[0].attributes.resolution_method, ResolutionMethod::Dynamic);
}

#[test]
fn test_json_file_round_trip() {
    let store = loaded(&payload());
    let tree = store.query().call_tree("c:parse", None).unwrap();

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("parse.json");
    std::fs::write(&path, export_json(&tree).unwrap()).unwrap();

    let parsed = CallGraphPayload::from_file(&path).unwrap();
    assert_eq!(parsed, tree_to_payload(&tree));

    let reloaded = loaded(&parsed);
    assert_eq!(reloaded.function_count(), 2);
    // Self-loop survives the trip
    assert_eq!(reloaded.query().callees("c:parse").unwrap().len(), 2);
}

#[test]
fn test_dot_export_from_query_engine() {
    let store = loaded(&payload());
    let dot = store
        .query()
        .export_subgraph_dot("c:main", Some(1), &Default::default())
        .unwrap();

    assert!(dot.contains("\"c:main\" -> \"c:emit\" [style=dashed, label=\"fnptr\"];"));
    assert!(!dot.contains("\"c:parse\" -> \"c:parse\""));
}
