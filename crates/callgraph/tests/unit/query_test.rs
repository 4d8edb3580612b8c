//! Unit tests for the query engine
//!
//! Tests cover:
//! - search by name substring (case-insensitive)
//! - callees / callers with edge attributes
//! - depth-bounded call tree, truncation, cycles, self-loops
//! - depth summary consistency with the unbounded call tree
//! - fan statistics
//! - not-found handling

use callgraph::{CallAttributes, CallGraphPayload, CallGraphStore, Function, GraphError, Loader};
use std::collections::BTreeMap;

// F1:main -> F2:init -> F3:load_config, F1 -> F4:run through a function pointer
fn scenario() -> CallGraphStore {
    let payload = CallGraphPayload::new()
        .with_function(Function::new("F1", "main").at("main.c", 10))
        .with_function(Function::new("F2", "init").at("init.c", 4))
        .with_function(Function::new("F3", "load_config").at("config.c", 22))
        .with_function(Function::new("F4", "run").at("run.c", 7))
        .with_call("F1", "F2", CallAttributes::direct().at("main.c", 12))
        .with_call("F2", "F3", CallAttributes::direct().at("init.c", 9))
        .with_call("F1", "F4", CallAttributes::indirect(true).at("main.c", 14));

    let mut store = CallGraphStore::in_memory().unwrap();
    Loader::default().load(&mut store, &payload).unwrap();
    store
}

// A -> B -> A
fn two_cycle() -> CallGraphStore {
    let payload = CallGraphPayload::new()
        .with_function(Function::new("A", "ping"))
        .with_function(Function::new("B", "pong"))
        .with_call("A", "B", CallAttributes::direct())
        .with_call("B", "A", CallAttributes::direct());

    let mut store = CallGraphStore::in_memory().unwrap();
    Loader::default().load(&mut store, &payload).unwrap();
    store
}

fn ids(functions: &[&Function]) -> Vec<String> {
    functions.iter().map(|f| f.id.to_string()).collect()
}

#[test]
fn test_search_is_case_insensitive() {
    let store = scenario();
    let query = store.query();

    assert_eq!(ids(&query.search("main")), vec!["F1"]);
    assert_eq!(ids(&query.search("MAIN")), vec!["F1"]);
    assert!(query.search("zzz").is_empty());
}

#[test]
fn test_search_empty_query_returns_every_function() {
    let store = scenario();
    let mut found = ids(&store.query().search(""));
    found.sort();
    assert_eq!(found, vec!["F1", "F2", "F3", "F4"]);
}

#[test]
fn test_callees_in_insertion_order() {
    let store = scenario();
    let callees = store.query().callees("F1").unwrap();

    let names: Vec<&str> = callees.iter().map(|(f, _)| f.name.as_str()).collect();
    assert_eq!(names, vec!["init", "run"]);

    let (_, indirect_edge) = callees[1];
    assert!(indirect_edge.attributes.indirect);
    assert!(indirect_edge.attributes.via_function_pointer);
    assert_eq!(indirect_edge.attributes.line, Some(14));
}

#[test]
fn test_callers() {
    let store = scenario();
    let callers = store.query().callers("F3").unwrap();
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].0.name, "init");
    assert!(store.query().callers("F1").unwrap().is_empty());
}

#[test]
fn test_unknown_function_is_not_found() {
    let store = scenario();
    let query = store.query();

    let err = query.callees("nonexistent").unwrap_err();
    assert!(matches!(
        err,
        GraphError::FunctionNotFound { ref function_id } if function_id == "nonexistent"
    ));
    assert!(query.callers("nonexistent").unwrap_err().is_not_found());
    assert!(query.call_tree("nonexistent", Some(3)).unwrap_err().is_not_found());
    assert!(query.fan_stats("nonexistent").unwrap_err().is_not_found());
}

#[test]
fn test_call_tree_depth_one_is_truncated() {
    let store = scenario();
    let tree = store.query().call_tree("F1", Some(1)).unwrap();

    let mut nodes: Vec<&str> = tree.nodes.iter().map(|n| n.function.id.as_str()).collect();
    nodes.sort();
    assert_eq!(nodes, vec!["F1", "F2", "F4"]);

    let edges: Vec<(&str, &str)> = tree
        .edges
        .iter()
        .map(|e| (e.caller.as_str(), e.callee.as_str()))
        .collect();
    assert_eq!(edges, vec![("F1", "F2"), ("F1", "F4")]);
    assert!(tree.truncated);
}

#[test]
fn test_call_tree_unbounded_reaches_everything() {
    let store = scenario();
    let tree = store.query().call_tree("F1", None).unwrap();
    assert_eq!(tree.nodes.len(), 4);
    assert_eq!(tree.depth_of("F3"), Some(2));
    assert_eq!(tree.max_depth(), 2);
    assert!(!tree.truncated);
}

#[test]
fn test_call_tree_depth_zero() {
    let store = scenario();

    let tree = store.query().call_tree("F1", Some(0)).unwrap();
    assert_eq!(tree.nodes.len(), 1);
    assert!(tree.edges.is_empty());
    assert!(tree.truncated);

    // Leaf: nothing was cut off
    let tree = store.query().call_tree("F3", Some(0)).unwrap();
    assert_eq!(tree.nodes.len(), 1);
    assert!(!tree.truncated);
}

#[test]
fn test_cycle_terminates_and_keeps_back_edge() {
    let store = two_cycle();
    let tree = store.query().call_tree("A", Some(10)).unwrap();

    assert_eq!(tree.nodes.len(), 2);
    assert!(tree.contains("A"));
    assert!(tree.contains("B"));

    let edges: Vec<(&str, &str)> = tree
        .edges
        .iter()
        .map(|e| (e.caller.as_str(), e.callee.as_str()))
        .collect();
    assert_eq!(edges, vec![("A", "B"), ("B", "A")]);
    assert!(!tree.truncated);
}

#[test]
fn test_self_recursive_function() {
    let payload = CallGraphPayload::new()
        .with_function(Function::new("R", "walk"))
        .with_call("R", "R", CallAttributes::direct());
    let mut store = CallGraphStore::in_memory().unwrap();
    Loader::default().load(&mut store, &payload).unwrap();

    let query = store.query();
    let tree = query.call_tree("R", None).unwrap();
    assert_eq!(tree.nodes.len(), 1);
    assert_eq!(tree.edges.len(), 1);

    let fan = query.fan_stats("R").unwrap();
    assert_eq!((fan.fan_in, fan.fan_out), (1, 1));
}

#[test]
fn test_depth_summary() {
    let store = scenario();
    let summary = store.query().depth_summary("F1").unwrap();
    assert_eq!(summary, BTreeMap::from([(0, 1), (1, 2), (2, 1)]));
}

#[test]
fn test_depth_summary_matches_unbounded_tree() {
    for (store, root) in [(scenario(), "F1"), (scenario(), "F2"), (two_cycle(), "B")] {
        let query = store.query();
        let summary = query.depth_summary(root).unwrap();
        let tree = query.call_tree(root, None).unwrap();
        assert_eq!(summary.values().sum::<usize>(), tree.nodes.len());
    }
}

#[test]
fn test_payload_depth_hint_is_ignored() {
    let payload = CallGraphPayload::new()
        .with_function(Function::new("A", "a"))
        .with_function(Function::new("B", "b"))
        .with_call(
            "A",
            "B",
            CallAttributes {
                depth: Some(7),
                ..CallAttributes::direct()
            },
        );
    let mut store = CallGraphStore::in_memory().unwrap();
    Loader::default().load(&mut store, &payload).unwrap();

    let tree = store.query().call_tree("A", None).unwrap();
    assert_eq!(tree.depth_of("B"), Some(1));
    // Carried through unchanged
    assert_eq!(tree.edges[0].attributes.depth, Some(7));
}

#[test]
fn test_fan_stats() {
    let store = scenario();
    let query = store.query();

    let main = query.fan_stats("F1").unwrap();
    assert_eq!((main.fan_in, main.fan_out), (0, 2));

    let init = query.fan_stats("F2").unwrap();
    assert_eq!((init.fan_in, init.fan_out), (1, 1));

    let top: Vec<(&str, usize)> = query
        .top_fan_out(5)
        .into_iter()
        .map(|(f, n)| (f.name.as_str(), n))
        .collect();
    assert_eq!(top, vec![("main", 2), ("init", 1)]);
}
