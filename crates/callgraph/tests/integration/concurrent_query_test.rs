//! Integration test for parallel readers over one loaded store.

use callgraph::{CallAttributes, CallGraphPayload, CallGraphStore, Function, Loader};
use std::thread;

const WIDTH: usize = 50;
const LAYERS: usize = 6;

// Layered graph: every function in layer k calls two functions in layer k+1,
// and the last layer calls back into the first.
fn layered() -> CallGraphStore {
    let id = |layer: usize, i: usize| format!("L{layer}_{i}");
    let mut payload = CallGraphPayload::new().with_function(Function::new("root", "root"));
    for layer in 0..LAYERS {
        for i in 0..WIDTH {
            payload = payload.with_function(Function::new(id(layer, i), format!("fn_{layer}_{i}")));
        }
    }
    for i in 0..WIDTH {
        payload = payload.with_call("root", id(0, i), CallAttributes::direct());
    }
    for layer in 0..LAYERS - 1 {
        for i in 0..WIDTH {
            payload = payload
                .with_call(id(layer, i), id(layer + 1, i), CallAttributes::direct())
                .with_call(id(layer, i), id(layer + 1, (i + 1) % WIDTH), CallAttributes::direct());
        }
    }
    for i in 0..WIDTH {
        payload = payload.with_call(id(LAYERS - 1, i), id(0, i), CallAttributes::direct());
    }

    let mut store = CallGraphStore::in_memory().unwrap();
    Loader::default().load(&mut store, &payload).unwrap();
    store
}

#[test]
fn test_parallel_queries_agree() {
    let store = layered();
    let expected_summary = store.query().depth_summary("root").unwrap();
    let expected_nodes = store.query().call_tree("root", Some(3)).unwrap().nodes.len();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = &store;
                let expected_summary = &expected_summary;
                scope.spawn(move || {
                    let query = store.query();
                    for _ in 0..20 {
                        assert_eq!(query.depth_summary("root").unwrap(), *expected_summary);
                        let tree = query.call_tree("root", Some(3)).unwrap();
                        assert_eq!(tree.nodes.len(), expected_nodes);
                        assert!(tree.truncated);
                        let name = format!("fn_{}_", worker % LAYERS);
                        assert_eq!(query.search(&name).len(), WIDTH);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });

    assert_eq!(expected_summary.values().sum::<usize>(), 1 + WIDTH * LAYERS);
    assert_eq!(expected_nodes, 1 + WIDTH * 3);
}
