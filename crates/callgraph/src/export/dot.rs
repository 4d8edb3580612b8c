//! DOT format export for Graphviz visualization.
//!
//! Renders a call tree with the root highlighted and indirect calls dashed.

use crate::graph::{CallEdge, CallTree, Function};
use std::collections::HashSet;
use std::fmt::Write;

/// Options for styling DOT export
#[derive(Debug, Clone)]
pub struct DotOptions {
    /// Graphviz layout engine hint: dot, twopi, neato, circo
    pub layout: String,
    /// Graph layout direction: LR, TB, RL, BT
    pub rankdir: String,
    /// Fill color for ordinary functions
    pub node_color: String,
    /// Fill color for the traversal root
    pub root_color: String,
    /// Color for call edges
    pub edge_color: String,
    /// Append `file:line` to node labels
    pub show_location: bool,
    /// Draw parallel call sites between the same pair as one edge
    pub merge_parallel_edges: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        DotOptions {
            layout: "dot".to_string(),
            rankdir: "LR".to_string(),
            node_color: "#eff6ff".to_string(),
            root_color: "#fde68a".to_string(),
            edge_color: "#94a3b8".to_string(),
            show_location: false,
            merge_parallel_edges: true,
        }
    }
}

/// Export a call tree to Graphviz DOT format
pub fn export_dot(tree: &CallTree<'_>) -> String {
    export_dot_styled(tree, &DotOptions::default())
}

/// Export a call tree to Graphviz DOT format with custom styling
pub fn export_dot_styled(tree: &CallTree<'_>, options: &DotOptions) -> String {
    let mut output = String::new();
    let root = tree.root();

    // Writing to a String cannot fail
    let _ = writeln!(output, "digraph call_tree {{");
    let _ = writeln!(output, "    layout={};", options.layout);
    let _ = writeln!(output, "    rankdir={};", options.rankdir);
    let _ = writeln!(output, "    node [shape=rect, style=\"filled,rounded\"];");
    let _ = writeln!(output, "    edge [color=\"{}\"];", options.edge_color);
    output.push('\n');

    for node in &tree.nodes {
        let function = node.function;
        let color = if function.id == root.id {
            &options.root_color
        } else {
            &options.node_color
        };
        let _ = writeln!(
            output,
            "    \"{}\" [label=\"{}\", fillcolor=\"{}\"];",
            escape_dot_label(function.id.as_str()),
            node_label(function, options.show_location),
            color
        );
    }

    output.push('\n');

    let mut drawn = HashSet::new();
    for edge in &tree.edges {
        if options.merge_parallel_edges && !drawn.insert((&edge.caller, &edge.callee)) {
            continue;
        }
        let _ = writeln!(
            output,
            "    \"{}\" -> \"{}\"{};",
            escape_dot_label(edge.caller.as_str()),
            escape_dot_label(edge.callee.as_str()),
            edge_style(edge)
        );
    }

    output.push_str("}\n");
    output
}

fn node_label(function: &Function, show_location: bool) -> String {
    let mut label = escape_dot_label(&function.name);
    if show_location && !function.file.is_empty() {
        label.push_str("\\n");
        label.push_str(&escape_dot_label(&function.file));
        if let Some(line) = function.line {
            label.push_str(&format!(":{line}"));
        }
    }
    label
}

fn edge_style(edge: &CallEdge) -> &'static str {
    let attributes = &edge.attributes;
    match (attributes.indirect, attributes.via_function_pointer) {
        (true, true) => " [style=dashed, label=\"fnptr\"]",
        (true, false) => " [style=dashed]",
        _ => "",
    }
}

/// Escape special characters for DOT labels
fn escape_dot_label(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
