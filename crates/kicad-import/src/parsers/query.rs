//! Read-only lookups over parsed node sequences.
//!
//! Token and value searches only look at the given siblings. Path searches
//! descend one level per `/`-separated segment and follow every matching
//! branch, so `a/b` over `(a (b 1) (b 2))` yields both `b` forms.

use super::sexpr::Node;

/// Nodes whose token equals `token`.
pub fn find_nodes_by_token<'a>(nodes: &'a [Node], token: &str) -> Vec<&'a Node> {
    nodes.iter().filter(|n| n.token() == token).collect()
}

/// Nodes whose values contain `value`.
pub fn find_nodes_by_value<'a>(nodes: &'a [Node], value: &str) -> Vec<&'a Node> {
    nodes.iter().filter(|n| n.has_value(value)).collect()
}

/// Nodes matching both `token` and `value`.
pub fn find_nodes_by_token_and_value<'a>(
    nodes: &'a [Node],
    token: &str,
    value: &str,
) -> Vec<&'a Node> {
    nodes
        .iter()
        .filter(|n| n.token() == token && n.has_value(value))
        .collect()
}

/// All nodes reached by following `path` down from `nodes`, depth-first in
/// document order.
pub fn find_nodes_by_path<'a>(nodes: &'a [Node], path: &str) -> Vec<&'a Node> {
    let mut results = Vec::new();
    collect_path(nodes, &split_path(path), None, &mut results);
    results
}

/// Like [`find_nodes_by_path`], keeping only final nodes that contain `value`.
pub fn find_nodes_by_path_and_value<'a>(
    nodes: &'a [Node],
    path: &str,
    value: &str,
) -> Vec<&'a Node> {
    let mut results = Vec::new();
    collect_path(nodes, &split_path(path), Some(value), &mut results);
    results
}

/// Values of the first node at `path`, or an empty slice.
pub fn get_values_by_path<'a>(nodes: &'a [Node], path: &str) -> &'a [String] {
    find_nodes_by_path(nodes, path)
        .into_iter()
        .next()
        .map(Node::values)
        .unwrap_or(&[])
}

/// First value of the first node at `path`, or an empty string.
pub fn get_value_by_path<'a>(nodes: &'a [Node], path: &str) -> &'a str {
    get_values_by_path(nodes, path)
        .first()
        .map(String::as_str)
        .unwrap_or("")
}

fn split_path(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').collect();
    while segments.last() == Some(&"") {
        segments.pop();
    }
    segments
}

fn collect_path<'a>(
    nodes: &'a [Node],
    path: &[&str],
    value: Option<&str>,
    results: &mut Vec<&'a Node>,
) {
    let Some((segment, rest)) = path.split_first() else {
        return;
    };
    for node in nodes.iter().filter(|n| n.token() == *segment) {
        if rest.is_empty() {
            if value.map_or(true, |v| node.has_value(v)) {
                results.push(node);
            }
        } else {
            collect_path(node.children(), rest, value, results);
        }
    }
}
