// SPDX-License-Identifier: MIT OR Apache-2.0
//! Build-order sorts over the node graph.
//!
//! Two deliberately asymmetric variants: [`topological_sort_by_down`]
//! expands downstream from source nodes and reverses its post-order,
//! [`topological_sort_by_up`] expands upstream from terminal nodes and
//! returns its post-order as-is. Both tolerate cycles by silently
//! truncating re-visited branches; [`crate::graph::Graph::topological_order`]
//! is the strict alternative.

use indexmap::{IndexMap, IndexSet};

use crate::edge::EdgeKind;
use crate::graph::Graph;
use crate::node::{NodeId, GROUP_MARKER_PROPERTY};
use crate::socket::Socket;

/// Distinct downstream neighbors of a node, in socket/connection order.
/// Data and affects edges both count. Neighbors carrying the group marker
/// property are eagerly flagged for recook.
pub fn output_nodes(graph: &mut Graph, node_id: NodeId) -> Vec<NodeId> {
    let mut found = IndexSet::new();
    if let Some(node) = graph.node(node_id) {
        for socket in &node.outputs {
            for edge_id in &socket.edges {
                if let Some(edge) = graph.edge(*edge_id) {
                    found.insert(edge.to.node);
                }
            }
        }
    }
    for edge in graph.edges() {
        if edge.kind == EdgeKind::Affects && edge.from.node == node_id {
            found.insert(edge.to.node);
        }
    }

    let found: Vec<NodeId> = found.into_iter().collect();
    for neighbor in &found {
        let is_group = graph
            .node(*neighbor)
            .is_some_and(|n| n.has_property(GROUP_MARKER_PROPERTY));
        if is_group {
            if let Some(node) = graph.node_mut(*neighbor) {
                node.need_cook = true;
            }
        }
    }
    found
}

/// Distinct upstream neighbors of a node, in socket/connection order.
/// Data and affects edges both count.
pub fn input_nodes(graph: &Graph, node_id: NodeId) -> Vec<NodeId> {
    let mut found = IndexSet::new();
    if let Some(node) = graph.node(node_id) {
        for socket in &node.inputs {
            for edge_id in &socket.edges {
                if let Some(edge) = graph.edge(*edge_id) {
                    found.insert(edge.from.node);
                }
            }
        }
    }
    for edge in graph.edges() {
        if edge.kind == EdgeKind::Affects && edge.to.node == node_id {
            found.insert(edge.from.node);
        }
    }
    found.into_iter().collect()
}

/// Whether any edge (data or affects) feeds into the node
pub fn has_input_connection(graph: &Graph, node_id: NodeId) -> bool {
    graph
        .node(node_id)
        .is_some_and(|n| n.inputs.iter().any(Socket::is_connected))
        || graph
            .edges()
            .any(|e| e.kind == EdgeKind::Affects && e.to.node == node_id)
}

/// Whether any edge (data or affects) leaves the node
pub fn has_output_connection(graph: &Graph, node_id: NodeId) -> bool {
    graph
        .node(node_id)
        .is_some_and(|n| n.outputs.iter().any(Socket::is_connected))
        || graph
            .edges()
            .any(|e| e.kind == EdgeKind::Affects && e.from.node == node_id)
}

fn strip_backdrops(graph: &Graph, nodes: &[NodeId]) -> Vec<NodeId> {
    nodes
        .iter()
        .copied()
        .filter(|id| graph.node(*id).is_some_and(|n| !n.is_backdrop()))
        .collect()
}

/// Breadth-first expansion into an adjacency map; every discovered node
/// gets an entry, terminals map to an empty list
fn expand<F>(start_nodes: &[NodeId], mut neighbors: F) -> IndexMap<NodeId, Vec<NodeId>>
where
    F: FnMut(NodeId) -> Vec<NodeId>,
{
    let mut adjacency: IndexMap<NodeId, Vec<NodeId>> = IndexMap::new();
    for &start in start_nodes {
        if adjacency.contains_key(&start) {
            continue;
        }
        let mut frontier = neighbors(start);
        adjacency.insert(start, frontier.clone());
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node_id in frontier {
                if !adjacency.contains_key(&node_id) {
                    let found = neighbors(node_id);
                    adjacency.insert(node_id, found.clone());
                    next.extend(found);
                }
            }
            frontier = next;
        }
    }
    adjacency
}

/// Depth-first post-order over the adjacency map. A node already visited
/// is skipped without diagnostics, which silently truncates cycles.
fn sort_nodes(
    adjacency: &IndexMap<NodeId, Vec<NodeId>>,
    start_nodes: &[NodeId],
    reverse: bool,
) -> Vec<NodeId> {
    if adjacency.is_empty() {
        return Vec::new();
    }
    let mut visited: IndexSet<NodeId> = IndexSet::new();
    let mut sorted = Vec::new();

    for &start in start_nodes {
        if !visited.insert(start) {
            continue;
        }
        // explicit frames of (node, next child index)
        let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
        while let Some(frame) = stack.last_mut() {
            let node_id = frame.0;
            let children = adjacency
                .get(&node_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if frame.1 < children.len() {
                let child = children[frame.1];
                frame.1 += 1;
                if visited.insert(child) {
                    stack.push((child, 0));
                }
            } else {
                sorted.push(node_id);
                stack.pop();
            }
        }
    }

    if reverse {
        sorted.reverse();
    }
    sorted
}

/// Downstream build order: expand from source nodes toward consumers,
/// depth-first post-order, reversed so producers come before consumers.
///
/// Backdrops are stripped from both input lists. With no explicit start
/// nodes, the starts are derived as the nodes of `all_nodes` without
/// incoming edges. When no start node has an outgoing edge the starts are
/// returned as-is.
pub fn topological_sort_by_down(
    graph: &mut Graph,
    start_nodes: &[NodeId],
    all_nodes: &[NodeId],
) -> Vec<NodeId> {
    if start_nodes.is_empty() && all_nodes.is_empty() {
        return Vec::new();
    }
    let mut start_nodes = strip_backdrops(graph, start_nodes);
    let all_nodes = strip_backdrops(graph, all_nodes);
    if start_nodes.is_empty() {
        start_nodes = all_nodes
            .iter()
            .copied()
            .filter(|id| !has_input_connection(graph, *id))
            .collect();
    }
    if start_nodes.is_empty() {
        return Vec::new();
    }
    if !start_nodes
        .iter()
        .any(|id| has_output_connection(graph, *id))
    {
        return start_nodes;
    }

    let adjacency = expand(&start_nodes, |id| output_nodes(graph, id));
    sort_nodes(&adjacency, &start_nodes, true)
}

/// Upstream build order: expand from terminal nodes toward producers,
/// depth-first post-order kept as-is, so producers still come first.
///
/// Backdrops are stripped from both input lists. With no explicit seed
/// nodes, the seeds are derived as the nodes of `all_nodes` without
/// outgoing edges. When no seed has an incoming edge the seeds are
/// returned as-is.
pub fn topological_sort_by_up(
    graph: &Graph,
    seed_nodes: &[NodeId],
    all_nodes: &[NodeId],
) -> Vec<NodeId> {
    if seed_nodes.is_empty() && all_nodes.is_empty() {
        return Vec::new();
    }
    let mut seed_nodes = strip_backdrops(graph, seed_nodes);
    let all_nodes = strip_backdrops(graph, all_nodes);
    if seed_nodes.is_empty() {
        seed_nodes = all_nodes
            .iter()
            .copied()
            .filter(|id| !has_output_connection(graph, *id))
            .collect();
    }
    if seed_nodes.is_empty() {
        return Vec::new();
    }
    if !seed_nodes.iter().any(|id| has_input_connection(graph, *id)) {
        return seed_nodes;
    }

    let adjacency = expand(&seed_nodes, |id| input_nodes(graph, id));
    sort_nodes(&adjacency, &seed_nodes, false)
}
