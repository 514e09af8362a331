// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cook lifecycle and executable-chain traversal.
//!
//! Cooking a node runs its registered [`NodeBehavior`], times the run, and
//! records success or failure on the node itself. Data resolution
//! (`input_data` / `data`) walks producer chains iteratively, passing
//! through disabled nodes.

use std::time::Instant;

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeRegistry};
use crate::socket::{Socket, SocketId, SocketRef};
use crate::value::Value;

/// Error raised by a failed cook
#[derive(Debug, thiserror::Error)]
pub enum CookError {
    /// Node not found in the graph
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// No behavior registered for the node's type
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Behavior-specific failure
    #[error("{0}")]
    Custom(String),
}

/// Per-node-type computation hook. Implementations read inputs through
/// [`input_data`], write results through node properties or socket values,
/// and report failure by returning an error.
pub trait NodeBehavior {
    /// Run the node's computation. The default does nothing, for node types
    /// that are pure data carriers.
    fn execute(&self, node_id: NodeId, graph: &mut Graph) -> Result<(), CookError> {
        let _ = (node_id, graph);
        Ok(())
    }
}

/// Behavior for node types with no computation of their own
#[derive(Debug, Default)]
pub struct NoOpBehavior;

impl NodeBehavior for NoOpBehavior {}

/// Cook a single node.
///
/// A prior error state is cleared first, then the behavior runs and is
/// timed. On success the node's affected outputs are refreshed, `need_cook`
/// clears, and the wall-clock duration is recorded. On failure the node is
/// marked invalid with the failure message and the error propagates to the
/// caller; `cook_time` keeps its previous value. A behavior may also mark
/// the node invalid without failing, in which case the cook returns `Ok`
/// but leaves `need_cook` and `cook_time` untouched.
pub fn cook(
    graph: &mut Graph,
    registry: &NodeRegistry,
    node_id: NodeId,
) -> Result<(), CookError> {
    let node = graph
        .node_mut(node_id)
        .ok_or(CookError::NodeNotFound(node_id))?;
    node.close_error();
    let node_type = node.node_type.clone();
    let name = node.name.clone();
    let behavior = registry
        .behavior(&node_type)
        .ok_or(CookError::UnknownNodeType(node_type))?;

    tracing::debug!("Cooking '{}'...", name);
    let start = Instant::now();
    if let Err(err) = behavior.execute(node_id, graph) {
        if let Some(node) = graph.node_mut(node_id) {
            node.error(err.to_string());
        }
        return Err(err);
    }
    graph.update_affected_outputs(node_id);

    let Some(node) = graph.node_mut(node_id) else {
        return Ok(());
    };
    if node.is_invalid {
        return Ok(());
    }
    node.need_cook = false;
    node.cook_time = start.elapsed();
    tracing::debug!("Cooked '{}' in {:?}", name, node.cook_time);
    Ok(())
}

/// Cook nodes in the given order, stopping at the first failure
pub fn cook_queue(
    graph: &mut Graph,
    registry: &NodeRegistry,
    order: &[NodeId],
) -> Result<(), CookError> {
    for &node_id in order {
        cook(graph, registry, node_id)?;
    }
    Ok(())
}

/// Selects an input socket by ID or by positional index
#[derive(Debug, Clone, Copy)]
pub enum SocketSel {
    /// By socket ID
    Id(SocketId),
    /// By positional index among the node's inputs
    Index(usize),
}

impl From<SocketId> for SocketSel {
    fn from(id: SocketId) -> Self {
        Self::Id(id)
    }
}

impl From<usize> for SocketSel {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Resolve the value feeding an input socket.
///
/// An unconnected input falls back to the node property stored under the
/// socket's label, then to the node's default value. A connected input
/// resolves the producing socket's [`data`], following disabled
/// pass-through nodes.
pub fn input_data(graph: &Graph, node_id: NodeId, input: impl Into<SocketSel>) -> Value {
    let Some(node) = graph.node(node_id) else {
        return Value::Null;
    };
    let socket = match input.into() {
        SocketSel::Id(id) => node.inputs.iter().find(|s| s.id == id),
        SocketSel::Index(index) => node.inputs.get(index),
    };
    let Some(socket) = socket else {
        return node.default_value.clone();
    };
    match socket.edges.first().and_then(|id| graph.edge(*id)) {
        Some(edge) => producer_data(graph, edge.from),
        None => unconnected_input_data(node, socket),
    }
}

/// Resolve the value produced at an output socket.
///
/// A disabled node with inputs passes through: the output index is mapped
/// onto the inputs (clamped to the last input when the node has more
/// outputs than inputs) and that input resolves instead. Otherwise the
/// value is the node property stored under the output's label, then the
/// node's default value.
pub fn data(graph: &Graph, node_id: NodeId, output: SocketId) -> Value {
    producer_data(graph, SocketRef::new(node_id, output))
}

fn unconnected_input_data(node: &Node, socket: &Socket) -> Value {
    match node.property(&socket.label) {
        Some(value) => value.clone(),
        None => node.default_value.clone(),
    }
}

/// Iterative walk of a producer chain; disabled nodes forward the clamped
/// same-index input instead of producing
fn producer_data(graph: &Graph, start: SocketRef) -> Value {
    let mut current = start;
    loop {
        let Some(node) = graph.node(current.node) else {
            return Value::Null;
        };
        let Some(output) = node.socket(current.socket) else {
            return node.default_value.clone();
        };
        if node.disabled && !node.inputs.is_empty() {
            let index = output.index.min(node.inputs.len() - 1);
            let input = &node.inputs[index];
            match input.edges.first().and_then(|id| graph.edge(*id)) {
                Some(edge) => {
                    current = edge.from;
                    continue;
                }
                None => return unconnected_input_data(node, input),
            }
        }
        return match node.property(&output.label) {
            Some(value) => value.clone(),
            None => node.default_value.clone(),
        };
    }
}

/// Check that every required input is satisfied: connected, or resolving
/// to a truthy value. Failing input names are collected into a single
/// diagnostic stored on the node; a prior diagnostic is cleared first.
/// Verification never fails the build by itself.
pub fn verify(graph: &mut Graph, node_id: NodeId) -> bool {
    let Some(node) = graph.node(node_id) else {
        return false;
    };
    let required: Vec<(SocketId, String, bool)> = node
        .required_inputs
        .iter()
        .filter_map(|id| node.socket(*id))
        .map(|s| (s.id, s.label.clone(), s.is_connected()))
        .collect();

    let mut report = String::new();
    for (socket_id, label, connected) in required {
        if !connected && !input_data(graph, node_id, socket_id).is_truthy() {
            report.push_str(&format!("Invalid input: {label}\n"));
        }
    }

    let valid = report.is_empty();
    if let Some(node) = graph.node_mut(node_id) {
        node.error_message = if valid { None } else { Some(report) };
    }
    valid
}

/// Collect the linear executable chain starting at a node, following each
/// exec output's first connection depth-first. The walk carries no visited
/// guard; a cyclic exec wiring is the author's responsibility.
pub fn exec_queue(graph: &Graph, node_id: NodeId) -> Vec<NodeId> {
    let mut queue = Vec::new();
    let mut stack = vec![node_id];
    while let Some(current) = stack.pop() {
        let Some(node) = graph.node(current) else {
            continue;
        };
        queue.push(current);
        let children: Vec<NodeId> = node
            .exec_outputs()
            .filter_map(|s| s.edges.first())
            .filter_map(|id| graph.edge(*id))
            .map(|e| e.to.node)
            .collect();
        // reversed push so the first exec output's chain runs first
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{DataType, DataTypeRegistry};
    use crate::node::{NodeCategory, NodeKind, NodeType};
    use std::time::Duration;

    struct FailingBehavior;

    impl NodeBehavior for FailingBehavior {
        fn execute(&self, _node_id: NodeId, _graph: &mut Graph) -> Result<(), CookError> {
            Err(CookError::Custom("missing scene object".into()))
        }
    }

    struct DoubleBehavior;

    impl NodeBehavior for DoubleBehavior {
        fn execute(&self, node_id: NodeId, graph: &mut Graph) -> Result<(), CookError> {
            let value = match input_data(graph, node_id, 0) {
                Value::Float(f) => f,
                Value::Int(i) => i as f64,
                other => return Err(CookError::Custom(format!("expected number, got {other:?}"))),
            };
            if let Some(node) = graph.node_mut(node_id) {
                node.set_property("out", Value::Float(value * 2.0));
            }
            Ok(())
        }
    }

    fn float_type() -> DataType {
        DataTypeRegistry::builtin().get("float").unwrap().clone()
    }

    fn exec_type() -> DataType {
        DataTypeRegistry::builtin().get("exec").unwrap().clone()
    }

    /// Node with one float input "in" and one float output "out"
    fn chain_node(graph: &mut Graph, name: &str) -> NodeId {
        let mut node = Node::new("double", name);
        node.add_input(float_type(), "in");
        node.add_output(float_type(), "out", None);
        graph.add_node(node)
    }

    /// Exec node with an exec_in/exec_out pair
    fn exec_node(graph: &mut Graph, name: &str) -> NodeId {
        let mut node = Node::new("step", name);
        node.exec_in = Some(node.add_input(exec_type(), "exec_in"));
        node.exec_out = Some(node.add_output(exec_type(), "exec_out", None));
        graph.add_node(node)
    }

    fn bare_type(id: &str) -> NodeType {
        NodeType {
            id: id.to_string(),
            name: id.to_string(),
            category: NodeCategory::Utility,
            description: String::new(),
            kind: NodeKind::Compute,
            is_exec: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register_with_behavior(bare_type("double"), Box::new(DoubleBehavior));
        registry.register_with_behavior(bare_type("fail"), Box::new(FailingBehavior));
        registry.register_with_behavior(bare_type("step"), Box::new(NoOpBehavior));
        registry
    }

    fn connect_chain(graph: &mut Graph, from: NodeId, to: NodeId) {
        let from_ref = graph.node(from).unwrap().outputs[0].as_ref();
        let to_ref = graph.node(to).unwrap().inputs[0].as_ref();
        graph.connect(from_ref, to_ref).unwrap();
    }

    #[test]
    fn test_cook_success_records_state() {
        let mut graph = Graph::default();
        let node_id = chain_node(&mut graph, "a");
        graph.node_mut(node_id).unwrap().set_property("in", Value::Float(3.0));

        cook(&mut graph, &registry(), node_id).unwrap();

        let node = graph.node(node_id).unwrap();
        assert!(!node.need_cook);
        assert!(!node.is_invalid);
        assert_eq!(node.property("out"), Some(&Value::Float(6.0)));
    }

    #[test]
    fn test_cook_failure_marks_invalid() {
        let mut graph = Graph::default();
        let mut node = Node::new("fail", "broken");
        node.cook_time = Duration::from_millis(42);
        let node_id = graph.add_node(node);

        let result = cook(&mut graph, &registry(), node_id);
        assert!(matches!(result, Err(CookError::Custom(_))));

        let node = graph.node(node_id).unwrap();
        assert!(node.is_invalid);
        assert!(node.need_cook);
        assert_eq!(node.error_message.as_deref(), Some("missing scene object"));
        // unchanged on failure
        assert_eq!(node.cook_time, Duration::from_millis(42));
    }

    #[test]
    fn test_cook_clears_prior_error() {
        let mut graph = Graph::default();
        let node_id = chain_node(&mut graph, "a");
        graph.node_mut(node_id).unwrap().error("stale failure");

        cook(&mut graph, &registry(), node_id).unwrap();

        let node = graph.node(node_id).unwrap();
        assert!(!node.is_invalid);
        assert!(node.error_message.is_none());
    }

    #[test]
    fn test_cook_queue_stops_at_failure() {
        let mut graph = Graph::default();
        let good = chain_node(&mut graph, "good");
        let bad = graph.add_node(Node::new("fail", "bad"));
        let never = chain_node(&mut graph, "never");
        graph.node_mut(good).unwrap().set_property("in", Value::Float(1.0));

        let result = cook_queue(&mut graph, &registry(), &[good, bad, never]);
        assert!(result.is_err());
        assert!(!graph.node(good).unwrap().need_cook);
        assert!(graph.node(never).unwrap().need_cook);
    }

    #[test]
    fn test_input_data_unconnected_fallbacks() {
        let mut graph = Graph::default();
        let node_id = chain_node(&mut graph, "a");

        // no property stored: node default value
        assert_eq!(input_data(&graph, node_id, 0), Value::Null);
        graph.node_mut(node_id).unwrap().set_property("in", Value::Float(1.5));
        assert_eq!(input_data(&graph, node_id, 0), Value::Float(1.5));
        // out-of-range index: node default value
        assert_eq!(input_data(&graph, node_id, 9), Value::Null);
    }

    #[test]
    fn test_input_data_multi_hop_chain() {
        let mut graph = Graph::default();
        let a = chain_node(&mut graph, "a");
        let b = chain_node(&mut graph, "b");
        let c = chain_node(&mut graph, "c");
        connect_chain(&mut graph, a, b);
        connect_chain(&mut graph, b, c);

        graph.node_mut(a).unwrap().set_property("out", Value::Float(10.0));
        graph.node_mut(b).unwrap().set_property("out", Value::Float(20.0));

        // c reads b's produced value
        assert_eq!(input_data(&graph, c, 0), Value::Float(20.0));
        // disabling b forwards a's value through it
        graph.node_mut(b).unwrap().disabled = true;
        assert_eq!(input_data(&graph, c, 0), Value::Float(10.0));
    }

    #[test]
    fn test_disabled_pass_through_clamps_index() {
        let mut graph = Graph::default();
        let mut node = Node::new("double", "wide");
        node.add_input(float_type(), "in");
        node.add_output(float_type(), "first", None);
        let second = node.add_output(float_type(), "second", None);
        node.disabled = true;
        let node_id = graph.add_node(node);
        graph.node_mut(node_id).unwrap().set_property("in", Value::Float(5.0));

        // output index 1 clamps onto the single input
        assert_eq!(data(&graph, node_id, second), Value::Float(5.0));
    }

    #[test]
    fn test_verify_collects_failing_inputs() {
        let mut graph = Graph::default();
        let mut node = Node::new("double", "strict");
        let first = node.add_input(float_type(), "alpha");
        let second = node.add_input(float_type(), "beta");
        node.mark_input_required(first);
        node.mark_input_required(second);
        let node_id = graph.add_node(node);

        assert!(!verify(&mut graph, node_id));
        assert_eq!(
            graph.node(node_id).unwrap().error_message.as_deref(),
            Some("Invalid input: alpha\nInvalid input: beta\n")
        );

        // a truthy fallback value satisfies the requirement
        graph.node_mut(node_id).unwrap().set_property("alpha", Value::Float(1.0));
        graph.node_mut(node_id).unwrap().set_property("beta", Value::Float(2.0));
        assert!(verify(&mut graph, node_id));
        assert!(graph.node(node_id).unwrap().error_message.is_none());
    }

    #[test]
    fn test_exec_queue_linear_chain() {
        let mut graph = Graph::default();
        let a = exec_node(&mut graph, "a");
        let b = exec_node(&mut graph, "b");
        let c = exec_node(&mut graph, "c");

        let wire = |graph: &mut Graph, from: NodeId, to: NodeId| {
            let out = graph.node(from).unwrap().exec_out.unwrap();
            let input = graph.node(to).unwrap().exec_in.unwrap();
            graph
                .connect(SocketRef::new(from, out), SocketRef::new(to, input))
                .unwrap();
        };
        wire(&mut graph, a, b);
        wire(&mut graph, b, c);

        assert_eq!(exec_queue(&graph, a), vec![a, b, c]);
        assert_eq!(exec_queue(&graph, b), vec![b, c]);
        assert_eq!(exec_queue(&graph, c), vec![c]);
    }

    #[test]
    fn test_exec_queue_branch_order() {
        let mut graph = Graph::default();
        let root = exec_node(&mut graph, "root");
        let first = exec_node(&mut graph, "first");
        let tail = exec_node(&mut graph, "tail");
        let second = exec_node(&mut graph, "second");

        // give root a second exec output
        let extra = {
            let node = graph.node_mut(root).unwrap();
            node.add_output(exec_type(), "exec_out_2", None)
        };
        let wire = |graph: &mut Graph, from: SocketRef, to_node: NodeId| {
            let input = graph.node(to_node).unwrap().exec_in.unwrap();
            graph.connect(from, SocketRef::new(to_node, input)).unwrap();
        };
        let root_out = graph.node(root).unwrap().exec_out.unwrap();
        wire(&mut graph, SocketRef::new(root, root_out), first);
        wire(&mut graph, SocketRef::new(root, extra), second);
        let first_out = graph.node(first).unwrap().exec_out.unwrap();
        wire(&mut graph, SocketRef::new(first, first_out), tail);

        // the first branch's entire chain precedes the second branch
        assert_eq!(exec_queue(&graph, root), vec![root, first, tail, second]);
    }
}
