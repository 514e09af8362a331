// SPDX-License-Identifier: MIT OR Apache-2.0
//! Standard node library: constants, arithmetic, logging, grouping.

use crate::execution::{input_data, CookError, NodeBehavior};
use crate::graph::Graph;
use crate::node::{NodeCategory, NodeId, NodeKind, NodeRegistry, NodeType, SocketSpec};
use crate::socket::Socket;
use crate::value::Value;

/// Create the standard node registry
pub fn create_standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // Entry point of executable chains
    registry.register(NodeType {
        id: "start".to_string(),
        name: "Start".to_string(),
        category: NodeCategory::Input,
        description: "Entry point of an executable chain".to_string(),
        kind: NodeKind::Compute,
        is_exec: true,
        inputs: vec![],
        outputs: vec![],
    });

    registry.register_with_behavior(
        NodeType {
            id: "float_constant".to_string(),
            name: "Float".to_string(),
            category: NodeCategory::Input,
            description: "Constant float value".to_string(),
            kind: NodeKind::Compute,
            is_exec: false,
            inputs: vec![],
            outputs: vec![SocketSpec::new("value", "float").with_value(Value::Float(0.0))],
        },
        Box::new(ConstantBehavior),
    );

    registry.register_with_behavior(
        NodeType {
            id: "add".to_string(),
            name: "Add".to_string(),
            category: NodeCategory::Math,
            description: "Sum of two numbers".to_string(),
            kind: NodeKind::Compute,
            is_exec: false,
            inputs: vec![
                SocketSpec::new("a", "float"),
                SocketSpec::new("b", "float"),
            ],
            outputs: vec![SocketSpec::new("sum", "float")],
        },
        Box::new(AddBehavior),
    );

    registry.register_with_behavior(
        NodeType {
            id: "multiply".to_string(),
            name: "Multiply".to_string(),
            category: NodeCategory::Math,
            description: "Product of two numbers".to_string(),
            kind: NodeKind::Compute,
            is_exec: false,
            inputs: vec![
                SocketSpec::new("a", "float"),
                SocketSpec::new("b", "float"),
            ],
            outputs: vec![SocketSpec::new("product", "float")],
        },
        Box::new(MultiplyBehavior),
    );

    registry.register_with_behavior(
        NodeType {
            id: "log_message".to_string(),
            name: "Log Message".to_string(),
            category: NodeCategory::Utility,
            description: "Log a message through the tracing pipeline".to_string(),
            kind: NodeKind::Compute,
            is_exec: true,
            inputs: vec![SocketSpec::new("message", "string").required()],
            outputs: vec![],
        },
        Box::new(LogBehavior),
    );

    registry.register(NodeType {
        id: "group".to_string(),
        name: "Group".to_string(),
        category: NodeCategory::Group,
        description: "Container that is eagerly recooked when fed".to_string(),
        kind: NodeKind::Compute,
        is_exec: false,
        inputs: vec![],
        outputs: vec![],
    });

    registry.register(NodeType {
        id: "backdrop".to_string(),
        name: "Backdrop".to_string(),
        category: NodeCategory::Group,
        description: "Visual annotation, excluded from ordering".to_string(),
        kind: NodeKind::Backdrop,
        is_exec: false,
        inputs: vec![],
        outputs: vec![],
    });

    registry
}

/// Resolve a labelled input as a float; untouched inputs read as zero
fn numeric_input(graph: &Graph, node_id: NodeId, label: &str) -> Result<f64, CookError> {
    let socket_id = graph
        .node(node_id)
        .and_then(|n| n.find_input_by_label(label))
        .map(|s| s.id)
        .ok_or_else(|| CookError::Custom(format!("missing input socket '{label}'")))?;
    match input_data(graph, node_id, socket_id) {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        Value::Null => Ok(0.0),
        other => Err(CookError::Custom(format!(
            "input '{label}' is not numeric: {other:?}"
        ))),
    }
}

/// Store a result under the output's property key and push it onto the
/// output socket so connected consumers are notified
fn publish(
    graph: &mut Graph,
    node_id: NodeId,
    label: &str,
    value: Value,
) -> Result<(), CookError> {
    if let Some(node) = graph.node_mut(node_id) {
        node.set_property(label, value.clone());
    }
    let output = graph
        .node(node_id)
        .and_then(|n| n.find_output_by_label(label))
        .map(Socket::as_ref);
    if let Some(sref) = output {
        graph
            .set_socket_value(sref, value)
            .map_err(|e| CookError::Custom(e.to_string()))?;
    }
    Ok(())
}

struct ConstantBehavior;

impl NodeBehavior for ConstantBehavior {
    fn execute(&self, node_id: NodeId, graph: &mut Graph) -> Result<(), CookError> {
        let value = graph
            .node(node_id)
            .ok_or(CookError::NodeNotFound(node_id))?
            .property("value")
            .cloned()
            .unwrap_or(Value::Float(0.0));
        publish(graph, node_id, "value", value)
    }
}

struct AddBehavior;

impl NodeBehavior for AddBehavior {
    fn execute(&self, node_id: NodeId, graph: &mut Graph) -> Result<(), CookError> {
        let a = numeric_input(graph, node_id, "a")?;
        let b = numeric_input(graph, node_id, "b")?;
        publish(graph, node_id, "sum", Value::Float(a + b))
    }
}

struct MultiplyBehavior;

impl NodeBehavior for MultiplyBehavior {
    fn execute(&self, node_id: NodeId, graph: &mut Graph) -> Result<(), CookError> {
        let a = numeric_input(graph, node_id, "a")?;
        let b = numeric_input(graph, node_id, "b")?;
        publish(graph, node_id, "product", Value::Float(a * b))
    }
}

struct LogBehavior;

impl NodeBehavior for LogBehavior {
    fn execute(&self, node_id: NodeId, graph: &mut Graph) -> Result<(), CookError> {
        let socket_id = graph
            .node(node_id)
            .and_then(|n| n.find_input_by_label("message"))
            .map(|s| s.id)
            .ok_or_else(|| CookError::Custom("missing input socket 'message'".to_string()))?;
        match input_data(graph, node_id, socket_id) {
            Value::String(message) => tracing::info!("{message}"),
            other => tracing::info!("{other:?}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataTypeRegistry;
    use crate::execution::{cook_queue, data, exec_queue};
    use crate::node::GROUP_MARKER_PROPERTY;
    use crate::ordering::topological_sort_by_down;
    use crate::socket::SocketRef;

    fn setup() -> (NodeRegistry, DataTypeRegistry, Graph) {
        (
            create_standard_registry(),
            DataTypeRegistry::builtin(),
            Graph::new("standard"),
        )
    }

    fn spawn(
        registry: &NodeRegistry,
        data_types: &DataTypeRegistry,
        graph: &mut Graph,
        type_id: &str,
    ) -> NodeId {
        let node = registry.create_node(type_id, data_types).unwrap();
        graph.add_node(node)
    }

    #[test]
    fn test_arithmetic_chain_cooks() {
        let (registry, data_types, mut graph) = setup();
        let two = spawn(&registry, &data_types, &mut graph, "float_constant");
        let three = spawn(&registry, &data_types, &mut graph, "float_constant");
        let add = spawn(&registry, &data_types, &mut graph, "add");
        graph.node_mut(two).unwrap().set_property("value", Value::Float(2.0));
        graph.node_mut(three).unwrap().set_property("value", Value::Float(3.0));

        let out = |graph: &Graph, id: NodeId| graph.node(id).unwrap().outputs[0].as_ref();
        let input = |graph: &Graph, id: NodeId, label: &str| {
            graph
                .node(id)
                .unwrap()
                .find_input_by_label(label)
                .unwrap()
                .as_ref()
        };
        graph.connect(out(&graph, two), input(&graph, add, "a")).unwrap();
        graph.connect(out(&graph, three), input(&graph, add, "b")).unwrap();

        let all: Vec<NodeId> = graph.node_ids().collect();
        let order = topological_sort_by_down(&mut graph, &[], &all);
        cook_queue(&mut graph, &registry, &order).unwrap();

        let sum = graph.node(add).unwrap().outputs[0].id;
        assert_eq!(data(&graph, add, sum), Value::Float(5.0));
        assert_eq!(graph.socket_value(SocketRef::new(add, sum)), Value::Float(5.0));
        assert!(!graph.node(add).unwrap().need_cook);
    }

    #[test]
    fn test_exec_chain_through_log() {
        let (registry, data_types, mut graph) = setup();
        let start = spawn(&registry, &data_types, &mut graph, "start");
        let log = spawn(&registry, &data_types, &mut graph, "log_message");
        graph
            .node_mut(log)
            .unwrap()
            .set_property("message", Value::String("build finished".to_string()));

        let start_out = graph.node(start).unwrap().exec_out.unwrap();
        let log_in = graph.node(log).unwrap().exec_in.unwrap();
        graph
            .connect(SocketRef::new(start, start_out), SocketRef::new(log, log_in))
            .unwrap();

        let queue = exec_queue(&graph, start);
        assert_eq!(queue, vec![start, log]);
        cook_queue(&mut graph, &registry, &queue).unwrap();
        assert!(!graph.node(log).unwrap().is_invalid);
    }

    #[test]
    fn test_group_and_backdrop_instances() {
        let (registry, data_types, mut graph) = setup();
        let group = spawn(&registry, &data_types, &mut graph, "group");
        let backdrop = spawn(&registry, &data_types, &mut graph, "backdrop");

        assert!(graph.node(group).unwrap().has_property(GROUP_MARKER_PROPERTY));
        let backdrop = graph.node(backdrop).unwrap();
        assert!(backdrop.is_backdrop());
        assert!(backdrop.inputs.is_empty() && backdrop.outputs.is_empty());
    }

    #[test]
    fn test_int_input_widens() {
        let (registry, data_types, mut graph) = setup();
        let add = spawn(&registry, &data_types, &mut graph, "add");
        graph.node_mut(add).unwrap().set_property("a", Value::Int(4));
        graph.node_mut(add).unwrap().set_property("b", Value::Float(0.5));

        let order = vec![add];
        cook_queue(&mut graph, &registry, &order).unwrap();
        assert_eq!(
            graph.node(add).unwrap().property("sum"),
            Some(&Value::Float(4.5))
        );
    }
}
