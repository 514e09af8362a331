// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions: instances, type templates, and the factory registry.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datatype::{DataType, DataTypeError, DataTypeRegistry};
use crate::execution::NodeBehavior;
use crate::socket::{Socket, SocketDirection, SocketId};
use crate::value::Value;

/// Property key marking a node as a group/container; downstream neighbors
/// carrying it are flagged for eager re-cook during adjacency discovery
pub const GROUP_MARKER_PROPERTY: &str = "group_rect";

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes (result, preview)
    Output,
    /// Math operations
    Math,
    /// Logic/flow control
    Logic,
    /// Utility nodes
    Utility,
    /// Grouping containers
    Group,
    /// Custom/user-defined
    Custom,
}

/// Whether a node takes part in computation or only groups others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular computation node
    Compute,
    /// Pure grouping node with no sockets, excluded from all ordering
    Backdrop,
}

/// Socket template used by node type definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketSpec {
    /// Display label, also the property key backing `data()`
    pub label: String,
    /// Data type name, resolved against a [`DataTypeRegistry`]
    pub data_type: String,
    /// Initial value override (defaults to the data type default)
    pub value: Option<Value>,
    /// Connection limit override
    pub max_connections: Option<usize>,
    /// Whether this input must be connected or hold a truthy value
    pub required: bool,
}

impl SocketSpec {
    /// Create a new socket template
    pub fn new(label: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data_type: data_type.into(),
            value: None,
            max_connections: None,
            required: false,
        }
    }

    /// Set the initial value
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the connection limit
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Computation or backdrop
    pub kind: NodeKind,
    /// Whether instances get the reserved exec socket pair
    pub is_exec: bool,
    /// Declared input sockets
    pub inputs: Vec<SocketSpec>,
    /// Declared output sockets
    pub outputs: Vec<SocketSpec>,
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    /// Computation or backdrop
    pub kind: NodeKind,
    /// Input sockets, in declaration order
    pub inputs: Vec<Socket>,
    /// Output sockets, in declaration order
    pub outputs: Vec<Socket>,
    /// Inputs that must be connected or truthy for `verify` to pass
    pub required_inputs: Vec<SocketId>,
    /// Disabled nodes pass input data through instead of computing
    pub disabled: bool,
    /// Sticky failure marker, cleared at the start of the next cook
    pub is_invalid: bool,
    /// Diagnostic recorded by `error()` or `verify`
    pub error_message: Option<String>,
    /// Duration of the last successful cook
    pub cook_time: Duration,
    /// Whether the node needs cooking
    pub need_cook: bool,
    /// Property store backing `data()`/`input_data()` reads
    pub properties: IndexMap<String, Value>,
    /// Value returned when no socket, property, or connection resolves
    pub default_value: Value,
    /// Reserved control-flow input, exec nodes only
    pub exec_in: Option<SocketId>,
    /// Reserved control-flow output (single active branch), exec nodes only
    pub exec_out: Option<SocketId>,
}

impl Node {
    /// Create a new bare node with no sockets
    pub fn new(node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            node_type: node_type.into(),
            name: name.into(),
            kind: NodeKind::Compute,
            inputs: Vec::new(),
            outputs: Vec::new(),
            required_inputs: Vec::new(),
            disabled: false,
            is_invalid: false,
            error_message: None,
            cook_time: Duration::ZERO,
            need_cook: true,
            properties: IndexMap::new(),
            default_value: Value::Null,
            exec_in: None,
            exec_out: None,
        }
    }

    /// Whether this node is a backdrop
    pub fn is_backdrop(&self) -> bool {
        self.kind == NodeKind::Backdrop
    }

    /// Add an input socket (single connection by default)
    pub fn add_input(&mut self, data_type: DataType, label: impl Into<String>) -> SocketId {
        let socket = Socket::new(
            self.id,
            SocketDirection::Input,
            self.inputs.len(),
            data_type,
            label,
        );
        let id = socket.id;
        self.inputs.push(socket);
        id
    }

    /// Add an output socket (unlimited connections unless exec, which is
    /// forced to a single active branch)
    pub fn add_output(
        &mut self,
        data_type: DataType,
        label: impl Into<String>,
        max_connections: Option<usize>,
    ) -> SocketId {
        let max_connections = if data_type.is_exec() {
            Some(1)
        } else {
            max_connections
        };
        let socket = Socket::new(
            self.id,
            SocketDirection::Output,
            self.outputs.len(),
            data_type,
            label,
        )
        .with_max_connections(max_connections);
        let id = socket.id;
        self.outputs.push(socket);
        id
    }

    /// Register an input as required for execution
    pub fn mark_input_required(&mut self, socket_id: SocketId) {
        if self.inputs.iter().any(|s| s.id == socket_id) {
            self.required_inputs.push(socket_id);
        } else {
            tracing::warn!("Cannot mark {:?} as required: not an input of {}", socket_id, self.name);
        }
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    /// Get a socket by ID
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.inputs
            .iter()
            .find(|s| s.id == socket_id)
            .or_else(|| self.outputs.iter().find(|s| s.id == socket_id))
    }

    /// Get a mutable socket by ID
    pub fn socket_mut(&mut self, socket_id: SocketId) -> Option<&mut Socket> {
        self.inputs
            .iter_mut()
            .find(|s| s.id == socket_id)
            .or_else(|| self.outputs.iter_mut().find(|s| s.id == socket_id))
    }

    /// Get all sockets
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Find the first input socket with the given label
    pub fn find_input_by_label(&self, label: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.label == label)
    }

    /// Find the first output socket with the given label
    pub fn find_output_by_label(&self, label: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.label == label)
    }

    /// Executable output sockets, in declaration order
    pub fn exec_outputs(&self) -> impl Iterator<Item = &Socket> {
        self.outputs.iter().filter(|s| s.is_exec())
    }

    /// Input sockets that carry data (not control flow)
    pub fn non_exec_inputs(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().filter(|s| !s.is_exec())
    }

    /// Output sockets that carry data (not control flow)
    pub fn non_exec_outputs(&self) -> impl Iterator<Item = &Socket> {
        self.outputs.iter().filter(|s| !s.is_exec())
    }

    /// Whether a property is stored under the given key
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Get a stored property value
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Store a property value
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Record a failure: marks the node invalid and stores the diagnostic.
    /// The marker is only cleared at the start of the next cook.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Node '{}' failed: {}", self.name, message);
        self.is_invalid = true;
        self.error_message = Some(message);
    }

    /// Clear a prior error state
    pub(crate) fn close_error(&mut self) {
        self.is_invalid = false;
        self.error_message = None;
    }
}

/// Error when instantiating a node from the registry
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// No node type registered under the given ID
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A socket template names an unregistered data type
    #[error(transparent)]
    DataType(#[from] DataTypeError),
}

/// Registry of available node types and their behaviors
pub struct NodeRegistry {
    types: IndexMap<String, (NodeType, Box<dyn NodeBehavior>)>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type with a no-op behavior
    pub fn register(&mut self, node_type: NodeType) {
        self.register_with_behavior(node_type, Box::new(crate::execution::NoOpBehavior));
    }

    /// Register a node type with its behavior
    pub fn register_with_behavior(&mut self, node_type: NodeType, behavior: Box<dyn NodeBehavior>) {
        self.types.insert(node_type.id.clone(), (node_type, behavior));
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id).map(|(t, _)| t)
    }

    /// Get the behavior registered for a node type
    pub fn behavior(&self, id: &str) -> Option<&dyn NodeBehavior> {
        self.types.get(id).map(|(_, b)| b.as_ref())
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values().map(|(t, _)| t)
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types().filter(move |t| t.category == category)
    }

    /// Instantiate a node from a type ID, resolving socket data types
    /// through the given registry
    pub fn create_node(
        &self,
        type_id: &str,
        data_types: &DataTypeRegistry,
    ) -> Result<Node, FactoryError> {
        let node_type = self
            .get(type_id)
            .ok_or_else(|| FactoryError::UnknownNodeType(type_id.to_string()))?;

        let mut node = Node::new(node_type.id.clone(), node_type.name.clone());
        node.kind = node_type.kind;

        if node.is_backdrop() {
            return Ok(node);
        }

        // Reserved control-flow pair comes before declared sockets.
        if node_type.is_exec {
            let exec = data_types.get("exec")?.clone();
            node.exec_in = Some(node.add_input(exec.clone(), "exec_in"));
            node.exec_out = Some(node.add_output(exec, "exec_out", Some(1)));
        }

        for spec in &node_type.inputs {
            let data_type = data_types.get(&spec.data_type)?.clone();
            let id = node.add_input(data_type, spec.label.clone());
            if let Some(socket) = node.socket_mut(id) {
                if let Some(value) = &spec.value {
                    socket.value = value.clone();
                    socket.default_value = value.clone();
                }
                if spec.max_connections.is_some() {
                    socket.max_connections = spec.max_connections;
                }
            }
            if spec.required {
                node.mark_input_required(id);
            }
        }

        for spec in &node_type.outputs {
            let data_type = data_types.get(&spec.data_type)?.clone();
            let id = node.add_output(data_type, spec.label.clone(), spec.max_connections);
            if let Some(value) = &spec.value {
                if let Some(socket) = node.socket_mut(id) {
                    socket.value = value.clone();
                    socket.default_value = value.clone();
                }
            }
        }

        if node_type.category == NodeCategory::Group {
            node.set_property(GROUP_MARKER_PROPERTY, Value::Bool(true));
        }

        Ok(node)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> (NodeRegistry, DataTypeRegistry) {
        let data_types = DataTypeRegistry::builtin();
        let mut registry = NodeRegistry::new();
        registry.register(NodeType {
            id: "scale".to_string(),
            name: "Scale".to_string(),
            category: NodeCategory::Math,
            description: "Scales a vector by a factor".to_string(),
            kind: NodeKind::Compute,
            is_exec: true,
            inputs: vec![
                SocketSpec::new("vector", "vector3").required(),
                SocketSpec::new("factor", "float").with_value(Value::Float(1.0)),
            ],
            outputs: vec![SocketSpec::new("scaled", "vector3")],
        });
        (registry, data_types)
    }

    #[test]
    fn test_create_node_sockets() {
        let (registry, data_types) = test_registry();
        let node = registry.create_node("scale", &data_types).unwrap();

        // Exec pair first, then declared sockets.
        assert_eq!(node.inputs.len(), 3);
        assert_eq!(node.outputs.len(), 2);
        assert_eq!(node.inputs[0].label, "exec_in");
        assert_eq!(node.inputs[1].label, "vector");
        assert_eq!(node.exec_in, Some(node.inputs[0].id));
        assert_eq!(node.exec_out, Some(node.outputs[0].id));
        // Single active outgoing branch.
        assert_eq!(node.outputs[0].max_connections, Some(1));
        assert_eq!(node.required_inputs, vec![node.inputs[1].id]);
        assert_eq!(node.inputs[2].value, Value::Float(1.0));
    }

    #[test]
    fn test_unknown_node_type() {
        let (registry, data_types) = test_registry();
        assert!(matches!(
            registry.create_node("warp", &data_types),
            Err(FactoryError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_error_is_sticky() {
        let mut node = Node::new("scale", "Scale");
        node.error("failed to resolve mesh");
        assert!(node.is_invalid);
        assert_eq!(node.error_message.as_deref(), Some("failed to resolve mesh"));
        node.close_error();
        assert!(!node.is_invalid);
        assert!(node.error_message.is_none());
    }

    #[test]
    fn test_backdrop_has_no_sockets() {
        let data_types = DataTypeRegistry::builtin();
        let mut registry = NodeRegistry::new();
        registry.register(NodeType {
            id: "backdrop".to_string(),
            name: "Backdrop".to_string(),
            category: NodeCategory::Group,
            description: "Visual grouping only".to_string(),
            kind: NodeKind::Backdrop,
            is_exec: false,
            inputs: vec![],
            outputs: vec![],
        });
        let node = registry.create_node("backdrop", &data_types).unwrap();
        assert!(node.is_backdrop());
        assert!(node.inputs.is_empty() && node.outputs.is_empty());
    }
}
