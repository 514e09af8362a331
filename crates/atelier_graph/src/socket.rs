// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions: typed, directed, named ports owned by a node.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datatype::DataType;
use crate::edge::EdgeId;
use crate::node::NodeId;
use crate::value::Value;

/// Unique identifier for a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(pub Uuid);

impl SocketId {
    /// Create a new random socket ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

/// Graph-wide address of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketRef {
    /// Owning node
    pub node: NodeId,
    /// Socket within the node
    pub socket: SocketId,
}

impl SocketRef {
    /// Create a new socket reference
    pub fn new(node: NodeId, socket: SocketId) -> Self {
        Self { node, socket }
    }
}

/// Socket direction, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

/// A typed, directed port on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Socket {
    /// Unique socket ID
    pub id: SocketId,
    /// Owning node
    pub node: NodeId,
    /// Direction
    pub direction: SocketDirection,
    /// Index among the sockets on the same side of the node
    pub index: usize,
    /// Data type descriptor
    pub data_type: DataType,
    /// Display label, also the node property key backing `data()`
    pub label: String,
    /// Stored value
    pub value: Value,
    /// Default value, restored when a runtime-only input disconnects
    pub default_value: Value,
    /// Maximum number of data edges (`None` = unlimited); exceeding it
    /// evicts the oldest edge rather than rejecting the new one
    pub max_connections: Option<usize>,
    /// Attached data edges, oldest first
    pub edges: Vec<EdgeId>,
}

impl Socket {
    /// Create a new socket
    pub fn new(
        node: NodeId,
        direction: SocketDirection,
        index: usize,
        data_type: DataType,
        label: impl Into<String>,
    ) -> Self {
        let max_connections = match direction {
            SocketDirection::Input => Some(1),
            SocketDirection::Output => None,
        };
        let default_value = data_type.default.clone();
        Self {
            id: SocketId::new(),
            node,
            direction,
            index,
            data_type,
            label: label.into(),
            value: default_value.clone(),
            default_value,
            max_connections,
            edges: Vec::new(),
        }
    }

    /// Override the connection limit
    pub fn with_max_connections(mut self, max_connections: Option<usize>) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Override the stored and default value
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value.clone();
        self.default_value = value;
        self
    }

    /// Whether this socket carries control flow only
    pub fn is_exec(&self) -> bool {
        self.data_type.is_exec()
    }

    /// Whether any data edge is attached
    pub fn is_connected(&self) -> bool {
        !self.edges.is_empty()
    }

    /// Graph-wide address of this socket
    pub fn as_ref(&self) -> SocketRef {
        SocketRef::new(self.node, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{DataTypeRegistry, ValueKind};

    #[test]
    fn test_direction_defaults() {
        let registry = DataTypeRegistry::builtin();
        let float = registry.get("float").unwrap().clone();
        let node = NodeId::new();

        let input = Socket::new(node, SocketDirection::Input, 0, float.clone(), "a");
        assert_eq!(input.max_connections, Some(1));
        assert_eq!(input.value, Value::Float(0.0));

        let output = Socket::new(node, SocketDirection::Output, 0, float, "result");
        assert_eq!(output.max_connections, None);
        assert!(!output.is_connected());
    }

    #[test]
    fn test_exec_socket() {
        let registry = DataTypeRegistry::builtin();
        let exec = registry.get("exec").unwrap().clone();
        let socket = Socket::new(NodeId::new(), SocketDirection::Output, 0, exec, "exec_out")
            .with_max_connections(Some(1));
        assert!(socket.is_exec());
        assert_eq!(socket.data_type.kind, ValueKind::Exec);
    }
}
