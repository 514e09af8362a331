// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges, plus the connection
//! and value-propagation semantics that need both endpoints in reach.

use std::sync::mpsc::Sender;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::datatype::DataTypeError;
use crate::edge::{Edge, EdgeId, EdgeKind};
use crate::node::{Node, NodeId};
use crate::socket::{Socket, SocketDirection, SocketId, SocketRef};
use crate::value::Value;

/// Notification emitted synchronously (same call stack) to the registered
/// event sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A socket's value changed, or a connected dependent should know the
    /// upstream value changed (push notification, no re-read implied)
    ValueChanged {
        /// The socket the notification concerns
        socket: SocketRef,
    },
    /// A data edge was attached
    ConnectionCreated {
        /// The new edge
        edge: EdgeId,
        /// Source (output) socket
        from: SocketRef,
        /// Target (input) socket
        to: SocketRef,
    },
    /// A data edge was detached (explicit disconnect or eviction)
    ConnectionRemoved {
        /// Source (output) socket
        from: SocketRef,
        /// Target (input) socket
        to: SocketRef,
    },
}

/// Error when creating a connection; reported as a checkable value, never
/// a panic, so callers gate edge creation on it
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("Socket not found: {0:?}")]
    SocketNotFound(SocketId),

    /// A socket cannot connect to itself
    #[error("Cannot connect a socket to itself")]
    SelfConnection,

    /// Two inputs or two outputs cannot connect
    #[error("Cannot connect two sockets of the same direction")]
    SameDirection,

    /// Two sockets of the same node cannot connect
    #[error("Cannot connect two sockets of the same node")]
    SameNode,

    /// The output's backing kind is not a subtype of the input's kind
    #[error("Incompatible data types: {from} -> {to}")]
    IncompatibleTypes {
        /// Output socket data type name
        from: String,
        /// Input socket data type name
        to: String,
    },
}

/// Error when a dependency-order sort finds a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

/// A node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Edges between sockets (data and affects)
    edges: IndexMap<EdgeId, Edge>,
    /// Synchronous event sink, not part of the persisted document
    #[serde(skip)]
    events: Option<Sender<GraphEvent>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            events: None,
        }
    }

    /// Register the sink that receives change notifications; delivery is
    /// synchronous on the mutating call stack
    pub fn set_event_sink(&mut self, sink: Sender<GraphEvent>) {
        self.events = Some(sink);
    }

    fn emit(&self, event: GraphEvent) {
        if let Some(sink) = &self.events {
            // a dropped receiver just means nobody is listening
            let _ = sink.send(event);
        }
    }

    // Nodes

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node, detaching all of its edges first; no other node's
    /// socket retains an edge to the removed node afterwards
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }
        let edge_ids: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.involves_node(node_id))
            .map(|e| e.id)
            .collect();
        for edge_id in edge_ids {
            self.disconnect(edge_id);
        }
        tracing::debug!("Removing node {:?}", node_id);
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // Sockets

    /// Resolve a socket reference
    pub fn socket(&self, sref: SocketRef) -> Option<&Socket> {
        self.nodes.get(&sref.node)?.socket(sref.socket)
    }

    /// Resolve a socket reference mutably
    pub fn socket_mut(&mut self, sref: SocketRef) -> Option<&mut Socket> {
        self.nodes.get_mut(&sref.node)?.socket_mut(sref.socket)
    }

    fn resolve(&self, sref: SocketRef) -> Result<&Socket, ConnectionError> {
        let node = self
            .nodes
            .get(&sref.node)
            .ok_or(ConnectionError::NodeNotFound(sref.node))?;
        node.socket(sref.socket)
            .ok_or(ConnectionError::SocketNotFound(sref.socket))
    }

    // Edges

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check whether two sockets may be connected: rejects self-connection,
    /// same-direction and same-node pairs, and type-incompatible pairs
    /// (the output's backing kind must be a subtype of the input's declared
    /// kind). Order of the arguments does not matter.
    pub fn can_connect(&self, a: SocketRef, b: SocketRef) -> Result<(), ConnectionError> {
        if a == b {
            return Err(ConnectionError::SelfConnection);
        }
        let socket_a = self.resolve(a)?;
        let socket_b = self.resolve(b)?;
        if socket_a.direction == socket_b.direction {
            return Err(ConnectionError::SameDirection);
        }
        if a.node == b.node {
            return Err(ConnectionError::SameNode);
        }
        let (output, input) = if socket_a.direction == SocketDirection::Output {
            (socket_a, socket_b)
        } else {
            (socket_b, socket_a)
        };
        if !output.data_type.kind.is_subtype_of(input.data_type.kind) {
            return Err(ConnectionError::IncompatibleTypes {
                from: output.data_type.name.clone(),
                to: input.data_type.name.clone(),
            });
        }
        Ok(())
    }

    /// Connect two sockets with a data edge. The edge is appended to both
    /// sockets; if either socket then exceeds its `max_connections`, the
    /// oldest edge is evicted (FIFO) rather than the new one rejected.
    pub fn connect(&mut self, a: SocketRef, b: SocketRef) -> Result<EdgeId, ConnectionError> {
        self.can_connect(a, b)?;
        let a_is_output = self
            .resolve(a)
            .map(|s| s.direction == SocketDirection::Output)?;
        let (from, to) = if a_is_output { (a, b) } else { (b, a) };

        let edge = Edge::new(EdgeKind::Data, from, to);
        let edge_id = edge.id;
        self.edges.insert(edge_id, edge);
        if let Some(socket) = self.socket_mut(from) {
            socket.edges.push(edge_id);
        }
        if let Some(socket) = self.socket_mut(to) {
            socket.edges.push(edge_id);
        }
        self.enforce_connection_limit(from);
        self.enforce_connection_limit(to);

        tracing::debug!("Connected {:?} -> {:?}", from, to);
        self.emit(GraphEvent::ConnectionCreated {
            edge: edge_id,
            from,
            to,
        });
        Ok(edge_id)
    }

    /// Evict oldest edges until the socket is back within its limit
    fn enforce_connection_limit(&mut self, sref: SocketRef) {
        loop {
            let Some(socket) = self.socket(sref) else { return };
            let Some(max) = socket.max_connections else { return };
            if socket.edges.len() <= max {
                return;
            }
            let oldest = socket.edges[0];
            tracing::debug!("Evicting oldest edge {:?} from {:?}", oldest, sref);
            self.disconnect(oldest);
        }
    }

    /// Remove an edge, detaching it from both socket edge lists without
    /// deleting the sockets. An input socket of a runtime-only data type
    /// is reset to its default value on disconnect.
    pub fn disconnect(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(&edge_id)?;
        if edge.kind == EdgeKind::Data {
            if let Some(socket) = self.socket_mut(edge.from) {
                socket.edges.retain(|id| *id != edge_id);
            }
            if let Some(socket) = self.socket_mut(edge.to) {
                socket.edges.retain(|id| *id != edge_id);
                if socket.data_type.runtime_only {
                    socket.value = socket.default_value.clone();
                }
            }
            self.emit(GraphEvent::ConnectionRemoved {
                from: edge.from,
                to: edge.to,
            });
        }
        Some(edge)
    }

    /// Remove every data edge attached to a socket
    pub fn disconnect_all(&mut self, sref: SocketRef) {
        let edge_ids = match self.socket(sref) {
            Some(socket) => socket.edges.clone(),
            None => return,
        };
        for edge_id in edge_ids {
            self.disconnect(edge_id);
        }
    }

    // Values

    /// Read a socket's value. Output sockets return their stored value; an
    /// input socket performs the pull-through read: the first connected
    /// output socket's value if connected, its own stored/default value
    /// otherwise.
    pub fn socket_value(&self, sref: SocketRef) -> Value {
        let Some(socket) = self.socket(sref) else {
            return Value::Null;
        };
        if socket.direction == SocketDirection::Input {
            if let Some(edge) = socket.edges.first().and_then(|id| self.edges.get(id)) {
                if let Some(producer) = self.socket(edge.from) {
                    return producer.value.clone();
                }
            }
        }
        socket.value.clone()
    }

    /// Assign a socket's value. No-op for exec sockets and for values equal
    /// to the current one (idempotent, at most one change notification). A
    /// real change on an output socket additionally fans out a
    /// `ValueChanged` notification to every currently connected socket;
    /// the notification does not itself carry or re-read the value.
    pub fn set_socket_value(&mut self, sref: SocketRef, value: Value) -> Result<(), DataTypeError> {
        let Some(socket) = self.socket(sref) else {
            tracing::warn!("set_socket_value on unknown socket {:?}", sref);
            return Ok(());
        };
        if socket.is_exec() || socket.value == value {
            return Ok(());
        }
        if let Some(kind) = value.kind() {
            if !kind.is_subtype_of(socket.data_type.kind) {
                return Err(DataTypeError::KindMismatch {
                    expected: socket.data_type.kind,
                    actual: kind,
                });
            }
        }
        let fan_out: Vec<SocketRef> = if socket.direction == SocketDirection::Output {
            socket
                .edges
                .iter()
                .filter_map(|id| self.edges.get(id))
                .map(|e| e.to)
                .collect()
        } else {
            Vec::new()
        };
        if let Some(socket) = self.socket_mut(sref) {
            socket.value = value;
        }
        self.emit(GraphEvent::ValueChanged { socket: sref });
        for target in fan_out {
            self.emit(GraphEvent::ValueChanged { socket: target });
        }
        Ok(())
    }

    // Affects edges

    /// Register a manual dependency: `to` receives `from`'s current value
    /// whenever `update_affected` is explicitly requested. No direction or
    /// type check applies; this mechanism lives outside the data edge graph
    /// but is visible to the ordering algorithms.
    pub fn affects(&mut self, from: SocketRef, to: SocketRef) -> Result<EdgeId, ConnectionError> {
        self.resolve(from)?;
        self.resolve(to)?;
        let edge = Edge::new(EdgeKind::Affects, from, to);
        let edge_id = edge.id;
        self.edges.insert(edge_id, edge);
        Ok(edge_id)
    }

    /// Push the socket's current stored value into every affected socket
    pub fn update_affected(&mut self, sref: SocketRef) {
        let Some(socket) = self.socket(sref) else { return };
        let value = socket.value.clone();
        let targets: Vec<SocketRef> = self
            .edges
            .values()
            .filter(|e| e.kind == EdgeKind::Affects && e.from == sref)
            .map(|e| e.to)
            .collect();
        for target in targets {
            if let Some(socket) = self.socket_mut(target) {
                socket.value = value.clone();
            }
        }
    }

    /// Push affected-socket updates for every input socket of a node
    pub fn update_affected_outputs(&mut self, node_id: NodeId) {
        let inputs: Vec<SocketRef> = match self.nodes.get(&node_id) {
            Some(node) => node.inputs.iter().map(Socket::as_ref).collect(),
            None => return,
        };
        for sref in inputs {
            self.update_affected(sref);
        }
    }

    // Ordering

    /// Full dependency-order sort over every node: each node appears after
    /// all of its upstream dependencies (data and affects edges alike).
    /// Unlike the tolerant sort variants in [`crate::ordering`], a cyclic
    /// graph is reported as an explicit [`CycleError`].
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = IndexSet::new();
        let mut temp_mark = IndexSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut IndexSet<NodeId>,
        temp_mark: &mut IndexSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        for edge in self.edges.values() {
            if edge.to.node == node_id {
                self.visit(edge.from.node, visited, temp_mark, order)?;
            }
        }

        temp_mark.swap_remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
