// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge (connection) definitions for the graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::NodeId;
use crate::socket::{SocketId, SocketRef};

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Dependency mechanism an edge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Value-carrying connection between an output and an input socket
    Data,
    /// Manual secondary dependency: the source pushes its value to the
    /// target on `update_affected`, outside the data edge lists
    Affects,
}

/// A directed link from an output socket to an input socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Dependency mechanism
    pub kind: EdgeKind,
    /// Source (output) socket
    pub from: SocketRef,
    /// Target (input) socket
    pub to: SocketRef,
}

impl Edge {
    /// Create a new edge of the given kind
    pub fn new(kind: EdgeKind, from: SocketRef, to: SocketRef) -> Self {
        Self {
            id: EdgeId::new(),
            kind,
            from,
            to,
        }
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }

    /// Check if this edge involves a specific socket
    pub fn involves_socket(&self, socket_id: SocketId) -> bool {
        self.from.socket == socket_id || self.to.socket == socket_id
    }
}
