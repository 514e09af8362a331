// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph authoring and execution core for Atelier.
//!
//! This crate provides the dataflow model that powers node-based
//! authoring tools:
//! - Typed input/output sockets with connection validation
//! - Data edges with FIFO eviction at the connection limit
//! - Manual affects edges for out-of-band dependencies
//! - A cook lifecycle with per-node behaviors, timing, and error state
//! - Executable chains walked through reserved exec sockets
//! - Tolerant downstream/upstream build-order sorts plus a strict
//!   cycle-detecting topological order
//!
//! ## Architecture
//!
//! A [`Graph`] owns nodes and edges by ID; cross-node semantics
//! (connection, value pull-through, propagation) live on the graph.
//! Node types and their [`NodeBehavior`]s are registered in a
//! [`NodeRegistry`]; socket data types resolve through a
//! [`DataTypeRegistry`].

pub mod datatype;
pub mod value;
pub mod socket;
pub mod edge;
pub mod node;
pub mod graph;
pub mod execution;
pub mod ordering;
pub mod nodes;

pub use datatype::{DataType, DataTypeError, DataTypeRegistry, ValueKind};
pub use edge::{Edge, EdgeId, EdgeKind};
pub use execution::{
    cook, cook_queue, data, exec_queue, input_data, verify, CookError, NodeBehavior, SocketSel,
};
pub use graph::{ConnectionError, CycleError, Graph, GraphEvent};
pub use node::{
    FactoryError, Node, NodeCategory, NodeId, NodeKind, NodeRegistry, NodeType, SocketSpec,
};
pub use ordering::{topological_sort_by_down, topological_sort_by_up};
pub use socket::{Socket, SocketDirection, SocketId, SocketRef};
pub use value::Value;
