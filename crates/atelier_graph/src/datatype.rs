// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data type descriptors and the registry that resolves them by name.
//!
//! The registry is an explicit object passed into graph construction so
//! multiple independent graphs (and tests) never share lookup tables.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Backing kind of values a socket can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Execution flow, carries no data
    Exec,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// 3D vector
    Vector3,
    /// Runtime object handle
    Object,
}

impl ValueKind {
    /// Check whether a value of this kind can be assigned to a socket
    /// declared with `other`.
    ///
    /// `Int` widens to `Float`; `Exec` only matches `Exec`; everything else
    /// is nominal.
    pub fn is_subtype_of(self, other: ValueKind) -> bool {
        if self == other {
            return true;
        }
        matches!((self, other), (Self::Int, Self::Float))
    }
}

/// Immutable descriptor for a socket data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    /// Registry name
    pub name: String,
    /// Backing value kind
    pub kind: ValueKind,
    /// Default value for sockets of this type
    pub default: Value,
    /// Whether values of this type are only valid while their producer
    /// exists (disconnecting resets the socket to the default)
    pub runtime_only: bool,
}

impl DataType {
    /// Create a new data type descriptor
    pub fn new(name: impl Into<String>, kind: ValueKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            runtime_only: false,
        }
    }

    /// Mark this type as runtime-only
    pub fn runtime_only(mut self) -> Self {
        self.runtime_only = true;
        self
    }

    /// Whether this is the reserved control-flow-only type
    pub fn is_exec(&self) -> bool {
        self.kind == ValueKind::Exec
    }
}

/// Error raised by data type registration, lookup, or value assignment
#[derive(Debug, thiserror::Error)]
pub enum DataTypeError {
    /// A type with the same name is already registered
    #[error("Data type already registered: {0}")]
    AlreadyRegistered(String),

    /// No type with the given name is registered
    #[error("Unknown data type: {0}")]
    UnknownType(String),

    /// A value of the wrong kind was assigned to a socket
    #[error("Cannot assign {actual:?} value to {expected:?} socket")]
    KindMismatch {
        /// Kind declared by the socket
        expected: ValueKind,
        /// Kind of the assigned value
        actual: ValueKind,
    },
}

/// Registry of data type descriptors, resolved by name
#[derive(Debug, Clone, Default)]
pub struct DataTypeRegistry {
    types: IndexMap<String, DataType>,
}

impl DataTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with the builtin types
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for data_type in [
            DataType::new("exec", ValueKind::Exec, Value::Null),
            DataType::new("bool", ValueKind::Bool, Value::Bool(false)),
            DataType::new("int", ValueKind::Int, Value::Int(0)),
            DataType::new("float", ValueKind::Float, Value::Float(0.0)),
            DataType::new("string", ValueKind::String, Value::String(String::new())),
            DataType::new("vector3", ValueKind::Vector3, Value::Vector3([0.0; 3])),
            DataType::new("object", ValueKind::Object, Value::Null).runtime_only(),
        ] {
            // builtin names are unique
            let _ = registry.register(data_type);
        }
        registry
    }

    /// Register a data type
    pub fn register(&mut self, data_type: DataType) -> Result<(), DataTypeError> {
        if self.types.contains_key(&data_type.name) {
            return Err(DataTypeError::AlreadyRegistered(data_type.name));
        }
        self.types.insert(data_type.name.clone(), data_type);
        Ok(())
    }

    /// Get a data type by name
    pub fn get(&self, name: &str) -> Result<&DataType, DataTypeError> {
        self.types
            .get(name)
            .ok_or_else(|| DataTypeError::UnknownType(name.to_string()))
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &DataType> {
        self.types.values()
    }

    /// Get all runtime-only types
    pub fn runtime_types(&self) -> impl Iterator<Item = &DataType> {
        self.types.values().filter(|t| t.runtime_only)
    }
}
