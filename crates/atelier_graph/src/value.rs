// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values that flow through sockets.

use serde::{Deserialize, Serialize};

use crate::datatype::ValueKind;

/// A value stored in a socket or node property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// 3D vector
    Vector3([f32; 3]),
    /// Handle to a runtime object owned by the host application
    Object(String),
}

impl Value {
    /// Get the backing kind of this value, or `None` for `Null`
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Int(_) => Some(ValueKind::Int),
            Self::Float(_) => Some(ValueKind::Float),
            Self::String(_) => Some(ValueKind::String),
            Self::Vector3(_) => Some(ValueKind::Vector3),
            Self::Object(_) => Some(ValueKind::Object),
        }
    }

    /// Whether this value counts as "set" for input verification
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Vector3(_) => true,
            Self::Object(o) => !o.is_empty(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}
