// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node libraries.

pub mod standard;

pub use standard::create_standard_registry;
