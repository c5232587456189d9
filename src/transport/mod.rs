//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait. Domain code must not depend on transport-specific
//! types.

mod memory;

pub use memory::{create_memory_transport, MemoryHub, MemoryTransport};
