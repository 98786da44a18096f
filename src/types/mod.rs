//! Core type definitions using newtype patterns for type safety.
//!
//! These types make invalid targets unrepresentable: a `Port` is never 0
//! and a `ProbeTarget` always holds a syntactically valid host.

mod port;
mod target;

pub use port::{Port, PortRange, PortSpec};
pub use target::{Credentials, ProbeTarget, SecurityMode};
