//! # Capabilities
//!
//! A capability is a named, schema-described unit of executable behaviour.
//! The [`CapabilityRegistry`] tracks the capabilities available to a planner
//! and dispatches calls to their handlers by name.
//!
//! Capabilities enter a registry either up front (declared by the caller) or
//! during a planning session, when the
//! [`CapabilitySynthesizer`](crate::planning::CapabilitySynthesizer) backs a
//! missing one with a freshly created sub-agent.

pub mod capability;
pub mod registry;

pub use capability::{Capability, CapabilityHandler, OutputSchema, ParameterSchema};
pub use registry::{CapabilityRegistry, RegistryError};
