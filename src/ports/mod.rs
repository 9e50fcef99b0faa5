//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces the usecases layer requires from the outside
//! world. Adapters implement these traits.
//!
//! Port categories:
//! - `DependencyProbe`: readiness checks against external dependencies

pub mod probe;

pub use probe::DependencyProbe;
