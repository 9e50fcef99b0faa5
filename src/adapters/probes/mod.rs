//! Dependency probe adapters implementing `ports::DependencyProbe`.

pub mod tcp;

pub use tcp::TcpProbe;
