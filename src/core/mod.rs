//! Core Components
//!
//! HTTP transport seam shared by the client and the refresh coordinator.

pub mod transport;

pub use transport::*;
