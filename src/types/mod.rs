//! Client Types
//!
//! Configuration, credential and wire types.

pub mod auth;
pub mod config;
pub mod token;

pub use auth::*;
pub use config::*;
pub use token::*;
