//! Assembly of one simulated server core from a [`crate::SimConfig`].

mod builder;
mod instance;
pub use builder::*;
pub use instance::*;
