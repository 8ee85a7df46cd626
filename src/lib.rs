//! In-memory core of a virtualization-management API simulator.
//!
//! Entity handlers mutate a [`Registry`]; its ordered observers (property
//! filters, views, the task manager) turn each mutation into property
//! change sets, history entries and view membership that clients read back
//! through a [`PropertyCollector`], history collectors and views.

mod config;
mod constants;
mod errors;
mod history;
pub mod metrics;
mod property;
mod registry;
mod service;
mod session;
mod types;
pub(crate) mod utils;
mod view;

pub use config::*;
pub use errors::*;
pub use history::*;
pub use property::*;
pub use registry::*;
pub use service::*;
pub use session::*;
pub use types::*;
pub use view::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
