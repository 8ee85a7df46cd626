//! Request identity and scoped locking.

mod context;
mod user_session;
pub use context::Context;
pub use user_session::*;
