//! Object registry: keyed store, reference allocation, per-object locking
//! and ordered cross-cutting observers.

mod entity;
mod namespace;
mod object;
mod observer;
mod store;
pub use namespace::*;
pub use object::*;
pub use observer::*;
pub use store::*;
