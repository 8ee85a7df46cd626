//! Views: managed objects whose `view` property lists a set of entities,
//! either derived from a container subtree or maintained by the client.

mod container;
mod manager;
pub use container::ContainerView;
pub use manager::*;
