//! the test_utils folder here will share utils or test components between
//! unit tests
mod common;
mod inventory_builder;
mod specs;

pub use common::*;
pub use inventory_builder::*;
pub use specs::*;
