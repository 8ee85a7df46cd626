mod field;
mod history;
mod property;
mod reference;
mod schema;
mod value;
pub use field::*;
pub use history::*;
pub use property::*;
pub use reference::*;
pub use schema::*;
pub use value::*;

#[cfg(test)]
mod types_test;
