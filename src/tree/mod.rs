//! Attribute tree: the schema-tagged data model the engine consumes and
//! produces, plus its transport wire format.

pub mod array;
pub mod node;
pub mod wire;

pub use array::{Array, DType};
pub use node::{Node, Value};
