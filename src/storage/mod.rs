pub mod memory;

pub use memory::{GraphTransaction, InMemoryGraph, RelationshipRecord};
