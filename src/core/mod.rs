pub mod error;
pub mod types;
pub mod value;

pub use error::{CompositeFailure, FulltextError, Result};
pub use types::{EntityId, EntityKind, EntitySnapshot, PropertyMap};
pub use value::Value;
