// Event value objects and the schema they are normalized against

pub mod event;
pub mod normalize;
pub mod schema;

pub use event::{Cover, Event};
pub use normalize::{normalize, Normalized, SchemaWarning};
pub use schema::{FieldKind, Schema, COVER_SCHEMA, EVENT_SCHEMA};
