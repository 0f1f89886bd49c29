pub mod entity;
pub mod query;
pub mod source;

pub use entity::{EntityKind, TemperatureEntity, AIR_TEMPERATURE_TYPE, WATER_TEMPERATURE_TYPE};
pub use query::{translate, EntityQuery, GeoFilter, ProjectedTypes, TemporalRange, Translation};
pub use source::ContextSource;
