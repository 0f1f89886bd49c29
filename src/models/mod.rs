pub mod measurement;

pub use measurement::{
    legacy_timestamp_sentinel, round_temperature, LegacyMeasurement, Measurement, NewMeasurement,
};
