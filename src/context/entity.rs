use crate::context::query::DEVICE_ID_PREFIX;
use crate::models::{round_temperature, Measurement};
use chrono::SecondsFormat;
use serde::{Serialize, Serializer};

pub const AIR_TEMPERATURE_TYPE: &str = "AirTemperatureObserved";
pub const WATER_TEMPERATURE_TYPE: &str = "WaterTemperatureObserved";

const NGSI_LD_CONTEXT: [&str; 2] = [
    "https://schema.lab.fiware.org/ld/context",
    "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Air,
    Water,
}

/// A measurement presented as an NGSI-LD entity of one of the two
/// temperature types.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureEntity {
    kind: EntityKind,
    measurement: Measurement,
}

impl TemperatureEntity {
    pub fn air(measurement: Measurement) -> Self {
        Self {
            kind: EntityKind::Air,
            measurement,
        }
    }

    pub fn water(measurement: Measurement) -> Self {
        Self {
            kind: EntityKind::Water,
            measurement,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn entity_type(&self) -> &'static str {
        match self.kind {
            EntityKind::Air => AIR_TEMPERATURE_TYPE,
            EntityKind::Water => WATER_TEMPERATURE_TYPE,
        }
    }

    pub fn id(&self) -> String {
        format!(
            "urn:ngsi-ld:{}:temperature:{}",
            self.entity_type(),
            self.measurement.device
        )
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }
}

#[derive(Serialize)]
struct Property<T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: T,
}

#[derive(Serialize)]
struct DateTimeValue {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "@value")]
    value: String,
}

#[derive(Serialize)]
struct Point {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

#[derive(Serialize)]
struct Relationship {
    #[serde(rename = "type")]
    kind: &'static str,
    object: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NgsiEntity {
    id: String,
    #[serde(rename = "type")]
    entity_type: &'static str,
    date_observed: Property<DateTimeValue>,
    location: Property<Point>,
    temperature: Property<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_device: Option<Relationship>,
    #[serde(rename = "@context")]
    context: [&'static str; 2],
}

impl From<&TemperatureEntity> for NgsiEntity {
    fn from(entity: &TemperatureEntity) -> Self {
        let m = &entity.measurement;
        Self {
            id: entity.id(),
            entity_type: entity.entity_type(),
            date_observed: Property {
                kind: "Property",
                value: DateTimeValue {
                    kind: "DateTime",
                    value: m.observed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                },
            },
            location: Property {
                kind: "GeoProperty",
                value: Point {
                    kind: "Point",
                    coordinates: [m.longitude, m.latitude],
                },
            },
            temperature: Property {
                kind: "Property",
                value: round_temperature(m.temperature as f64),
            },
            ref_device: (!m.device.is_empty()).then(|| Relationship {
                kind: "Relationship",
                object: format!("{DEVICE_ID_PREFIX}{}", m.device),
            }),
            context: NGSI_LD_CONTEXT,
        }
    }
}

impl Serialize for TemperatureEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NgsiEntity::from(self).serialize(serializer)
    }
}
