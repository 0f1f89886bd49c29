use crate::context::entity::{TemperatureEntity, AIR_TEMPERATURE_TYPE, WATER_TEMPERATURE_TYPE};
use crate::error::AppError;
use crate::geo::{self, BoundingBox};
use crate::models::Measurement;
use crate::repositories::MeasurementQuery;
use chrono::{DateTime, Duration, Utc};

/// Prefix of fully qualified device entity ids.
pub const DEVICE_ID_PREFIX: &str = "urn:ngsi-ld:Device:";

pub const TEMPERATURE_ATTRIBUTE: &str = "temperature";

/// Rows returned when the caller does not ask for a specific limit.
pub const DEFAULT_RESULT_LIMIT: u64 = 100;

/// Look-back window used when a query has no temporal constraint.
pub fn default_time_window() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoFilter {
    NearPoint {
        latitude: f64,
        longitude: f64,
        max_distance_m: f64,
    },
    WithinRect {
        lat0: f64,
        lon0: f64,
        lat1: f64,
        lon1: f64,
    },
    /// Any relation this service cannot answer, e.g. "intersects".
    Other(String),
}

/// A caller's request for temperature entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    pub entity_types: Vec<String>,
    pub entity_attributes: Vec<String>,
    pub device_reference: Option<String>,
    pub temporal_range: Option<TemporalRange>,
    pub geo_filter: Option<GeoFilter>,
    /// 0 means [`DEFAULT_RESULT_LIMIT`].
    pub result_limit: u64,
}

impl EntityQuery {
    pub fn for_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_types: types.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn for_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_attributes: attributes.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Which output kinds a query asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectedTypes {
    pub air: bool,
    pub water: bool,
}

impl ProjectedTypes {
    /// The store holds both kinds in one table, so the split happens here.
    pub fn project(&self, measurement: Measurement) -> Option<TemperatureEntity> {
        match (measurement.is_water, self.water, self.air) {
            (true, true, _) => Some(TemperatureEntity::water(measurement)),
            (false, _, true) => Some(TemperatureEntity::air(measurement)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub query: MeasurementQuery,
    pub projection: ProjectedTypes,
}

pub fn translate(query: &EntityQuery, now: DateTime<Utc>) -> Result<Translation, AppError> {
    let projection = resolve_types(query)?;

    let device = query
        .device_reference
        .as_deref()
        .map(|d| d.strip_prefix(DEVICE_ID_PREFIX).unwrap_or(d))
        .filter(|d| !d.is_empty())
        .map(String::from);

    let (from, to) = match query.temporal_range {
        Some(TemporalRange { from, to }) if from.is_some() || to.is_some() => (from, to),
        _ => (Some(now - default_time_window()), Some(now)),
    };

    let within = query.geo_filter.as_ref().map(resolve_geo).transpose()?;

    let limit = if query.result_limit == 0 {
        DEFAULT_RESULT_LIMIT
    } else {
        query.result_limit
    };

    Ok(Translation {
        query: MeasurementQuery {
            device,
            from,
            to,
            within,
            limit,
        },
        projection,
    })
}

fn resolve_types(query: &EntityQuery) -> Result<ProjectedTypes, AppError> {
    let mut types = ProjectedTypes::default();
    for name in &query.entity_types {
        match name.as_str() {
            AIR_TEMPERATURE_TYPE => types.air = true,
            WATER_TEMPERATURE_TYPE => types.water = true,
            _ => {}
        }
    }

    if !types.air && !types.water {
        // no provided type requested; an attribute list may still select us
        if !query
            .entity_attributes
            .iter()
            .any(|a| a == TEMPERATURE_ATTRIBUTE)
        {
            return Err(AppError::Validation(
                "query does not specify a type that is provided by this service".into(),
            ));
        }
        types.air = true;
        types.water = true;
    }

    Ok(types)
}

fn resolve_geo(filter: &GeoFilter) -> Result<BoundingBox, AppError> {
    match filter {
        GeoFilter::NearPoint {
            latitude,
            longitude,
            max_distance_m,
        } => geo::approximate(*latitude, *longitude, *max_distance_m),
        GeoFilter::WithinRect {
            lat0,
            lon0,
            lat1,
            lon1,
        } => Ok(BoundingBox::from_corners(*lat0, *lon0, *lat1, *lon1)),
        GeoFilter::Other(relation) => Err(AppError::UnsupportedRelation(relation.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn measurement(is_water: bool) -> Measurement {
        Measurement {
            id: 1,
            device: "d".into(),
            latitude: 0.0,
            longitude: 0.0,
            temperature: 1.0,
            is_water,
            observed_at: now(),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_type_names_select_kinds() {
        let t = translate(&EntityQuery::for_types([AIR_TEMPERATURE_TYPE]), now()).unwrap();
        assert_eq!(t.projection, ProjectedTypes { air: true, water: false });

        let t = translate(&EntityQuery::for_types([WATER_TEMPERATURE_TYPE]), now()).unwrap();
        assert_eq!(t.projection, ProjectedTypes { air: false, water: true });

        let t = translate(
            &EntityQuery::for_types([WATER_TEMPERATURE_TYPE, AIR_TEMPERATURE_TYPE]),
            now(),
        )
        .unwrap();
        assert_eq!(t.projection, ProjectedTypes { air: true, water: true });
    }

    #[test]
    fn test_temperature_attribute_selects_both_kinds() {
        let t = translate(&EntityQuery::for_attributes(["temperature"]), now()).unwrap();
        assert_eq!(t.projection, ProjectedTypes { air: true, water: true });
    }

    #[test]
    fn test_unknown_type_without_attribute_fails() {
        for q in [
            EntityQuery::for_attributes(["irrelevant"]),
            EntityQuery::for_types(["UnknownType"]),
            EntityQuery::default(),
        ] {
            let err = translate(&q, now()).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn test_default_window_and_limit() {
        let t = translate(&EntityQuery::for_attributes(["temperature"]), now()).unwrap();
        assert_eq!(t.query.from, Some(now() - Duration::hours(24)));
        assert_eq!(t.query.to, Some(now()));
        assert_eq!(t.query.limit, DEFAULT_RESULT_LIMIT);
        assert_eq!(t.query.device, None);
        assert_eq!(t.query.within, None);
    }

    #[test]
    fn test_open_ended_range_is_kept() {
        let from = now() - Duration::days(30);
        let q = EntityQuery {
            temporal_range: Some(TemporalRange { from: Some(from), to: None }),
            result_limit: 5,
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        let t = translate(&q, now()).unwrap();
        assert_eq!(t.query.from, Some(from));
        assert_eq!(t.query.to, None);
        assert_eq!(t.query.limit, 5);
    }

    #[test]
    fn test_empty_range_falls_back_to_default_window() {
        let q = EntityQuery {
            temporal_range: Some(TemporalRange::default()),
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        let t = translate(&q, now()).unwrap();
        assert_eq!(t.query.from, Some(now() - Duration::hours(24)));
    }

    #[test]
    fn test_device_prefix_is_stripped() {
        let q = EntityQuery {
            device_reference: Some("urn:ngsi-ld:Device:sk-elt-temp-02".into()),
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        let t = translate(&q, now()).unwrap();
        assert_eq!(t.query.device.as_deref(), Some("sk-elt-temp-02"));

        let q = EntityQuery {
            device_reference: Some("bare-id".into()),
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        assert_eq!(translate(&q, now()).unwrap().query.device.as_deref(), Some("bare-id"));
    }

    #[test]
    fn test_near_point_becomes_rectangle() {
        let q = EntityQuery {
            geo_filter: Some(GeoFilter::NearPoint {
                latitude: 62.39,
                longitude: 17.30,
                max_distance_m: 1000.0,
            }),
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        let bb = translate(&q, now()).unwrap().query.within.unwrap();
        assert_eq!(bb, geo::approximate(62.39, 17.30, 1000.0).unwrap());
    }

    #[test]
    fn test_within_rect_passes_corners() {
        let q = EntityQuery {
            geo_filter: Some(GeoFilter::WithinRect {
                lat0: 62.5,
                lon0: 17.1,
                lat1: 62.3,
                lon1: 17.4,
            }),
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        let bb = translate(&q, now()).unwrap().query.within.unwrap();
        assert_eq!(bb.north_west(), (62.5, 17.1));
        assert_eq!(bb.south_east(), (62.3, 17.4));
    }

    #[test]
    fn test_other_relation_is_unsupported() {
        let q = EntityQuery {
            geo_filter: Some(GeoFilter::Other("intersects".into())),
            ..EntityQuery::for_types([AIR_TEMPERATURE_TYPE])
        };
        let err = translate(&q, now()).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedRelation(ref r) if r == "intersects"));
    }

    #[test]
    fn test_projection_splits_on_water_flag() {
        let air_only = ProjectedTypes { air: true, water: false };
        assert!(air_only.project(measurement(false)).is_some());
        assert!(air_only.project(measurement(true)).is_none());

        let water_only = ProjectedTypes { air: false, water: true };
        assert!(water_only.project(measurement(false)).is_none());
        let e = water_only.project(measurement(true)).unwrap();
        assert_eq!(e.entity_type(), WATER_TEMPERATURE_TYPE);
    }
}
