use crate::context::{EntityQuery, GeoFilter, TemporalRange};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// NGSI-LD style query parameters of `GET /ngsi-ld/v1/entities`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesParams {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub attrs: Option<String>,
    /// Only `refDevice=="<id>"` is understood.
    pub q: Option<String>,
    /// `near;maxDistance==<meters>` or `within`
    pub georel: Option<String>,
    pub geometry: Option<String>,
    pub coordinates: Option<String>,
    /// `after`, `before` or `between`
    pub timerel: Option<String>,
    pub time_at: Option<String>,
    pub end_time_at: Option<String>,
    pub limit: Option<u64>,
}

impl TryFrom<EntitiesParams> for EntityQuery {
    type Error = AppError;

    fn try_from(params: EntitiesParams) -> Result<Self, Self::Error> {
        Ok(EntityQuery {
            entity_types: split_list(params.entity_type.as_deref()),
            entity_attributes: split_list(params.attrs.as_deref()),
            device_reference: params.q.as_deref().map(parse_device_ref).transpose()?,
            temporal_range: parse_temporal(
                params.timerel.as_deref(),
                params.time_at.as_deref(),
                params.end_time_at.as_deref(),
            )?,
            geo_filter: parse_geo(
                params.georel.as_deref(),
                params.geometry.as_deref(),
                params.coordinates.as_deref(),
            )?,
            result_limit: params.limit.unwrap_or(0),
        })
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_device_ref(q: &str) -> Result<String, AppError> {
    let value = q
        .trim()
        .strip_prefix("refDevice==")
        .ok_or_else(|| AppError::Validation(format!("unsupported q expression: {q}")))?;
    Ok(value.trim_matches('"').to_string())
}

fn parse_time(name: &str, value: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    let value = value.ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Validation(format!("invalid {name} {value:?}: {e}")))
}

fn parse_temporal(
    timerel: Option<&str>,
    time_at: Option<&str>,
    end_time_at: Option<&str>,
) -> Result<Option<TemporalRange>, AppError> {
    let Some(timerel) = timerel else {
        return Ok(None);
    };

    let range = match timerel {
        "after" => TemporalRange {
            from: Some(parse_time("timeAt", time_at)?),
            to: None,
        },
        "before" => TemporalRange {
            from: None,
            to: Some(parse_time("timeAt", time_at)?),
        },
        "between" => TemporalRange {
            from: Some(parse_time("timeAt", time_at)?),
            to: Some(parse_time("endTimeAt", end_time_at)?),
        },
        other => {
            return Err(AppError::Validation(format!(
                "unsupported timerel {other:?}"
            )))
        }
    };
    Ok(Some(range))
}

fn parse_geo(
    georel: Option<&str>,
    geometry: Option<&str>,
    coordinates: Option<&str>,
) -> Result<Option<GeoFilter>, AppError> {
    let Some(georel) = georel else {
        return Ok(None);
    };

    let mut parts = georel.split(';').map(str::trim);
    let relation = parts.next().unwrap_or_default();

    match relation {
        "near" => {
            let max_distance_m = parts
                .find_map(|p| p.strip_prefix("maxDistance=="))
                .ok_or_else(|| AppError::Validation("near requires maxDistance".into()))?
                .parse::<f64>()
                .map_err(|e| AppError::Validation(format!("invalid maxDistance: {e}")))?;
            expect_geometry(geometry, "Point")?;
            let [longitude, latitude]: [f64; 2] = parse_coordinates(coordinates)?;
            Ok(Some(GeoFilter::NearPoint {
                latitude,
                longitude,
                max_distance_m,
            }))
        }
        "within" => {
            expect_geometry(geometry, "Polygon")?;
            let rings: Vec<Vec<[f64; 2]>> = parse_coordinates(coordinates)?;
            let points: Vec<[f64; 2]> = rings.into_iter().flatten().collect();
            if points.is_empty() {
                return Err(AppError::Validation("within requires a non-empty polygon".into()));
            }
            let (mut lat0, mut lon0, mut lat1, mut lon1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
            for [lon, lat] in points {
                lat0 = lat0.min(lat);
                lon0 = lon0.min(lon);
                lat1 = lat1.max(lat);
                lon1 = lon1.max(lon);
            }
            Ok(Some(GeoFilter::WithinRect {
                lat0,
                lon0,
                lat1,
                lon1,
            }))
        }
        other => Ok(Some(GeoFilter::Other(other.to_string()))),
    }
}

fn expect_geometry(geometry: Option<&str>, expected: &str) -> Result<(), AppError> {
    match geometry {
        Some(g) if g == expected => Ok(()),
        Some(g) => Err(AppError::Validation(format!(
            "geometry {g:?} does not match relation, expected {expected}"
        ))),
        None => Err(AppError::Validation("geometry is required".into())),
    }
}

fn parse_coordinates<T: serde::de::DeserializeOwned>(coordinates: Option<&str>) -> Result<T, AppError> {
    let raw = coordinates.ok_or_else(|| AppError::Validation("coordinates are required".into()))?;
    serde_json::from_str(raw).map_err(|e| AppError::Validation(format!("invalid coordinates: {e}")))
}
