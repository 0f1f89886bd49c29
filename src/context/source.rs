use crate::context::entity::{TemperatureEntity, AIR_TEMPERATURE_TYPE, WATER_TEMPERATURE_TYPE};
use crate::context::query::{translate, EntityQuery, TEMPERATURE_ATTRIBUTE};
use crate::error::AppError;
use crate::repositories::MeasurementStore;
use chrono::Utc;
use std::sync::Arc;

/// Answers entity queries from a [`MeasurementStore`].
#[derive(Clone)]
pub struct ContextSource {
    store: Arc<dyn MeasurementStore>,
}

impl ContextSource {
    pub fn new(store: Arc<dyn MeasurementStore>) -> Self {
        Self { store }
    }

    pub fn provides_type(&self, type_name: &str) -> bool {
        type_name == AIR_TEMPERATURE_TYPE || type_name == WATER_TEMPERATURE_TYPE
    }

    pub fn provides_attribute(&self, attribute: &str) -> bool {
        attribute == TEMPERATURE_ATTRIBUTE
    }

    /// True for ids of the form `urn:ngsi-ld:<Type>:...` with one of our types.
    pub fn provides_entities_with_matching_id(&self, entity_id: &str) -> bool {
        [AIR_TEMPERATURE_TYPE, WATER_TEMPERATURE_TYPE].iter().any(|t| {
            entity_id
                .strip_prefix("urn:ngsi-ld:")
                .and_then(|rest| rest.strip_prefix(*t))
                .is_some_and(|rest| rest.starts_with(':'))
        })
    }

    /// Calls `callback` once per matching entity, oldest first. The first
    /// error returned by `callback` stops the iteration and is returned.
    pub async fn get_entities<F>(
        &self,
        query: Option<&EntityQuery>,
        mut callback: F,
    ) -> Result<(), AppError>
    where
        F: FnMut(TemperatureEntity) -> Result<(), AppError>,
    {
        let query =
            query.ok_or_else(|| AppError::Validation("GetEntities: query may not be nil".into()))?;

        let translation = translate(query, Utc::now())?;
        let measurements = self.store.query(&translation.query).await?;

        for measurement in measurements {
            if let Some(entity) = translation.projection.project(measurement) {
                callback(entity)?;
            }
        }

        Ok(())
    }

    /// Convenience wrapper collecting every entity.
    pub async fn collect_entities(
        &self,
        query: &EntityQuery,
    ) -> Result<Vec<TemperatureEntity>, AppError> {
        let mut entities = Vec::new();
        self.get_entities(Some(query), |e| {
            entities.push(e);
            Ok(())
        })
        .await?;
        Ok(entities)
    }
}
