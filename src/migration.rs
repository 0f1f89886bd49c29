//! One-shot move of legacy `temperatures` rows into the current table.
//!
//! Must finish before ingestion or queries start: it deletes legacy rows by
//! id while inserting into the current table.

use crate::error::AppError;
use crate::repositories::MeasurementStore;
use tracing::{debug, info};

pub const MIGRATION_BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: u64,
    /// Legacy rows dropped because the current table already held the same
    /// device and observation time.
    pub discarded: u64,
}

/// Moves every legacy row forward. A row is deleted once its insert has
/// either succeeded or hit a duplicate; any other failure aborts with the
/// row left in place, so a later run picks up where this one stopped.
pub async fn migrate(store: &dyn MeasurementStore) -> Result<MigrationReport, AppError> {
    let mut report = MigrationReport::default();

    loop {
        let batch = store.legacy_batch(MIGRATION_BATCH_SIZE).await?;
        if batch.is_empty() {
            break;
        }

        for legacy in batch {
            match store.insert(legacy.to_current()).await {
                Ok(_) => report.migrated += 1,
                Err(e) if e.is_conflict() => {
                    debug!(legacy_id = legacy.id, device = %legacy.device, "discarding duplicate legacy row");
                    report.discarded += 1;
                }
                Err(e) => return Err(e),
            }
            store.delete_legacy(legacy.id).await?;
        }

        info!(
            migrated = report.migrated,
            discarded = report.discarded,
            "legacy migration progress"
        );
    }

    if report.migrated > 0 || report.discarded > 0 {
        info!(
            migrated = report.migrated,
            discarded = report.discarded,
            "legacy migration complete"
        );
    }

    Ok(report)
}
