use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GrowthError, Result, StoreError};
use crate::models::{Answer, NewSelfAssessment};
use crate::store::GrowthStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
}

enum Upserted {
    Inserted,
    Updated,
}

async fn upsert_one(
    store: &dyn GrowthStore,
    student_id: Uuid,
    answer: &Answer,
) -> std::result::Result<Upserted, StoreError> {
    match store
        .find_self_assessment(student_id, answer.focus_area_id)
        .await?
    {
        Some(existing) => {
            debug!(
                response_id = %existing.id,
                previous_grade_id = %existing.grade_id,
                last_saved = %existing.updated_at,
                "updating self-assessment"
            );
            store
                .update_self_assessment(existing.id, answer.grade_id, Utc::now())
                .await?;
            Ok(Upserted::Updated)
        }
        None => {
            store
                .insert_self_assessment(&NewSelfAssessment {
                    student_id,
                    focus_area_id: answer.focus_area_id,
                    grade_id: answer.grade_id,
                })
                .await?;
            Ok(Upserted::Inserted)
        }
    }
}

/// Create-or-update one self-assessment row per answer, in order. Stops at the
/// first failure; answers already applied stay committed, so the whole batch
/// can be retried.
pub async fn save_responses(
    store: &dyn GrowthStore,
    student_id: Uuid,
    answers: &[Answer],
) -> Result<SaveSummary> {
    let mut summary = SaveSummary::default();

    for (applied, answer) in answers.iter().enumerate() {
        match upsert_one(store, student_id, answer).await {
            Ok(Upserted::Inserted) => summary.inserted += 1,
            Ok(Upserted::Updated) => summary.updated += 1,
            Err(source) => {
                warn!(%student_id, applied, total = answers.len(), error = %source, "self-assessment save stopped");
                return Err(GrowthError::Persistence {
                    applied,
                    total: answers.len(),
                    source,
                });
            }
        }
        debug!(%student_id, focus_area_id = %answer.focus_area_id, "saved self-assessment answer");
    }

    info!(
        %student_id,
        inserted = summary.inserted,
        updated = summary.updated,
        "self-assessment saved"
    );
    Ok(summary)
}
