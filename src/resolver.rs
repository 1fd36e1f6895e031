//! Resolves which focus areas apply to a learner.

use std::collections::BTreeSet;

use tracing::debug;
use uuid::Uuid;

use crate::config::{CuratedArea, SurveyConfig};
use crate::error::{GrowthError, Result};
use crate::models::FocusArea;
use crate::store::GrowthStore;

/// Distinct course ids the learner is enrolled in.
pub async fn enrolled_course_ids(store: &dyn GrowthStore, student_id: Uuid) -> Result<Vec<Uuid>> {
    let enrollments = store
        .enrollments(student_id)
        .await
        .map_err(GrowthError::fetch("enrollments"))?;
    let course_ids: BTreeSet<Uuid> = enrollments
        .into_iter()
        .filter(|e| e.student_id == student_id)
        .map(|e| e.course_id)
        .collect();
    Ok(course_ids.into_iter().collect())
}

/// Every catalog focus area when `student_id` is absent, otherwise the areas
/// targeted by the learner's courses. Both are ordered by name.
pub async fn resolve_focus_areas(
    store: &dyn GrowthStore,
    student_id: Option<Uuid>,
) -> Result<Vec<FocusArea>> {
    let catalog = store
        .focus_areas()
        .await
        .map_err(GrowthError::fetch("focus areas"))?;

    let Some(student_id) = student_id else {
        return Ok(catalog);
    };

    let course_ids = enrolled_course_ids(store, student_id).await?;
    if course_ids.is_empty() {
        debug!(%student_id, "learner has no enrollments");
        return Ok(Vec::new());
    }

    let assignments = store
        .course_focus_areas(&course_ids)
        .await
        .map_err(GrowthError::fetch("course focus areas"))?;
    let targeted: BTreeSet<Uuid> = assignments.into_iter().map(|a| a.focus_area_id).collect();

    let areas: Vec<FocusArea> = catalog
        .into_iter()
        .filter(|area| targeted.contains(&area.id))
        .collect();
    debug!(%student_id, courses = course_ids.len(), areas = areas.len(), "resolved focus areas");
    Ok(areas)
}

/// A catalog entry paired with the curated entry it was matched to.
#[derive(Debug, Clone)]
pub struct CuratedFocusArea {
    pub focus_area: FocusArea,
    pub key: String,
    pub prompt: String,
}

// Prefix matching absorbs catalog renames such as
// "Creative Problem-Solving and Design Thinking". Drop it once the catalog
// carries stable keys.
fn loosely_matches(catalog_name: &str, curated_name: &str) -> bool {
    catalog_name.starts_with(curated_name) || curated_name.starts_with(catalog_name)
}

fn find_match<'a>(
    catalog: &'a [FocusArea],
    curated: &CuratedArea,
    taken: &BTreeSet<Uuid>,
) -> Option<&'a FocusArea> {
    let available = || catalog.iter().filter(|area| !taken.contains(&area.id));
    available()
        .find(|area| area.name == curated.name)
        .or_else(|| available().find(|area| loosely_matches(&area.name, &curated.name)))
}

/// Filters the catalog to the curated subset in canonical order. Each catalog
/// entry is used at most once; curated names with no match are skipped.
pub fn curated_focus_areas(catalog: &[FocusArea], config: &SurveyConfig) -> Vec<CuratedFocusArea> {
    let mut taken = BTreeSet::new();
    let mut selected = Vec::new();

    for curated in config.ordered() {
        match find_match(catalog, curated, &taken) {
            Some(area) => {
                taken.insert(area.id);
                selected.push(CuratedFocusArea {
                    focus_area: area.clone(),
                    key: curated.key.clone(),
                    prompt: curated.prompt.clone(),
                });
            }
            None => debug!(name = %curated.name, "curated focus area not in catalog"),
        }
    }

    selected
}
