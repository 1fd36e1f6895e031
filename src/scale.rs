//! The grade scale shared by course grading and self ratings.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::{GrowthError, Result};
use crate::store::GrowthStore;

pub const MIN_SCORE: i32 = 6;
pub const MAX_SCORE: i32 = 10;

/// Score shown for a focus area with no graded observations.
pub const DEFAULT_SCORE: f64 = MIN_SCORE as f64;

pub const RATING_VALUES: [i32; 5] = [6, 7, 8, 9, 10];

pub fn label(value: i32) -> Option<&'static str> {
    match value {
        6 => Some("Not Yet"),
        7 => Some("Launching"),
        8 => Some("Showing"),
        9 => Some("Evolving"),
        10 => Some("Thriving"),
        _ => None,
    }
}

pub fn is_valid(value: i32) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingOption {
    pub value: i32,
    pub label: &'static str,
}

pub fn options() -> Vec<RatingOption> {
    RATING_VALUES
        .iter()
        .filter_map(|&value| label(value).map(|label| RatingOption { value, label }))
        .collect()
}

/// Scale loaded from the store: every allowed value mapped to its grade id.
#[derive(Debug, Clone)]
pub struct GradeScale {
    grade_ids: BTreeMap<i32, Uuid>,
}

impl GradeScale {
    pub async fn load(store: &dyn GrowthStore) -> Result<Self> {
        let rows = store
            .grade_scale(&RATING_VALUES)
            .await
            .map_err(GrowthError::fetch("grade scale"))?;
        debug!(rows = rows.len(), "loaded grade scale");
        Self::from_entries(rows.into_iter().map(|row| (row.value, row.id)))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (i32, Uuid)>) -> Result<Self> {
        let mut grade_ids = BTreeMap::new();

        for (value, id) in entries {
            if !is_valid(value) {
                return Err(GrowthError::Validation(format!(
                    "grade value {value} is outside {MIN_SCORE}..={MAX_SCORE}"
                )));
            }
            if grade_ids.insert(value, id).is_some() {
                return Err(GrowthError::Validation(format!(
                    "grade value {value} appears more than once in the scale"
                )));
            }
        }

        if let Some(missing) = RATING_VALUES.iter().find(|v| !grade_ids.contains_key(v)) {
            return Err(GrowthError::Validation(format!(
                "grade scale has no row for value {missing}"
            )));
        }

        Ok(Self { grade_ids })
    }

    pub fn grade_id(&self, value: i32) -> Option<Uuid> {
        self.grade_ids.get(&value).copied()
    }
}

/// Whole scores print bare, half points keep one decimal.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{score:.1}")
    }
}
