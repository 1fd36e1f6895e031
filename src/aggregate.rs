use std::collections::{BTreeSet, HashMap};

use tracing::debug;
use uuid::Uuid;

use crate::error::{GrowthError, Result};
use crate::models::FocusArea;
use crate::resolver;
use crate::scale::DEFAULT_SCORE;
use crate::store::GrowthStore;

/// Median of the values; even-length sets average the two middle values.
pub fn median(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 1 {
        Some(sorted[mid] as f64)
    } else {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    }
}

/// One representative score per requested focus area. Areas without any
/// observations score [`DEFAULT_SCORE`]. Any failed read aborts the whole call.
pub async fn aggregate_scores(
    store: &dyn GrowthStore,
    student_id: Uuid,
    focus_areas: &[FocusArea],
) -> Result<HashMap<Uuid, f64>> {
    let targets: BTreeSet<Uuid> = focus_areas.iter().map(|area| area.id).collect();
    let mut grouped: HashMap<Uuid, Vec<i32>> = HashMap::new();

    let course_ids = resolver::enrolled_course_ids(store, student_id).await?;

    if !course_ids.is_empty() && !targets.is_empty() {
        let assignment_ids: Vec<Uuid> = store
            .course_focus_areas(&course_ids)
            .await
            .map_err(GrowthError::fetch("course focus areas"))?
            .into_iter()
            .filter(|assignment| {
                course_ids.contains(&assignment.course_id)
                    && targets.contains(&assignment.focus_area_id)
            })
            .map(|assignment| assignment.id)
            .collect();

        if !assignment_ids.is_empty() {
            let observations = store
                .graded_observations(student_id, &assignment_ids)
                .await
                .map_err(GrowthError::fetch("graded observations"))?;

            for observation in observations {
                if targets.contains(&observation.focus_area_id) {
                    grouped
                        .entry(observation.focus_area_id)
                        .or_default()
                        .push(observation.value);
                }
            }
        }
    }

    let scores: HashMap<Uuid, f64> = targets
        .iter()
        .map(|id| {
            let score = grouped
                .get(id)
                .and_then(|values| median(values))
                .unwrap_or(DEFAULT_SCORE);
            (*id, score)
        })
        .collect();

    debug!(
        %student_id,
        areas = scores.len(),
        observed = grouped.len(),
        "aggregated focus area scores"
    );
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::resolver::resolve_focus_areas;

    #[test]
    fn median_of_odd_set_is_middle_value() {
        assert_eq!(median(&[9, 7, 8]), Some(8.0));
        assert_eq!(median(&[10]), Some(10.0));
    }

    #[test]
    fn median_of_even_set_averages_middle_pair() {
        assert_eq!(median(&[7, 8, 9, 10]), Some(8.5));
        assert_eq!(median(&[10, 8]), Some(9.0));
    }

    #[test]
    fn median_of_empty_set_is_none() {
        assert_eq!(median(&[]), None);
    }

    #[tokio::test]
    async fn two_courses_on_one_area_take_the_median() {
        let store = MemoryStore::with_scale();
        let student = store.add_student("Avery Lee", "avery@example.com");
        let critical = store.add_focus_area("Critical Thinking");
        let teamwork = store.add_focus_area("Teamwork and Leadership");
        let unassigned = store.add_focus_area("Self-Direction");

        let (course_a, course_b) = (Uuid::new_v4(), Uuid::new_v4());
        store.enroll(student, course_a);
        store.enroll(student, course_b);
        let on_a = store.assign(course_a, critical);
        let on_b = store.assign(course_b, critical);
        store.assign(course_b, teamwork);
        store.observe(student, on_a, 8);
        store.observe(student, on_b, 10);

        let areas = resolve_focus_areas(&store, None).await.unwrap();
        let scores = aggregate_scores(&store, student, &areas).await.unwrap();

        assert_eq!(scores[&critical], 9.0);
        assert_eq!(scores[&teamwork], DEFAULT_SCORE);
        assert_eq!(scores[&unassigned], DEFAULT_SCORE);
    }

    #[tokio::test]
    async fn output_covers_exactly_the_requested_areas() {
        let store = MemoryStore::with_scale();
        let student = store.add_student("Jules Moreno", "jules@example.com");
        let critical = store.add_focus_area("Critical Thinking");
        store.add_focus_area("Self-Direction");
        let course = Uuid::new_v4();
        store.enroll(student, course);
        let assignment = store.assign(course, critical);
        store.observe(student, assignment, 7);

        let requested: Vec<FocusArea> = resolve_focus_areas(&store, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|area| area.name == "Self-Direction")
            .collect();
        let scores = aggregate_scores(&store, student, &requested).await.unwrap();

        let keys: BTreeSet<Uuid> = scores.keys().copied().collect();
        let expected: BTreeSet<Uuid> = requested.iter().map(|a| a.id).collect();
        assert_eq!(keys, expected);
        assert!(scores.values().all(|&s| (6.0..=10.0).contains(&s)));
    }

    #[tokio::test]
    async fn other_learners_observations_are_ignored() {
        let store = MemoryStore::with_scale();
        let student = store.add_student("Avery Lee", "avery@example.com");
        let peer = store.add_student("Kiara Patel", "kiara@example.com");
        let critical = store.add_focus_area("Critical Thinking");
        let course = Uuid::new_v4();
        store.enroll(student, course);
        store.enroll(peer, course);
        let assignment = store.assign(course, critical);
        store.observe(peer, assignment, 10);

        let areas = resolve_focus_areas(&store, Some(student)).await.unwrap();
        let scores = aggregate_scores(&store, student, &areas).await.unwrap();
        assert_eq!(scores[&critical], DEFAULT_SCORE);
    }

    #[tokio::test]
    async fn failed_observation_read_returns_no_partial_map() {
        let store = MemoryStore::with_scale();
        let student = store.add_student("Avery Lee", "avery@example.com");
        let critical = store.add_focus_area("Critical Thinking");
        let course = Uuid::new_v4();
        store.enroll(student, course);
        let assignment = store.assign(course, critical);
        store.observe(student, assignment, 9);
        store.fail_read("graded_observations");

        let areas = resolve_focus_areas(&store, Some(student)).await.unwrap();
        let err = aggregate_scores(&store, student, &areas).await.unwrap_err();
        assert!(matches!(err, GrowthError::Fetch { .. }));
    }
}
