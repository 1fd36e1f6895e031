//! In-memory store used by the test suite, with failure injection.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    CourseFocusArea, Enrollment, FocusArea, GradeScaleEntry, NewSelfAssessment, ObservedGrade,
    SelfAssessmentResponse, SelfRating, Student,
};
use crate::scale::RATING_VALUES;
use crate::store::GrowthStore;

/// A self-assessment row as stored.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub focus_area_id: Uuid,
    pub grade_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Observation {
    student_id: Uuid,
    course_focus_area_id: Uuid,
    grade_id: Uuid,
}

#[derive(Default)]
struct Tables {
    students: Vec<Student>,
    focus_areas: Vec<FocusArea>,
    grades: Vec<GradeScaleEntry>,
    enrollments: Vec<Enrollment>,
    assignments: Vec<CourseFocusArea>,
    observations: Vec<Observation>,
    responses: Vec<StoredResponse>,
    failing_reads: HashSet<&'static str>,
    writes_before_failure: Option<usize>,
    delete_after_lookup: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the 6..=10 grade scale
    pub fn with_scale() -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.lock().unwrap();
            tables.grades = RATING_VALUES
                .iter()
                .map(|&value| GradeScaleEntry {
                    id: Uuid::new_v4(),
                    value,
                })
                .collect();
        }
        store
    }

    pub fn add_student(&self, full_name: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().students.push(Student {
            id,
            full_name: full_name.to_string(),
            email: email.to_string(),
        });
        id
    }

    pub fn add_focus_area(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().focus_areas.push(FocusArea {
            id,
            name: name.to_string(),
            description: format!("{name} description"),
        });
        id
    }

    pub fn enroll(&self, student_id: Uuid, course_id: Uuid) {
        self.tables.lock().unwrap().enrollments.push(Enrollment {
            student_id,
            course_id,
        });
    }

    pub fn assign(&self, course_id: Uuid, focus_area_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().assignments.push(CourseFocusArea {
            id,
            course_id,
            focus_area_id,
        });
        id
    }

    pub fn observe(&self, student_id: Uuid, course_focus_area_id: Uuid, value: i32) {
        let mut tables = self.tables.lock().unwrap();
        let grade_id = tables
            .grades
            .iter()
            .find(|g| g.value == value)
            .map(|g| g.id)
            .expect("grade value must be on the scale");
        tables.observations.push(Observation {
            student_id,
            course_focus_area_id,
            grade_id,
        });
    }

    pub fn grade_id(&self, value: i32) -> Uuid {
        self.tables
            .lock()
            .unwrap()
            .grades
            .iter()
            .find(|g| g.value == value)
            .map(|g| g.id)
            .expect("grade value must be on the scale")
    }

    pub fn fail_read(&self, name: &'static str) {
        self.tables.lock().unwrap().failing_reads.insert(name);
    }

    /// Let `count` more writes succeed, then fail every write after.
    pub fn fail_writes_after(&self, count: usize) {
        self.tables.lock().unwrap().writes_before_failure = Some(count);
    }

    /// Every existence check deletes the row it found, as a concurrent
    /// writer would between lookup and update.
    pub fn delete_after_lookup(&self) {
        self.tables.lock().unwrap().delete_after_lookup = true;
    }

    pub fn heal(&self) {
        let mut tables = self.tables.lock().unwrap();
        tables.failing_reads.clear();
        tables.writes_before_failure = None;
        tables.delete_after_lookup = false;
    }

    pub fn responses(&self) -> Vec<StoredResponse> {
        self.tables.lock().unwrap().responses.clone()
    }
}

fn injected(message: String) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(message))
}

impl Tables {
    fn check_read(&self, name: &'static str) -> Result<(), StoreError> {
        if self.failing_reads.contains(name) {
            return Err(injected(format!("{name} read failed")));
        }
        Ok(())
    }

    fn check_write(&mut self) -> Result<(), StoreError> {
        match self.writes_before_failure.as_mut() {
            Some(0) => Err(injected("write rejected".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn value_of(&self, grade_id: Uuid) -> Option<i32> {
        self.grades.iter().find(|g| g.id == grade_id).map(|g| g.value)
    }
}

#[async_trait]
impl GrowthStore for MemoryStore {
    async fn focus_areas(&self) -> Result<Vec<FocusArea>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("focus_areas")?;
        let mut areas = tables.focus_areas.clone();
        areas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(areas)
    }

    async fn grade_scale(&self, values: &[i32]) -> Result<Vec<GradeScaleEntry>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("grade_scale")?;
        Ok(tables
            .grades
            .iter()
            .filter(|g| values.contains(&g.value))
            .copied()
            .collect())
    }

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("enrollments")?;
        Ok(tables
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn course_focus_areas(
        &self,
        course_ids: &[Uuid],
    ) -> Result<Vec<CourseFocusArea>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("course_focus_areas")?;
        Ok(tables
            .assignments
            .iter()
            .filter(|a| course_ids.contains(&a.course_id))
            .cloned()
            .collect())
    }

    async fn graded_observations(
        &self,
        student_id: Uuid,
        assignment_ids: &[Uuid],
    ) -> Result<Vec<ObservedGrade>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("graded_observations")?;
        let mut observed = Vec::new();

        for observation in tables.observations.iter() {
            if observation.student_id != student_id
                || !assignment_ids.contains(&observation.course_focus_area_id)
            {
                continue;
            }
            let assignment = tables
                .assignments
                .iter()
                .find(|a| a.id == observation.course_focus_area_id);
            if let (Some(assignment), Some(value)) =
                (assignment, tables.value_of(observation.grade_id))
            {
                observed.push(ObservedGrade {
                    focus_area_id: assignment.focus_area_id,
                    value,
                });
            }
        }

        Ok(observed)
    }

    async fn find_self_assessment(
        &self,
        student_id: Uuid,
        focus_area_id: Uuid,
    ) -> Result<Option<SelfAssessmentResponse>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_read("self_assessment")?;
        let position = tables
            .responses
            .iter()
            .position(|r| r.student_id == student_id && r.focus_area_id == focus_area_id);
        let Some(position) = position else {
            return Ok(None);
        };

        let row = &tables.responses[position];
        let found = SelfAssessmentResponse {
            id: row.id,
            grade_id: row.grade_id,
            updated_at: row.updated_at,
        };
        if tables.delete_after_lookup {
            tables.responses.remove(position);
        }
        Ok(Some(found))
    }

    async fn insert_self_assessment(
        &self,
        response: &NewSelfAssessment,
    ) -> Result<Uuid, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_write()?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        tables.responses.push(StoredResponse {
            id,
            student_id: response.student_id,
            focus_area_id: response.focus_area_id,
            grade_id: response.grade_id,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_self_assessment(
        &self,
        id: Uuid,
        grade_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_write()?;
        let row = tables
            .responses
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RowMissing(id))?;
        row.grade_id = grade_id;
        row.updated_at = updated_at;
        Ok(())
    }

    async fn self_assessments(&self, student_id: Uuid) -> Result<Vec<SelfRating>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("self_assessments")?;
        Ok(tables
            .responses
            .iter()
            .filter(|r| r.student_id == student_id)
            .filter_map(|r| {
                tables.value_of(r.grade_id).map(|value| SelfRating {
                    focus_area_id: r.focus_area_id,
                    value,
                })
            })
            .collect())
    }

    async fn last_self_assessment_at(
        &self,
        student_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("last_self_assessment_at")?;
        Ok(tables
            .responses
            .iter()
            .filter(|r| r.student_id == student_id)
            .map(|r| r.updated_at)
            .max())
    }

    async fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        let tables = self.tables.lock().unwrap();
        tables.check_read("students")?;
        Ok(tables.students.iter().find(|s| s.email == email).cloned())
    }
}
