//! Read/write contract the pipeline needs from the backing store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    CourseFocusArea, Enrollment, FocusArea, GradeScaleEntry, NewSelfAssessment, ObservedGrade,
    SelfAssessmentResponse, SelfRating, Student,
};

#[async_trait]
pub trait GrowthStore: Send + Sync {
    /// Full focus area catalog, ordered by name ascending
    async fn focus_areas(&self) -> Result<Vec<FocusArea>, StoreError>;

    /// Grade rows whose numeric value is one of `values`
    async fn grade_scale(&self, values: &[i32]) -> Result<Vec<GradeScaleEntry>, StoreError>;

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>, StoreError>;

    async fn course_focus_areas(
        &self,
        course_ids: &[Uuid],
    ) -> Result<Vec<CourseFocusArea>, StoreError>;

    /// A learner's observations on the given assignments, joined to focus area and value
    async fn graded_observations(
        &self,
        student_id: Uuid,
        assignment_ids: &[Uuid],
    ) -> Result<Vec<ObservedGrade>, StoreError>;

    /// At most one response per (student, focus area)
    async fn find_self_assessment(
        &self,
        student_id: Uuid,
        focus_area_id: Uuid,
    ) -> Result<Option<SelfAssessmentResponse>, StoreError>;

    async fn insert_self_assessment(&self, response: &NewSelfAssessment)
        -> Result<Uuid, StoreError>;

    async fn update_self_assessment(
        &self,
        id: Uuid,
        grade_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn self_assessments(&self, student_id: Uuid) -> Result<Vec<SelfRating>, StoreError>;

    /// Most recent save time across a learner's responses
    async fn last_self_assessment_at(
        &self,
        student_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError>;
}
