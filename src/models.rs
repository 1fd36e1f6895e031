use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusArea {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

/// One row of the grade scale: a grade id and the score it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeScaleEntry {
    pub id: Uuid,
    pub value: i32,
}

#[derive(Debug, Clone)]
pub struct Enrollment {
    pub student_id: Uuid,
    pub course_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CourseFocusArea {
    pub id: Uuid,
    pub course_id: Uuid,
    pub focus_area_id: Uuid,
}

/// A graded observation joined to its assignment's focus area and the grade's value.
#[derive(Debug, Clone)]
pub struct ObservedGrade {
    pub focus_area_id: Uuid,
    pub value: i32,
}

/// The fields of a stored self-assessment the upsert needs.
#[derive(Debug, Clone)]
pub struct SelfAssessmentResponse {
    pub id: Uuid,
    pub grade_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSelfAssessment {
    pub student_id: Uuid,
    pub focus_area_id: Uuid,
    pub grade_id: Uuid,
}

/// A learner's current self rating joined to the grade's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfRating {
    pub focus_area_id: Uuid,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answer {
    pub focus_area_id: Uuid,
    pub grade_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct FocusAreaScore {
    pub focus_area_id: Uuid,
    pub name: String,
    pub score: f64,
    pub self_rating: Option<i32>,
}
