use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    CourseFocusArea, Enrollment, FocusArea, GradeScaleEntry, NewSelfAssessment, ObservedGrade,
    SelfAssessmentResponse, SelfRating, Student,
};
use crate::scale::RATING_VALUES;
use crate::store::GrowthStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store over the `growth_pulse` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl GrowthStore for PgStore {
    async fn focus_areas(&self) -> Result<Vec<FocusArea>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, description FROM growth_pulse.focus_areas ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FocusArea {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
            })
            .collect())
    }

    async fn grade_scale(&self, values: &[i32]) -> Result<Vec<GradeScaleEntry>, StoreError> {
        let rows = sqlx::query("SELECT id, value FROM growth_pulse.grade_scale WHERE value = ANY($1)")
            .bind(values)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| GradeScaleEntry {
                id: row.get("id"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>, StoreError> {
        let rows = sqlx::query(
            "SELECT student_id, course_id FROM growth_pulse.enrollments WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Enrollment {
                student_id: row.get("student_id"),
                course_id: row.get("course_id"),
            })
            .collect())
    }

    async fn course_focus_areas(
        &self,
        course_ids: &[Uuid],
    ) -> Result<Vec<CourseFocusArea>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, course_id, focus_area_id FROM growth_pulse.course_focus_areas \
             WHERE course_id = ANY($1)",
        )
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CourseFocusArea {
                id: row.get("id"),
                course_id: row.get("course_id"),
                focus_area_id: row.get("focus_area_id"),
            })
            .collect())
    }

    async fn graded_observations(
        &self,
        student_id: Uuid,
        assignment_ids: &[Uuid],
    ) -> Result<Vec<ObservedGrade>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT cfa.focus_area_id, g.value
            FROM growth_pulse.graded_observations o
            JOIN growth_pulse.course_focus_areas cfa ON cfa.id = o.course_focus_area_id
            JOIN growth_pulse.grade_scale g ON g.id = o.grade_id
            WHERE o.student_id = $1 AND o.course_focus_area_id = ANY($2)
            "#,
        )
        .bind(student_id)
        .bind(assignment_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ObservedGrade {
                focus_area_id: row.get("focus_area_id"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn find_self_assessment(
        &self,
        student_id: Uuid,
        focus_area_id: Uuid,
    ) -> Result<Option<SelfAssessmentResponse>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, grade_id, updated_at
            FROM growth_pulse.self_assessments
            WHERE student_id = $1 AND focus_area_id = $2
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(focus_area_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| SelfAssessmentResponse {
            id: row.get("id"),
            grade_id: row.get("grade_id"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn insert_self_assessment(
        &self,
        response: &NewSelfAssessment,
    ) -> Result<Uuid, StoreError> {
        // A concurrent first save may have inserted since the existence check.
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO growth_pulse.self_assessments (id, student_id, focus_area_id, grade_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id, focus_area_id) DO UPDATE
            SET grade_id = EXCLUDED.grade_id, updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(response.student_id)
        .bind(response.focus_area_id)
        .bind(response.grade_id)
        .fetch_one(&self.pool)
        .await?
        .get("id");
        Ok(id)
    }

    async fn update_self_assessment(
        &self,
        id: Uuid,
        grade_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE growth_pulse.self_assessments SET grade_id = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(grade_id)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing(id));
        }
        Ok(())
    }

    async fn self_assessments(&self, student_id: Uuid) -> Result<Vec<SelfRating>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT sa.focus_area_id, g.value
            FROM growth_pulse.self_assessments sa
            JOIN growth_pulse.grade_scale g ON g.id = sa.grade_id
            WHERE sa.student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SelfRating {
                focus_area_id: row.get("focus_area_id"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn last_self_assessment_at(
        &self,
        student_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let last: Option<DateTime<Utc>> = sqlx::query(
            "SELECT max(updated_at) AS last FROM growth_pulse.self_assessments WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?
        .get("last");
        Ok(last)
    }

    async fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        let row = sqlx::query("SELECT id, full_name, email FROM growth_pulse.students WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Student {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
        }))
    }
}

/// A missing name keeps an existing learner's name, or falls back to the email
/// for a new learner.
async fn upsert_student(
    pool: &PgPool,
    full_name: Option<&str>,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO growth_pulse.students (id, full_name, email)
        VALUES ($1, COALESCE($2, $3), $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = COALESCE($2, growth_pulse.students.full_name)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get::<Uuid, _>("id");
    Ok(id)
}

async fn upsert_focus_area(pool: &PgPool, name: &str, description: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO growth_pulse.focus_areas (id, name, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE
        SET description = EXCLUDED.description, updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?
    .get::<Uuid, _>("id");
    Ok(id)
}

async fn upsert_course(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO growth_pulse.courses (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?
    .get::<Uuid, _>("id");
    Ok(id)
}

async fn ensure_enrollment(pool: &PgPool, student_id: Uuid, course_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO growth_pulse.enrollments (id, student_id, course_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(course_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn ensure_assignment(
    pool: &PgPool,
    course_id: Uuid,
    focus_area_id: Uuid,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO growth_pulse.course_focus_areas (id, course_id, focus_area_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (course_id, focus_area_id) DO UPDATE SET course_id = EXCLUDED.course_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(course_id)
    .bind(focus_area_id)
    .fetch_one(pool)
    .await?
    .get::<Uuid, _>("id");
    Ok(id)
}

async fn grade_id_for(pool: &PgPool, value: i32) -> anyhow::Result<Uuid> {
    let id = sqlx::query("SELECT id FROM growth_pulse.grade_scale WHERE value = $1")
        .bind(value)
        .fetch_optional(pool)
        .await?
        .map(|row| row.get::<Uuid, _>("id"))
        .with_context(|| format!("grade {value} is not on the scale"))?;
    Ok(id)
}

/// Returns true when a new observation row was written.
async fn record_observation(
    pool: &PgPool,
    student_id: Uuid,
    assignment_id: Uuid,
    grade_id: Uuid,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO growth_pulse.graded_observations
        (id, student_id, course_focus_area_id, grade_id, source_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(assignment_id)
    .bind(grade_id)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for value in RATING_VALUES {
        sqlx::query(
            "INSERT INTO growth_pulse.grade_scale (id, value) VALUES ($1, $2) \
             ON CONFLICT (value) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(value)
        .execute(pool)
        .await?;
    }

    let focus_areas = [
        ("Self-Direction", "Managing time, setting goals and taking initiative."),
        ("Critical Thinking", "Analyzing information and supporting ideas with evidence."),
        (
            "Creative Problem-Solving and Design Thinking",
            "Trying multiple approaches and revising ideas after failure.",
        ),
        (
            "Personal Growth and Reflection",
            "Recognizing strengths and acting on feedback.",
        ),
        ("Teamwork and Leadership", "Communicating, supporting others and leading when needed."),
    ];
    for (name, description) in focus_areas {
        upsert_focus_area(pool, name, description).await?;
    }

    let students = [
        ("Avery Lee", "avery.lee@example.org"),
        ("Jules Moreno", "jules.moreno@example.org"),
        ("Kiara Patel", "kiara.patel@example.org"),
    ];
    for (name, email) in students {
        upsert_student(pool, Some(name), email).await?;
    }

    let courses = [
        (
            "Robotics Studio",
            vec!["Critical Thinking", "Creative Problem-Solving and Design Thinking"],
        ),
        (
            "Community Garden",
            vec!["Teamwork and Leadership", "Critical Thinking"],
        ),
        (
            "Independent Research",
            vec!["Self-Direction", "Personal Growth and Reflection"],
        ),
    ];
    for (course, targets) in courses {
        let course_id = upsert_course(pool, course).await?;
        for target in targets {
            let focus_area_id = focus_area_id_for(pool, target).await?;
            ensure_assignment(pool, course_id, focus_area_id).await?;
        }
    }

    let observations = [
        ("seed-001", "avery.lee@example.org", "Robotics Studio", "Critical Thinking", 8),
        ("seed-002", "avery.lee@example.org", "Community Garden", "Critical Thinking", 10),
        ("seed-003", "avery.lee@example.org", "Community Garden", "Teamwork and Leadership", 7),
        ("seed-004", "jules.moreno@example.org", "Independent Research", "Self-Direction", 9),
        (
            "seed-005",
            "kiara.patel@example.org",
            "Robotics Studio",
            "Creative Problem-Solving and Design Thinking",
            10,
        ),
    ];

    for (source_key, email, course, focus_area, value) in observations {
        let student_id = student_id_for(pool, email).await?;
        let course_id = upsert_course(pool, course).await?;
        ensure_enrollment(pool, student_id, course_id).await?;
        let focus_area_id = focus_area_id_for(pool, focus_area).await?;
        let assignment_id = ensure_assignment(pool, course_id, focus_area_id).await?;
        let grade_id = grade_id_for(pool, value).await?;
        record_observation(pool, student_id, assignment_id, grade_id, source_key).await?;
    }

    info!("seed data applied");
    Ok(())
}

async fn student_id_for(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query("SELECT id FROM growth_pulse.students WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .map(|row| row.get::<Uuid, _>("id"))
        .with_context(|| format!("unknown student {email}"))?;
    Ok(id)
}

async fn focus_area_id_for(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query("SELECT id FROM growth_pulse.focus_areas WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .map(|row| row.get::<Uuid, _>("id"))
        .with_context(|| format!("unknown focus area {name}"))?;
    Ok(id)
}

/// One graded observation in an import file. Columns:
/// `student_email, course, focus_area, grade`, plus optional `source_key`
/// and `student_name`.
#[derive(Debug, serde::Deserialize, PartialEq, Eq)]
pub struct ImportRow {
    #[serde(default)]
    pub student_name: Option<String>,
    pub student_email: String,
    pub course: String,
    pub focus_area: String,
    pub grade: i32,
    #[serde(default)]
    pub source_key: Option<String>,
}

pub fn read_import_rows<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<ImportRow>().enumerate() {
        let mut row = result.with_context(|| format!("row {}", line + 1))?;
        row.student_name = row.student_name.filter(|name| !name.trim().is_empty());
        row.source_key = row.source_key.filter(|key| !key.trim().is_empty());
        rows.push(row);
    }

    Ok(rows)
}

/// Imports graded observations from CSV. Rows are keyed by `source_key`, so
/// re-importing the same file inserts nothing new.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_import_rows(file)?;
    let mut inserted = 0usize;

    for (line, row) in rows.into_iter().enumerate() {
        let student_id =
            upsert_student(pool, row.student_name.as_deref(), &row.student_email).await?;
        let course_id = upsert_course(pool, &row.course).await?;
        ensure_enrollment(pool, student_id, course_id).await?;
        let focus_area_id = focus_area_id_for(pool, &row.focus_area)
            .await
            .with_context(|| format!("row {}", line + 1))?;
        let assignment_id = ensure_assignment(pool, course_id, focus_area_id).await?;
        let grade_id = grade_id_for(pool, row.grade)
            .await
            .with_context(|| format!("row {}", line + 1))?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if record_observation(pool, student_id, assignment_id, grade_id, &source_key).await? {
            inserted += 1;
        } else {
            debug!(%source_key, "observation already imported");
        }
    }

    Ok(inserted)
}
