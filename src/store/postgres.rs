// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        batch::{Batch, BatchRoster, RosterEntry},
        exam::{ExamDetails, StoredDocument},
        submission::{NewSubmission, Submission},
    },
    store::ExamStore,
};

const EXAM_COLUMNS: &str = r#"
    e.id,
    e.title,
    e.course_id,
    c.name AS course_name,
    e.batch_id,
    b.name AS batch_name,
    e.start_time,
    e.end_time,
    e.questions,
    e.k,
    e.created_by,
    e.question_paper_mime,
    e.answer_key_mime
"#;

/// Helper struct for fetching a stored blob with its MIME type.
#[derive(sqlx::FromRow)]
struct BlobRow {
    bytes: Option<Vec<u8>>,
    mime_type: Option<String>,
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<ExamDetails>, AppError> {
        let exam = sqlx::query_as::<_, ExamDetails>(&format!(
            r#"
            SELECT {EXAM_COLUMNS}
            FROM exams e
            LEFT JOIN courses c ON c.id = e.course_id
            LEFT JOIN batches b ON b.id = e.batch_id
            WHERE e.id = $1
            "#
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch exam {}: {:?}", exam_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(exam)
    }

    async fn find_batch_roster(&self, batch_id: i64) -> Result<Option<BatchRoster>, AppError> {
        let batch = sqlx::query_as::<_, Batch>("SELECT id, name, course_id FROM batches WHERE id = $1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(batch) = batch else {
            return Ok(None);
        };

        let students = sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT u.id, u.name, u.email
            FROM batch_students bs
            JOIN users u ON u.id = bs.student_id
            WHERE bs.batch_id = $1
            ORDER BY bs.position
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch roster of batch {}: {:?}", batch_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(Some(BatchRoster {
            id: batch.id,
            name: batch.name,
            students,
        }))
    }

    async fn list_course_exams_for_student(
        &self,
        course_id: i64,
        student_id: i64,
    ) -> Result<Vec<ExamDetails>, AppError> {
        let exams = sqlx::query_as::<_, ExamDetails>(&format!(
            r#"
            SELECT {EXAM_COLUMNS}
            FROM exams e
            LEFT JOIN courses c ON c.id = e.course_id
            LEFT JOIN batches b ON b.id = e.batch_id
            WHERE e.course_id = $1
              AND EXISTS (
                SELECT 1 FROM batch_students bs
                WHERE bs.batch_id = e.batch_id AND bs.student_id = $2
              )
            ORDER BY e.start_time
            "#
        ))
        .bind(course_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(exams)
    }

    async fn is_enrolled(&self, batch_id: i64, student_id: i64) -> Result<bool, AppError> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM batch_students WHERE batch_id = $1 AND student_id = $2)",
        )
        .bind(batch_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(enrolled)
    }

    async fn find_question_paper(&self, exam_id: i64) -> Result<Option<StoredDocument>, AppError> {
        let row = sqlx::query_as::<_, BlobRow>(
            "SELECT question_paper AS bytes, question_paper_mime AS mime_type FROM exams WHERE id = $1",
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| match (r.bytes, r.mime_type) {
            (Some(bytes), mime) => Some(StoredDocument {
                bytes,
                mime_type: mime.unwrap_or_else(|| "application/pdf".to_string()),
            }),
            (None, _) => None,
        }))
    }

    async fn upsert_submission(&self, submission: NewSubmission) -> Result<Submission, AppError> {
        // Resubmitting inside the window replaces the previous answer sheet
        let saved = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (exam_id, student_id, file_name, mime_type, answer_pdf)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (exam_id, student_id) DO UPDATE SET
                file_name = EXCLUDED.file_name,
                mime_type = EXCLUDED.mime_type,
                answer_pdf = EXCLUDED.answer_pdf,
                submitted_at = NOW()
            RETURNING
                id,
                exam_id,
                student_id,
                file_name,
                mime_type,
                octet_length(answer_pdf)::BIGINT AS size_bytes,
                submitted_at
            "#,
        )
        .bind(submission.exam_id)
        .bind(submission.student_id)
        .bind(&submission.file_name)
        .bind(&submission.mime_type)
        .bind(&submission.answer_pdf)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert submission: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(saved)
    }
}
