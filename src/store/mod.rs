// src/store/mod.rs

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        batch::BatchRoster,
        exam::{ExamDetails, StoredDocument},
        submission::{NewSubmission, Submission},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read/write access to exams, batches and submissions.
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Get an exam by ID, joined with its course and batch names.
    async fn find_exam(&self, exam_id: i64) -> Result<Option<ExamDetails>, AppError>;

    /// Get a batch with its students in enrollment order.
    async fn find_batch_roster(&self, batch_id: i64) -> Result<Option<BatchRoster>, AppError>;

    /// List the exams of a course whose batch contains the given student, by start time.
    async fn list_course_exams_for_student(
        &self,
        course_id: i64,
        student_id: i64,
    ) -> Result<Vec<ExamDetails>, AppError>;

    /// Check whether a student is on a batch roster.
    async fn is_enrolled(&self, batch_id: i64, student_id: i64) -> Result<bool, AppError>;

    /// Get the stored question paper of an exam, if one was uploaded.
    async fn find_question_paper(&self, exam_id: i64) -> Result<Option<StoredDocument>, AppError>;

    /// Insert a submission, replacing any earlier one for the same exam and student.
    async fn upsert_submission(&self, submission: NewSubmission) -> Result<Submission, AppError>;
}
