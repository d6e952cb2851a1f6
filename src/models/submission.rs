// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Metadata of a stored answer submission (the PDF bytes are not loaded).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub submitted_at: DateTime<Utc>,
}

/// DTO for storing an uploaded answer sheet.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub exam_id: i64,
    pub student_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub answer_pdf: Vec<u8>,
}
