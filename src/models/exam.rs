// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// One question of an exam paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub question_text: String,
    pub max_marks: i32,
}

/// Read-only projection of the 'exams' table joined with course and batch names.
/// Blob columns are excluded and fetched on demand.
#[derive(Debug, Clone, FromRow)]
pub struct ExamDetails {
    pub id: i64,
    pub title: String,
    pub course_id: i64,
    /// `None` when the course row is missing.
    pub course_name: Option<String>,
    pub batch_id: i64,
    /// `None` when the batch row is missing.
    pub batch_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Ordered question list, stored as a JSON array.
    pub questions: Json<Vec<ExamQuestion>>,
    /// Number of peer evaluations each student performs.
    pub k: i32,
    pub created_by: Option<i64>,
    pub question_paper_mime: Option<String>,
    pub answer_key_mime: Option<String>,
}

/// Where `now` falls relative to an exam's start/end times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamWindow {
    NotStarted,
    Open,
    Closed,
}

impl ExamDetails {
    /// Both bounds are inclusive.
    pub fn window_at(&self, now: DateTime<Utc>) -> ExamWindow {
        if now < self.start_time {
            ExamWindow::NotStarted
        } else if now > self.end_time {
            ExamWindow::Closed
        } else {
            ExamWindow::Open
        }
    }
}

/// DTO for creating an exam (seeding only; there is no HTTP surface for it).
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub course_id: i64,
    pub batch_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub questions: Vec<ExamQuestion>,
    pub k: i32,
    pub created_by: Option<i64>,
    pub question_paper: Option<StoredDocument>,
    pub answer_key: Option<StoredDocument>,
}

/// A binary blob stored alongside an exam (question paper or answer key).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct BatchLabel {
    pub name: String,
}

/// DTO for the student's exam list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub batch: BatchLabel,
    pub num_questions: usize,
    pub max_marks: Vec<i32>,
    pub has_question_paper: bool,
}

impl From<ExamDetails> for ExamSummary {
    fn from(exam: ExamDetails) -> Self {
        let Json(questions) = exam.questions;
        Self {
            id: exam.id,
            title: exam.title,
            start_time: exam.start_time,
            end_time: exam.end_time,
            batch: BatchLabel {
                name: exam.batch_name.unwrap_or_default(),
            },
            num_questions: questions.len(),
            max_marks: questions.iter().map(|q| q.max_marks).collect(),
            has_question_paper: exam.question_paper_mime.is_some(),
        }
    }
}
