// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;

use crate::{
    error::AppError,
    models::{
        batch::{Batch, BatchRoster, RosterEntry},
        course::Course,
        exam::{ExamDetails, NewExam, StoredDocument},
        submission::{NewSubmission, Submission},
        user::User,
    },
    store::ExamStore,
};

struct StoredExam {
    exam: NewExam,
}

struct StoredSubmission {
    meta: Submission,
    answer_pdf: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: HashMap<i64, User>,
    courses: HashMap<i64, Course>,
    batches: HashMap<i64, Batch>,
    /// Roster per batch, in enrollment order.
    rosters: HashMap<i64, Vec<i64>>,
    exams: HashMap<i64, StoredExam>,
    submissions: Vec<StoredSubmission>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn details(&self, id: i64, stored: &StoredExam) -> ExamDetails {
        let exam = &stored.exam;
        ExamDetails {
            id,
            title: exam.title.clone(),
            course_id: exam.course_id,
            course_name: self.courses.get(&exam.course_id).map(|c| c.name.clone()),
            batch_id: exam.batch_id,
            batch_name: self.batches.get(&exam.batch_id).map(|b| b.name.clone()),
            start_time: exam.start_time,
            end_time: exam.end_time,
            questions: Json(exam.questions.clone()),
            k: exam.k,
            created_by: exam.created_by,
            question_paper_mime: exam.question_paper.as_ref().map(|d| d.mime_type.clone()),
            answer_key_mime: exam.answer_key.as_ref().map(|d| d.mime_type.clone()),
        }
    }

    fn enrolled(&self, batch_id: i64, student_id: i64) -> bool {
        self.rosters
            .get(&batch_id)
            .is_some_and(|ids| ids.contains(&student_id))
    }
}

/// In-process store for tests and local runs without a database.
///
/// Relations are not enforced: an exam may point at a batch or course that
/// does not exist, mirroring a dangling reference in the database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, AppError> {
        self.inner
            .read()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, AppError> {
        self.inner
            .write()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }

    pub fn add_user(&self, name: &str, email: &str, role: &str) -> Result<User, AppError> {
        let mut inner = self.write()?;
        if inner.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict(format!("Email {} already registered", email)));
        }
        let user = User {
            id: inner.allocate_id(),
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn add_course(&self, name: &str) -> Result<Course, AppError> {
        let mut inner = self.write()?;
        let course = Course {
            id: inner.allocate_id(),
            name: name.to_string(),
        };
        inner.courses.insert(course.id, course.clone());
        Ok(course)
    }

    /// Creates a batch whose roster is `student_ids` in the given order.
    pub fn add_batch(
        &self,
        name: &str,
        course_id: Option<i64>,
        student_ids: &[i64],
    ) -> Result<Batch, AppError> {
        let mut inner = self.write()?;
        let batch = Batch {
            id: inner.allocate_id(),
            name: name.to_string(),
            course_id,
        };
        inner.batches.insert(batch.id, batch.clone());
        inner.rosters.insert(batch.id, student_ids.to_vec());
        Ok(batch)
    }

    pub fn add_exam(&self, exam: NewExam) -> Result<i64, AppError> {
        let mut inner = self.write()?;
        let id = inner.allocate_id();
        inner.exams.insert(id, StoredExam { exam });
        Ok(id)
    }

    /// Submissions in insertion order.
    pub fn submissions(&self) -> Result<Vec<Submission>, AppError> {
        Ok(self.read()?.submissions.iter().map(|s| s.meta.clone()).collect())
    }

    /// The stored answer sheet of one student for one exam.
    pub fn answer_pdf(&self, exam_id: i64, student_id: i64) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self
            .read()?
            .submissions
            .iter()
            .find(|s| s.meta.exam_id == exam_id && s.meta.student_id == student_id)
            .map(|s| s.answer_pdf.clone()))
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<ExamDetails>, AppError> {
        let inner = self.read()?;
        Ok(inner
            .exams
            .get(&exam_id)
            .map(|stored| inner.details(exam_id, stored)))
    }

    async fn find_batch_roster(&self, batch_id: i64) -> Result<Option<BatchRoster>, AppError> {
        let inner = self.read()?;
        let Some(batch) = inner.batches.get(&batch_id) else {
            return Ok(None);
        };

        // Unknown student ids are skipped, like an inner join on users
        let students = inner
            .rosters
            .get(&batch_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.users.get(id))
            .map(|u| RosterEntry {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
            })
            .collect();

        Ok(Some(BatchRoster {
            id: batch.id,
            name: batch.name.clone(),
            students,
        }))
    }

    async fn list_course_exams_for_student(
        &self,
        course_id: i64,
        student_id: i64,
    ) -> Result<Vec<ExamDetails>, AppError> {
        let inner = self.read()?;
        let mut exams: Vec<ExamDetails> = inner
            .exams
            .iter()
            .filter(|(_, s)| s.exam.course_id == course_id)
            .filter(|(_, s)| inner.enrolled(s.exam.batch_id, student_id))
            .map(|(id, s)| inner.details(*id, s))
            .collect();
        exams.sort_by_key(|e| (e.start_time, e.id));
        Ok(exams)
    }

    async fn is_enrolled(&self, batch_id: i64, student_id: i64) -> Result<bool, AppError> {
        Ok(self.read()?.enrolled(batch_id, student_id))
    }

    async fn find_question_paper(&self, exam_id: i64) -> Result<Option<StoredDocument>, AppError> {
        Ok(self
            .read()?
            .exams
            .get(&exam_id)
            .and_then(|s| s.exam.question_paper.clone()))
    }

    async fn upsert_submission(&self, submission: NewSubmission) -> Result<Submission, AppError> {
        let mut inner = self.write()?;
        let existing = inner
            .submissions
            .iter()
            .position(|s| {
                s.meta.exam_id == submission.exam_id && s.meta.student_id == submission.student_id
            });

        let id = match existing {
            Some(idx) => inner.submissions.remove(idx).meta.id,
            None => inner.allocate_id(),
        };

        let meta = Submission {
            id,
            exam_id: submission.exam_id,
            student_id: submission.student_id,
            file_name: submission.file_name,
            mime_type: submission.mime_type,
            size_bytes: submission.answer_pdf.len() as i64,
            submitted_at: Utc::now(),
        };
        inner.submissions.push(StoredSubmission {
            meta: meta.clone(),
            answer_pdf: submission.answer_pdf,
        });
        Ok(meta)
    }
}
