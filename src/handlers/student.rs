// src/handlers/student.rs

use axum::{
    Extension, Json,
    body::{Body, Bytes},
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::{
    bundle::naming,
    error::AppError,
    models::{
        exam::{ExamDetails, ExamSummary, ExamWindow},
        submission::NewSubmission,
    },
    state::{AppState, SharedStore},
    store::ExamStore,
    utils::jwt::Claims,
};

const PDF_MIME: &str = "application/pdf";

/// An uploaded file as read from the multipart form.
struct Upload {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

/// Lists the exams of a course that the calling student is enrolled in.
pub async fn list_course_exams(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let exams: Vec<ExamSummary> = store
        .list_course_exams_for_student(course_id, student_id)
        .await?
        .into_iter()
        .map(ExamSummary::from)
        .collect();

    Ok(Json(serde_json::json!({ "exams": exams })))
}

/// Serves the question paper of an exam once it has started.
pub async fn get_question_paper(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<Response, AppError> {
    let student_id = claims.user_id()?;
    let exam = find_exam(store.as_ref(), exam_id).await?;
    ensure_enrolled(store.as_ref(), &exam, student_id).await?;

    if exam.window_at(Utc::now()) == ExamWindow::NotStarted {
        return Err(AppError::Forbidden("Exam has not started yet".to_string()));
    }

    let paper = store
        .find_question_paper(exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question paper not found".to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, paper.mime_type)
        .header(header::CONTENT_LENGTH, paper.bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            naming::question_paper_disposition(&exam.title),
        )
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(paper.bytes))
        .map_err(|e| AppError::InternalServerError(format!("Failed to create response: {}", e)))
}

/// Accepts a scanned answer PDF while the exam window is open.
///
/// * Multipart fields: `examId` (text) and `pdf` (file).
/// * Resubmitting inside the window replaces the earlier upload.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let mut exam_id: Option<i64> = None;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "examId" => {
                let raw = field.text().await.map_err(multipart_error)?;
                let id = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::BadRequest("Invalid examId".to_string()))?;
                exam_id = Some(id);
            }
            "pdf" => {
                let file_name = field.file_name().unwrap_or("answer.pdf").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some(Upload {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    let exam_id = exam_id.ok_or_else(|| AppError::BadRequest("examId is required".to_string()))?;
    let upload = upload.ok_or_else(|| AppError::BadRequest("No PDF file uploaded".to_string()))?;

    let exam = find_exam(state.store.as_ref(), exam_id).await?;
    ensure_enrolled(state.store.as_ref(), &exam, student_id).await?;

    match exam.window_at(Utc::now()) {
        ExamWindow::NotStarted => {
            return Err(AppError::Forbidden("Exam has not started yet".to_string()));
        }
        ExamWindow::Closed => {
            return Err(AppError::Forbidden(
                "Submission window has closed".to_string(),
            ));
        }
        ExamWindow::Open => {}
    }

    if upload.data.len() > state.config.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File size {} exceeds maximum allowed size of {} bytes",
            upload.data.len(),
            state.config.max_upload_bytes
        )));
    }

    if !is_pdf(upload.content_type.as_deref(), &upload.data) {
        return Err(AppError::BadRequest("Only PDF files are allowed".to_string()));
    }

    let saved = state
        .store
        .upsert_submission(NewSubmission {
            exam_id,
            student_id,
            file_name: upload.file_name,
            mime_type: PDF_MIME.to_string(),
            answer_pdf: upload.data.to_vec(),
        })
        .await?;

    tracing::info!(
        exam_id,
        student_id,
        bytes = saved.size_bytes,
        "Answer sheet submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Submission successful",
            "submission": saved,
        })),
    ))
}

async fn find_exam(store: &dyn ExamStore, exam_id: i64) -> Result<ExamDetails, AppError> {
    store
        .find_exam(exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

async fn ensure_enrolled(
    store: &dyn ExamStore,
    exam: &ExamDetails,
    student_id: i64,
) -> Result<(), AppError> {
    if store.is_enrolled(exam.batch_id, student_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not enrolled in this exam's batch".to_string(),
        ))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Uploaded file is too large".to_string())
    } else {
        AppError::BadRequest(format!("Failed to read multipart form: {}", err.body_text()))
    }
}

/// The bytes must carry the PDF signature; a declared type, if any, must agree.
fn is_pdf(content_type: Option<&str>, data: &[u8]) -> bool {
    let declared_ok = match content_type {
        None => true,
        Some(ct) => ct == PDF_MIME || ct == "application/octet-stream",
    };
    declared_ok && data.starts_with(b"%PDF-")
}
