// src/handlers/bundle.rs

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};

use crate::{
    bundle::{
        BundleGenerator, BundlePlan,
        stream::{body_stream, deadline_after, next_chunk, spawn_bundle},
    },
    error::AppError,
    state::AppState,
};

/// Streams a ZIP of per-student QR cover pages for one exam.
///
/// * 404 when the exam or its batch cannot be resolved (nothing is streamed).
/// * The response is committed only once the first archive bytes exist, so a
///   failure before that point still becomes a 500 JSON error.
/// * A failure after that point terminates the body without finalizing the
///   archive; clients detect it as a truncated transfer.
pub async fn generate_qr_bundle(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Result<Response, AppError> {
    let plan = BundlePlan::load(state.store.as_ref(), exam_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => e,
            other => AppError::BundleFailed(other.to_string()),
        })?;

    tracing::info!(
        exam_id,
        students = plan.students.len(),
        batch = %plan.batch_name,
        "Generating QR bundle"
    );

    let disposition = plan.content_disposition();
    let generator = BundleGenerator::new(state.config.bundle.clone());
    let deadline = deadline_after(generator.settings().total_timeout);
    let mut rx = spawn_bundle(generator, plan);

    let first = match next_chunk(&mut rx, deadline).await {
        Some(Ok(chunk)) => chunk,
        Some(Err(e)) => return Err(AppError::BundleFailed(e.to_string())),
        None => {
            return Err(AppError::BundleFailed(
                "bundle task ended without output".to_string(),
            ));
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(body_stream(first, rx, deadline)))
        .map_err(|e| AppError::BundleFailed(format!("Failed to create response: {}", e)))
}
