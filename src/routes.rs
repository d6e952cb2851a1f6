// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{bundle, student},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Headroom for multipart framing and the text fields around the PDF.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Assembles the main application router.
///
/// * Teacher routes: QR bundle download (auth + teacher role).
/// * Student routes: exam list, question paper, answer upload (auth).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_DISPOSITION]);

    let teacher_routes = Router::new()
        .route("/exams/{exam_id}/qr-bundle", get(bundle::generate_qr_bundle))
        // Auth first, then role check
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let student_routes = Router::new()
        .route("/courses/{course_id}/exams", get(student::list_course_exams))
        .route("/question-paper/{exam_id}", get(student::get_question_paper))
        .route(
            "/submit-answer",
            post(student::submit_answer).layer(DefaultBodyLimit::max(
                state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/teacher", teacher_routes)
        .nest("/api/student", student_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
