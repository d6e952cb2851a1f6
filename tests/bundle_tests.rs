// tests/bundle_tests.rs

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use peer_eval::{
    bundle::{BundleSettings, qr::QrPayload},
    config::Config,
    models::exam::NewExam,
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use zip::ZipArchive;

const SECRET: &str = "bundle_test_secret";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app(store: Arc<MemoryStore>) -> String {
    spawn_app_with(store, BundleSettings::default()).await
}

async fn spawn_app_with(store: Arc<MemoryStore>, bundle: BundleSettings) -> String {
    let config = Config {
        database_url: String::new(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        cors_origins: Vec::new(),
        max_upload_bytes: 1024 * 1024,
        bundle,
    };

    let state = AppState { store, config };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

struct Fixture {
    store: Arc<MemoryStore>,
    teacher_token: String,
    student_token: String,
    exam_id: i64,
    alice_id: i64,
    bob_id: i64,
}

/// Exam "Midterm 1" in course "CS101" for a batch of Alice and Bob.
fn seed() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let teacher = store.add_user("Tess", "tess@uni.test", "teacher").unwrap();
    let alice = store.add_user("Alice", "alice@uni.test", "student").unwrap();
    let bob = store.add_user("Bob", "bob@uni.test", "student").unwrap();
    let course = store.add_course("CS101").unwrap();
    let batch = store
        .add_batch("Morning", Some(course.id), &[alice.id, bob.id])
        .unwrap();
    let exam_id = store
        .add_exam(exam("Midterm 1", course.id, batch.id))
        .unwrap();

    Fixture {
        teacher_token: sign_jwt(teacher.id, &teacher.role, SECRET, 600).unwrap(),
        student_token: sign_jwt(alice.id, &alice.role, SECRET, 600).unwrap(),
        store,
        exam_id,
        alice_id: alice.id,
        bob_id: bob.id,
    }
}

fn exam(title: &str, course_id: i64, batch_id: i64) -> NewExam {
    let start = Utc::now() + Duration::days(1);
    NewExam {
        title: title.to_string(),
        course_id,
        batch_id,
        start_time: start,
        end_time: start + Duration::hours(3),
        questions: Vec::new(),
        k: 3,
        created_by: None,
        question_paper: None,
        answer_key: None,
    }
}

async fn download(address: &str, exam_id: i64, token: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{}/api/teacher/exams/{}/qr-bundle", address, exam_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request")
}

fn sorted_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("bundle should be a valid zip");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn number_after(haystack: &[u8], key: &[u8], from: usize) -> usize {
    let start = find(haystack, key, from).expect("key present") + key.len();
    let digits: String = haystack[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|b| *b as char)
        .collect();
    digits.parse().unwrap()
}

/// Pulls the QR image out of a cover page and decodes it.
fn decode_cover_qr(pdf: &[u8]) -> QrPayload {
    let obj = find(pdf, b"/Subtype /Image", 0).expect("image xobject");
    let dict_start = pdf[..obj]
        .windows(3)
        .rposition(|w| w == b"obj")
        .expect("object header");
    let length = number_after(pdf, b"/Length ", dict_start);
    let side = number_after(pdf, b"/Width ", dict_start);

    let mut data_start = find(pdf, b"stream", obj).unwrap() + b"stream".len();
    if pdf[data_start] == b'\r' {
        data_start += 1;
    }
    if pdf[data_start] == b'\n' {
        data_start += 1;
    }

    let mut pixels = Vec::new();
    flate2::read::ZlibDecoder::new(&pdf[data_start..data_start + length])
        .read_to_end(&mut pixels)
        .unwrap();
    assert_eq!(pixels.len(), side * side);

    let mut img =
        rqrr::PreparedImage::prepare_from_greyscale(side, side, |x, y| pixels[y * side + x]);
    let grids = img.detect_grids();
    assert_eq!(grids.len(), 1);
    let (_, content) = grids[0].decode().unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn bundle_contains_one_cover_per_student() {
    // Arrange
    let fx = seed();
    let address = spawn_app(fx.store.clone()).await;

    // Act
    let response = download(&address, fx.exam_id, &fx.teacher_token).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/zip");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"Midterm_1_QR_Papers.zip\""
    );

    let bytes = response.bytes().await.unwrap();
    let alice_file = format!("Alice_{}_Midterm_1.pdf", fx.alice_id);
    let bob_file = format!("Bob_{}_Midterm_1.pdf", fx.bob_id);
    assert_eq!(sorted_names(&bytes), vec![alice_file.clone(), bob_file.clone()]);

    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    for (file, student_id) in [(alice_file, fx.alice_id), (bob_file, fx.bob_id)] {
        let mut pdf = Vec::new();
        archive.by_name(&file).unwrap().read_to_end(&mut pdf).unwrap();

        assert!(pdf.starts_with(b"%PDF-"));
        assert!(find(&pdf, b"(Exam: Midterm 1)", 0).is_some());
        assert!(find(&pdf, b"(Course: CS101)", 0).is_some());
        assert_eq!(decode_cover_qr(&pdf), QrPayload::new(student_id, fx.exam_id));
    }
}

#[tokio::test]
async fn regenerating_yields_same_entries() {
    let fx = seed();
    let address = spawn_app(fx.store.clone()).await;

    let first = download(&address, fx.exam_id, &fx.teacher_token)
        .await
        .bytes()
        .await
        .unwrap();
    let second = download(&address, fx.exam_id, &fx.teacher_token)
        .await
        .bytes()
        .await
        .unwrap();

    assert_eq!(sorted_names(&first), sorted_names(&second));
}

#[tokio::test]
async fn unknown_exam_is_404() {
    let fx = seed();
    let address = spawn_app(fx.store.clone()).await;

    let response = download(&address, 987_654, &fx.teacher_token).await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Exam not found");
}

#[tokio::test]
async fn dangling_batch_is_404() {
    let fx = seed();
    let course = fx.store.add_course("CS102").unwrap();
    let orphan = fx
        .store
        .add_exam(exam("Orphan", course.id, 987_654))
        .unwrap();
    let address = spawn_app(fx.store.clone()).await;

    let response = download(&address, orphan, &fx.teacher_token).await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Batch not found");
}

#[tokio::test]
async fn empty_roster_gives_empty_archive() {
    let fx = seed();
    let course = fx.store.add_course("Seminar").unwrap();
    let batch = fx.store.add_batch("Nobody", Some(course.id), &[]).unwrap();
    let exam_id = fx
        .store
        .add_exam(exam("Quiet Exam", course.id, batch.id))
        .unwrap();
    let address = spawn_app(fx.store.clone()).await;

    let response = download(&address, exam_id, &fx.teacher_token).await;

    assert_eq!(response.status().as_u16(), 200);
    let bytes = response.bytes().await.unwrap();
    assert!(sorted_names(&bytes).is_empty());
}

#[tokio::test]
async fn duplicate_names_stay_distinct() {
    let fx = seed();
    let course = fx.store.add_course("CS201").unwrap();
    let a = fx.store.add_user("Sam", "sam1@uni.test", "student").unwrap();
    let b = fx.store.add_user("Sam", "sam2@uni.test", "student").unwrap();
    let batch = fx
        .store
        .add_batch("Sams", Some(course.id), &[a.id, b.id])
        .unwrap();
    let exam_id = fx.store.add_exam(exam("Lab", course.id, batch.id)).unwrap();
    let address = spawn_app(fx.store.clone()).await;

    let bytes = download(&address, exam_id, &fx.teacher_token)
        .await
        .bytes()
        .await
        .unwrap();

    assert_eq!(
        sorted_names(&bytes),
        vec![format!("Sam_{}_Lab.pdf", a.id), format!("Sam_{}_Lab.pdf", b.id)]
    );
}

#[tokio::test]
async fn bundle_requires_teacher_token() {
    let fx = seed();
    let address = spawn_app(fx.store.clone()).await;
    let client = reqwest::Client::new();

    let anonymous = client
        .get(format!("{}/api/teacher/exams/{}/qr-bundle", address, fx.exam_id))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let as_student = download(&address, fx.exam_id, &fx.student_token).await;
    assert_eq!(as_student.status().as_u16(), 403);

    let forged = download(&address, fx.exam_id, "not.a.jwt").await;
    assert_eq!(forged.status().as_u16(), 401);
}

#[tokio::test]
async fn failure_before_first_bytes_is_500() {
    let fx = seed();
    let settings = BundleSettings {
        student_timeout: Some(StdDuration::ZERO),
        ..BundleSettings::default()
    };
    let address = spawn_app_with(fx.store.clone(), settings).await;

    let response = download(&address, fx.exam_id, &fx.teacher_token).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "message": "Failed to generate PDF bundle" }));
}

#[tokio::test]
async fn failure_after_first_bytes_truncates_body() {
    let fx = seed();
    let settings = BundleSettings {
        student_timeout: Some(StdDuration::ZERO),
        chunk_bytes: 1,
        ..BundleSettings::default()
    };
    let address = spawn_app_with(fx.store.clone(), settings).await;

    let response = download(&address, fx.exam_id, &fx.teacher_token).await;

    // Headers were already sent, so the failure shows up as a broken body
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.bytes().await.is_err());
}
