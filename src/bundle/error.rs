// src/bundle/error.rs

use std::time::Duration;

use thiserror::Error;

/// Failure of one step while building a QR bundle.
/// Any of these aborts the whole bundle; the archive is left unfinalized.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to serialize QR payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to encode QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("failed to compress QR image: {0}")]
    Image(#[source] std::io::Error),

    #[error("archive write failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("bundle output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("response body receiver dropped before the bundle was complete")]
    Disconnected,

    #[error("student {student_id} took {elapsed:?}, over the {limit:?} limit")]
    StudentDeadline {
        student_id: i64,
        elapsed: Duration,
        limit: Duration,
    },

    #[error("bundle exceeded its {0:?} deadline")]
    TotalDeadline(Duration),
}
