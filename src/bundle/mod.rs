// src/bundle/mod.rs

//! Per-student QR cover pages, streamed into a ZIP archive.
//!
//! The generator is synchronous: it renders one PDF at a time and writes it
//! into a streaming ZIP writer over any `io::Write`. `stream` wraps it in a
//! blocking task feeding an HTTP response body.

use std::cell::Cell;
use std::io::{self, Seek, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{error::AppError, models::batch::RosterEntry, store::ExamStore};

pub mod error;
pub mod naming;
pub mod pdf;
pub mod qr;
pub mod stream;

pub use error::BundleError;

use pdf::CoverPage;
use qr::{QrPayload, QrRaster};

/// Deflate level used for every entry (maximum).
pub const COMPRESSION_LEVEL: i64 = 9;

/// Tunables for bundle generation.
#[derive(Debug, Clone)]
pub struct BundleSettings {
    /// Pixels per QR module in the embedded image.
    pub qr_module_px: u32,
    /// Output is handed to the response in chunks of about this size.
    pub chunk_bytes: usize,
    /// Chunks allowed in flight between generator and socket.
    pub channel_capacity: usize,
    /// Longest time one student's page may take.
    pub student_timeout: Option<Duration>,
    /// Longest time the whole bundle may take.
    pub total_timeout: Option<Duration>,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            qr_module_px: 4,
            chunk_bytes: 64 * 1024,
            channel_capacity: 8,
            student_timeout: None,
            total_timeout: None,
        }
    }
}

/// Everything needed to build one exam's bundle, resolved before any output.
#[derive(Debug, Clone)]
pub struct BundlePlan {
    pub exam_id: i64,
    pub exam_title: String,
    pub course_name: String,
    pub batch_name: String,
    pub students: Vec<RosterEntry>,
}

impl BundlePlan {
    /// Resolves the exam and its batch roster.
    ///
    /// Fails with `NotFound("Exam not found")` or `NotFound("Batch not found")`.
    pub async fn load(store: &dyn ExamStore, exam_id: i64) -> Result<Self, AppError> {
        let exam = store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        let roster = store
            .find_batch_roster(exam.batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch not found".to_string()))?;

        if exam.course_name.is_none() {
            tracing::warn!(exam_id, course_id = exam.course_id, "Exam course is missing");
        }

        Ok(Self {
            exam_id,
            exam_title: exam.title,
            course_name: exam.course_name.unwrap_or_default(),
            batch_name: roster.name,
            students: roster.students,
        })
    }

    pub fn content_disposition(&self) -> String {
        naming::content_disposition(&self.exam_title)
    }
}

/// One finished cover page, owned until it is appended to the archive.
#[derive(Debug)]
pub struct BundleEntry {
    pub file_name: String,
    pub payload: QrPayload,
    pub pdf: Vec<u8>,
}

/// Outcome of a completed bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub entries: usize,
    pub pdf_bytes: u64,
}

/// Builds cover pages and writes them into a ZIP stream.
#[derive(Debug, Clone, Default)]
pub struct BundleGenerator {
    settings: BundleSettings,
}

impl BundleGenerator {
    pub fn new(settings: BundleSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BundleSettings {
        &self.settings
    }

    /// Renders the cover page of a single student.
    pub fn render_entry(
        &self,
        plan: &BundlePlan,
        student: &RosterEntry,
    ) -> Result<BundleEntry, BundleError> {
        let payload = QrPayload::new(student.id, plan.exam_id);
        let qr = QrRaster::encode(&payload.to_json()?, self.settings.qr_module_px)?;
        let pdf = CoverPage {
            exam_title: &plan.exam_title,
            course_name: &plan.course_name,
            qr: &qr,
        }
        .render()?;

        Ok(BundleEntry {
            file_name: naming::entry_file_name(student, &plan.exam_title),
            payload,
            pdf,
        })
    }

    /// Writes the whole bundle to `out`, one student at a time in roster order.
    ///
    /// `is_live` is polled before each student; returning `false` aborts with
    /// `Disconnected`. On any error the archive is not finalized and nothing
    /// further reaches `out`.
    pub fn write_bundle<W: Write>(
        &self,
        plan: &BundlePlan,
        out: W,
        is_live: impl Fn() -> bool,
    ) -> Result<BundleReport, BundleError> {
        let sealed = Rc::new(Cell::new(false));
        let mut zip = ZipWriter::new_stream(SealableWriter {
            inner: out,
            sealed: Rc::clone(&sealed),
        });

        let result = self.write_entries(plan, &mut zip, &is_live);
        match result {
            Ok(report) => {
                let mut finished = zip.finish()?;
                finished.flush()?;
                Ok(report)
            }
            Err(e) => {
                // ZipWriter finalizes on drop; once sealed those bytes go nowhere
                sealed.set(true);
                drop(zip);
                Err(e)
            }
        }
    }

    fn write_entries<S: Write + Seek>(
        &self,
        plan: &BundlePlan,
        zip: &mut ZipWriter<S>,
        is_live: &impl Fn() -> bool,
    ) -> Result<BundleReport, BundleError> {
        let started = Instant::now();
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .unix_permissions(0o644);

        let mut report = BundleReport {
            entries: 0,
            pdf_bytes: 0,
        };

        for student in &plan.students {
            if !is_live() {
                return Err(BundleError::Disconnected);
            }
            if let Some(limit) = self.settings.total_timeout {
                if started.elapsed() >= limit {
                    return Err(BundleError::TotalDeadline(limit));
                }
            }

            let student_started = Instant::now();
            let entry = self.render_entry(plan, student)?;

            zip.start_file(entry.file_name.as_str(), options)?;
            zip.write_all(&entry.pdf)?;

            let elapsed = student_started.elapsed();
            if let Some(limit) = self.settings.student_timeout {
                if elapsed > limit {
                    return Err(BundleError::StudentDeadline {
                        student_id: student.id,
                        elapsed,
                        limit,
                    });
                }
            }

            report.entries += 1;
            report.pdf_bytes += entry.pdf.len() as u64;
            tracing::debug!(
                student_id = student.id,
                file = %entry.file_name,
                bytes = entry.pdf.len(),
                "Cover page added"
            );
        }

        Ok(report)
    }
}

/// Passes writes through until sealed, then swallows them.
struct SealableWriter<W> {
    inner: W,
    sealed: Rc<Cell<bool>>,
}

impl<W: Write> Write for SealableWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sealed.get() {
            return Ok(buf.len());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.sealed.get() {
            return Ok(());
        }
        self.inner.flush()
    }
}
