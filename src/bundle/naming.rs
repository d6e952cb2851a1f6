// src/bundle/naming.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::models::batch::RosterEntry;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Replaces every run of whitespace with a single `_` (leading and trailing runs included).
pub fn title_slug(title: &str) -> String {
    WHITESPACE_RUN.replace_all(title, "_").into_owned()
}

/// Entry name inside the archive: `{name}_{id}_{titleSlug}.pdf`.
///
/// Unique per roster because student ids are unique.
pub fn entry_file_name(student: &RosterEntry, exam_title: &str) -> String {
    format!(
        "{}_{}_{}.pdf",
        sanitize_segment(&student.name),
        student.id,
        sanitize_segment(&title_slug(exam_title))
    )
}

/// `Content-Disposition` value for the whole bundle.
pub fn content_disposition(exam_title: &str) -> String {
    format!(
        "attachment; filename=\"{}_QR_Papers.zip\"",
        header_file_stem(exam_title)
    )
}

/// `Content-Disposition` value for an exam's question paper, shown inline.
pub fn question_paper_disposition(exam_title: &str) -> String {
    format!(
        "inline; filename=\"{}_Question_Paper.pdf\"",
        header_file_stem(exam_title)
    )
}

/// Title slug usable inside a quoted header parameter.
/// Non-ASCII characters become `_` so the value is always a valid header.
fn header_file_stem(exam_title: &str) -> String {
    title_slug(exam_title)
        .chars()
        .filter(|c| *c != '"' && *c != '\\')
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect()
}

/// Keeps a name segment from introducing directories inside the archive.
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
