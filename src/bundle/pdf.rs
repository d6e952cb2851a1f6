// src/bundle/pdf.rs

use std::io::Write;

use flate2::{Compression, write::ZlibEncoder};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};

use crate::bundle::{error::BundleError, qr::QrRaster};

// A4 in points, with a uniform margin.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 50.0;

const QR_X: f32 = 50.0;
const QR_TOP: f32 = 40.0;
const QR_SIZE: f32 = 100.0;

const TITLE_SIZE: f32 = 20.0;
const COURSE_SIZE: f32 = 16.0;
const LEADING: f32 = 1.2;

const FONT: Name<'static> = Name(b"F1");
const QR_IMAGE: Name<'static> = Name(b"Im1");

/// Helvetica advance widths (1/1000 em) for printable ASCII, starting at space.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :;<=>?@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [\]^_`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {|}~
];
const DEFAULT_WIDTH: u16 = 556;

/// One student's answer-sheet cover: QR code top-left, exam and course centered below.
pub struct CoverPage<'a> {
    pub exam_title: &'a str,
    pub course_name: &'a str,
    pub qr: &'a QrRaster,
}

impl CoverPage<'_> {
    /// Renders a complete single-page PDF into an owned buffer.
    pub fn render(&self) -> Result<Vec<u8>, BundleError> {
        let catalog_id = Ref::new(1);
        let page_tree_id = Ref::new(2);
        let page_id = Ref::new(3);
        let content_id = Ref::new(4);
        let font_id = Ref::new(5);
        let image_id = Ref::new(6);

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id).kids([page_id]).count(1);

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
        page.parent(page_tree_id);
        page.contents(content_id);
        let mut resources = page.resources();
        resources.fonts().pair(FONT, font_id);
        resources.x_objects().pair(QR_IMAGE, image_id);
        resources.finish();
        page.finish();

        pdf.type1_font(font_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));

        let side = self.qr.side() as i32;
        let compressed = deflate(self.qr.pixels())?;
        let mut image = pdf.image_xobject(image_id, &compressed);
        image.filter(Filter::FlateDecode);
        image.width(side);
        image.height(side);
        image.color_space().device_gray();
        image.bits_per_component(8);
        image.finish();

        pdf.stream(content_id, &self.content());

        Ok(pdf.finish())
    }

    fn content(&self) -> Vec<u8> {
        let mut content = Content::new();

        let qr_y = PAGE_HEIGHT - QR_TOP - QR_SIZE;
        content.save_state();
        content.transform([QR_SIZE, 0.0, 0.0, QR_SIZE, QR_X, qr_y]);
        content.x_object(QR_IMAGE);
        content.restore_state();

        let blocks = [
            (format!("Exam: {}", self.exam_title), TITLE_SIZE),
            (format!("Course: {}", self.course_name), COURSE_SIZE),
        ];

        // `cursor` is the top of the next line; a blank line separates blocks
        let mut cursor = qr_y - TITLE_SIZE * LEADING;
        for (text, size) in &blocks {
            for line in wrap(text, *size, PAGE_WIDTH - 2.0 * MARGIN) {
                let baseline = cursor - size;
                content.begin_text();
                content.set_font(FONT, *size);
                content.next_line(centered_x(text_width(&line, *size)), baseline);
                content.show(Str(&win_ansi(&line)));
                content.end_text();
                cursor -= size * LEADING;
            }
            cursor -= size * LEADING;
        }

        content.finish()
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, BundleError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(BundleError::Image)?;
    encoder.finish().map_err(BundleError::Image)
}

fn char_width(c: char) -> u16 {
    match c as u32 {
        code @ 0x20..=0x7E => HELVETICA_WIDTHS[(code - 0x20) as usize],
        _ => DEFAULT_WIDTH,
    }
}

/// Rendered width of `text` in points at `size`.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    units as f32 * size / 1000.0
}

/// Left edge that centers a line of `width` between the margins.
pub fn centered_x(width: f32) -> f32 {
    let available = PAGE_WIDTH - 2.0 * MARGIN;
    MARGIN + ((available - width) / 2.0).max(0.0)
}

/// Greedy word wrap. A single word wider than `max_width` gets its own line.
fn wrap(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Maps text onto WinAnsiEncoding; characters outside Latin-1 print as `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn render(title: &str, course: &str) -> Vec<u8> {
        let qr = QrRaster::encode(r#"{"studentId":"1","examId":"2"}"#, 4).unwrap();
        CoverPage {
            exam_title: title,
            course_name: course,
            qr: &qr,
        }
        .render()
        .unwrap()
    }

    #[test]
    fn renders_single_page_with_text_and_image() {
        let pdf = render("Midterm 1", "CS101");

        assert!(pdf.starts_with(b"%PDF-"));
        assert!(contains(&pdf, b"%%EOF"));
        assert!(contains(&pdf, b"/Count 1"));
        assert!(contains(&pdf, b"/Image"));
        assert!(contains(&pdf, b"/FlateDecode"));
        assert!(contains(&pdf, b"(Exam: Midterm 1)"));
        assert!(contains(&pdf, b"(Course: CS101)"));
    }

    #[test]
    fn long_titles_wrap_inside_margins() {
        let title = "Comprehensive End Semester Examination in Advanced Distributed Systems and Networks";
        let lines = wrap(&format!("Exam: {}", title), TITLE_SIZE, PAGE_WIDTH - 2.0 * MARGIN);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, TITLE_SIZE) <= PAGE_WIDTH - 2.0 * MARGIN);
        }
        assert_eq!(lines.join(" "), format!("Exam: {}", title));
    }

    #[test]
    fn centering_is_symmetric_and_clamped() {
        let w = text_width("CS101", COURSE_SIZE);
        let x = centered_x(w);
        let right_gap = PAGE_WIDTH - MARGIN - (x + w);
        assert!((x - MARGIN - right_gap).abs() < 0.01);

        assert_eq!(centered_x(10_000.0), MARGIN);
    }

    #[test]
    fn widths_use_helvetica_metrics() {
        // H=722 e=556 l=222 l=222 o=556
        assert!((text_width("Hello", 10.0) - 22.78).abs() < 0.001);
        assert_eq!(char_width('é'), DEFAULT_WIDTH);
    }

    #[test]
    fn non_latin_text_degrades_to_question_marks() {
        assert_eq!(win_ansi("Café 数"), vec![b'C', b'a', b'f', 0xE9, b' ', b'?']);
    }
}
