// src/reports/export/pdf.rs
//! Small PDF 1.4 writer for tabular reports. Pages are laid out first so
//! the footer can carry the final page count.

use crate::reports::document::{ReportDocument, ReportTable};

const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 40.0;
const FOOTER_Y: f64 = 24.0;
const BOTTOM: f64 = 50.0;
const ROW_HEIGHT: f64 = 14.0;
const BODY_SIZE: f64 = 8.5;
/// Rough Helvetica advance per character, in ems.
const CHAR_WIDTH: f64 = 0.52;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Text { x: f64, y: f64, size: f64, font: Font, text: String },
    Rule { x1: f64, y1: f64, x2: f64, y2: f64 },
    Shade { x: f64, y: f64, w: f64, h: f64 },
}

/// WinAnsi-safe literal string body.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn fit(text: &str, width: f64, size: f64) -> String {
    let max_chars = (width / (size * CHAR_WIDTH)).floor().max(1.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut cut: String = text.chars().take(max_chars - 3).collect();
    cut.push_str("...");
    cut
}

struct Layout {
    pages: Vec<Vec<Op>>,
    y: f64,
}

impl Layout {
    fn new() -> Self {
        Self { pages: vec![Vec::new()], y: PAGE_HEIGHT - MARGIN }
    }

    fn page(&mut self) -> &mut Vec<Op> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Starts a new page unless `height` still fits above the footer.
    fn ensure(&mut self, height: f64) -> bool {
        if self.y - height < BOTTOM {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn text(&mut self, x: f64, size: f64, font: Font, text: &str) {
        let y = self.y;
        self.page().push(Op::Text { x, y, size, font, text: text.to_string() });
    }

    fn line(&mut self, size: f64, font: Font, text: &str, gap: f64) {
        self.ensure(size + gap);
        self.y -= size;
        self.text(MARGIN, size, font, text);
        self.y -= gap;
    }
}

fn column_widths(table: &ReportTable, available: f64) -> Vec<f64> {
    let columns = table.headers.len().max(1);
    let mut weights: Vec<f64> = table
        .headers
        .iter()
        .map(|h| h.chars().count().clamp(4, 30) as f64)
        .collect();
    for row in table.rows.iter().take(100) {
        for (i, cell) in row.iter().enumerate().take(columns) {
            let len = cell.display().chars().count().clamp(4, 40) as f64;
            if len > weights[i] {
                weights[i] = len;
            }
        }
    }
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| available * w / total).collect()
}

fn table_header(layout: &mut Layout, table: &ReportTable, widths: &[f64]) {
    layout.y -= ROW_HEIGHT;
    let top = layout.y;
    layout.page().push(Op::Shade {
        x: MARGIN,
        y: top - 4.0,
        w: PAGE_WIDTH - 2.0 * MARGIN,
        h: ROW_HEIGHT,
    });
    let mut x = MARGIN + 2.0;
    for (title, width) in table.headers.iter().zip(widths) {
        layout.text(x, BODY_SIZE, Font::Bold, &fit(title, width - 4.0, BODY_SIZE));
        x += width;
    }
}

fn table(layout: &mut Layout, table: &ReportTable) {
    let available = PAGE_WIDTH - 2.0 * MARGIN;
    let widths = column_widths(table, available);

    layout.ensure(12.0 + 6.0 + ROW_HEIGHT * 2.0);
    layout.line(12.0, Font::Bold, &table.name, 6.0);
    table_header(layout, table, &widths);

    if table.rows.is_empty() {
        layout.line(BODY_SIZE, Font::Regular, "No data for this period.", 8.0);
    }

    for row in &table.rows {
        if layout.ensure(ROW_HEIGHT) {
            table_header(layout, table, &widths);
        }
        layout.y -= ROW_HEIGHT;
        let mut x = MARGIN + 2.0;
        for (cell, width) in row.iter().zip(&widths) {
            layout.text(x, BODY_SIZE, Font::Regular, &fit(&cell.display(), width - 4.0, BODY_SIZE));
            x += width;
        }
        let rule_y = layout.y - 4.0;
        layout.page().push(Op::Rule { x1: MARGIN, y1: rule_y, x2: PAGE_WIDTH - MARGIN, y2: rule_y });
    }
    layout.y -= 16.0;
}

fn lay_out(document: &ReportDocument) -> Vec<Vec<Op>> {
    let mut layout = Layout::new();

    layout.line(16.0, Font::Bold, &document.title, 6.0);
    layout.line(10.0, Font::Regular, &format!("Period: {}", document.period()), 4.0);
    layout.line(
        10.0,
        Font::Regular,
        &format!("Generated: {}", document.generated_at.format("%Y-%m-%d %H:%M UTC")),
        12.0,
    );

    layout.line(12.0, Font::Bold, "Summary", 6.0);
    for (label, value) in &document.summary {
        layout.ensure(14.0);
        layout.y -= 10.0;
        layout.text(MARGIN, 10.0, Font::Bold, &format!("{}:", label));
        layout.text(MARGIN + 200.0, 10.0, Font::Regular, value);
        layout.y -= 4.0;
    }
    layout.y -= 12.0;

    for section in &document.sections {
        table(&mut layout, section);
    }

    layout.pages
}

fn content_stream(ops: &[Op], page_number: usize, page_count: usize) -> String {
    let mut out = String::new();
    for op in ops {
        match op {
            Op::Text { x, y, size, font, text } => out.push_str(&format!(
                "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET\n",
                font.resource(), size, x, y, escape_text(text)
            )),
            Op::Rule { x1, y1, x2, y2 } => out.push_str(&format!(
                "0.8 G 0.4 w {:.2} {:.2} m {:.2} {:.2} l S 0 G\n",
                x1, y1, x2, y2
            )),
            Op::Shade { x, y, w, h } => out.push_str(&format!(
                "0.9 g {:.2} {:.2} {:.2} {:.2} re f 0 g\n",
                x, y, w, h
            )),
        }
    }
    let footer = format!("Page {} of {}", page_number, page_count);
    let x = (PAGE_WIDTH - footer.len() as f64 * 8.0 * CHAR_WIDTH) / 2.0;
    out.push_str(&format!("BT /F1 8.0 Tf {:.2} {:.2} Td ({}) Tj ET\n", x, FOOTER_Y, footer));
    out
}

pub fn render_pdf(document: &ReportDocument) -> Vec<u8> {
    let pages = lay_out(document);
    let page_count = pages.len();

    // 1 catalog, 2 page tree, 3-4 fonts, then (page, content) pairs
    let page_id = |i: usize| 5 + i * 2;
    let content_id = |i: usize| 6 + i * 2;

    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", page_id(i))).collect();
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string());
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_string());

    for (i, ops) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT, content_id(i)
        ));
        let stream = content_stream(ops, i + 1, page_count);
        objects.push(format!("<< /Length {} >>\nstream\n{}endstream", stream.len(), stream));
    }

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportType, Shift};
    use crate::reports::aggregate::aggregate;
    use crate::reports::document::{build, DocumentHeader};
    use crate::test_fixtures::{collection, date};

    fn document(rows: usize) -> ReportDocument {
        let collections: Vec<_> = (0..rows)
            .map(|i| {
                collection(
                    &format!("r{}", i),
                    ("Daisy (old)", &format!("T-{:03}", i % 40)),
                    date(2024, 3, 1 + (i % 28) as u32),
                    if i % 2 == 0 { Shift::Morning } else { Shift::Evening },
                    10.0,
                    Default::default(),
                )
            })
            .collect();
        let agg = aggregate(ReportType::Daily, &collections, false);
        build(
            DocumentHeader {
                title: "Daily Milk Collection Report",
                report_type: ReportType::Daily,
                date_range_start: date(2024, 3, 1),
                date_range_end: date(2024, 3, 28),
            },
            &agg,
            &collections,
        )
    }

    fn occurrences(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("Daisy (old) \\ x"), "Daisy \\(old\\) \\\\ x");
        assert_eq!(escape_text("Müller"), "M?ller");
    }

    #[test]
    fn test_fit_truncates() {
        assert_eq!(fit("short", 200.0, 10.0), "short");
        let cut = fit(&"x".repeat(100), 60.0, 10.0);
        assert_eq!(cut.chars().count(), 11);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_single_page_structure() {
        let bytes = render_pdf(&document(3));
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(Page 1 of 1) Tj"));
        assert!(text.contains("(Daily Milk Collection Report) Tj"));
        assert!(text.contains("(Daisy \\(old\\)) Tj"));
        assert!(text.contains("/Count 1"));
    }

    #[test]
    fn test_long_tables_paginate_with_repeated_headers() {
        let bytes = render_pdf(&document(150));
        let text = String::from_utf8_lossy(&bytes);

        let pages = occurrences(&text, "/Type /Page /Parent");
        assert!(pages > 1);
        assert!(text.contains(&format!("(Page {} of {}) Tj", pages, pages)));
        assert!(text.contains(&format!("/Count {}", pages)));
        // the collections table header repeats on every continuation page
        assert!(occurrences(&text, "(Amount \\(L\\)) Tj") >= pages - 1);
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = render_pdf(&document(2));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let xref_at = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let offset: usize = text[xref_at..].lines().next().unwrap().parse().unwrap();
        assert!(text[offset..].starts_with("xref"));

        let first_entry = text[offset..].lines().nth(3).unwrap();
        let obj_offset: usize = first_entry[..10].parse().unwrap();
        assert!(text[obj_offset..].starts_with("1 0 obj"));
    }
}
