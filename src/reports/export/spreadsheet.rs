// src/reports/export/spreadsheet.rs
//! Minimal SpreadsheetML writer: one zip container, inline strings,
//! a bold style for header rows.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ApiResult;
use crate::reports::document::{Cell, ReportDocument, ReportTable};

const CONTENT_TYPES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

const BOLD: u8 = 1;

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Zero-based column index to `A`, `B`, ... `AA`.
pub(crate) fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Sheet names: at most 31 chars, none of `[]:*?/\`, unique in the workbook.
fn sheet_name(raw: &str, taken: &[String]) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    let base = if cleaned.trim().is_empty() { "Sheet".to_string() } else { cleaned };

    let mut candidate = base.clone();
    let mut n = 2;
    while taken.iter().any(|t| t.eq_ignore_ascii_case(&candidate)) {
        let suffix = format!(" ({})", n);
        let keep = 31usize.saturating_sub(suffix.len());
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    candidate
}

fn text_cell(reference: &str, value: &str, style: Option<u8>) -> String {
    let style = style.map(|s| format!(" s=\"{}\"", s)).unwrap_or_default();
    format!(
        "<c r=\"{}\" t=\"inlineStr\"{}><is><t xml:space=\"preserve\">{}</t></is></c>",
        reference,
        style,
        escape_xml(value)
    )
}

fn cell_xml(reference: &str, cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Number(v) if v.is_finite() => Some(format!("<c r=\"{}\"><v>{}</v></c>", reference, (v * 100.0).round() / 100.0)),
        Cell::Count(v) if v.is_finite() => Some(format!("<c r=\"{}\"><v>{}</v></c>", reference, v.round())),
        Cell::Percent(v) if v.is_finite() => Some(format!("<c r=\"{}\"><v>{}</v></c>", reference, (v * 100.0).round() / 100.0)),
        Cell::Measured(v) if v.is_finite() => Some(format!("<c r=\"{}\"><v>{}</v></c>", reference, v)),
        other => Some(text_cell(reference, &other.display(), None)),
    }
}

fn sheet_xml(header: &[String], rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str("<row r=\"1\">");
    for (col, title) in header.iter().enumerate() {
        xml.push_str(&text_cell(&format!("{}1", column_name(col)), title, Some(BOLD)));
    }
    xml.push_str("</row>");

    for (i, row) in rows.iter().enumerate() {
        let r = i + 2;
        xml.push_str(&format!("<row r=\"{}\">", r));
        for (col, cell) in row.iter().enumerate() {
            if let Some(c) = cell_xml(&format!("{}{}", column_name(col), r), cell) {
                xml.push_str(&c);
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn summary_sheet(document: &ReportDocument) -> (Vec<String>, Vec<Vec<Cell>>) {
    let mut rows = vec![
        vec![Cell::text("Report"), Cell::text(&document.title)],
        vec![Cell::text("Period"), Cell::text(document.period())],
        vec![
            Cell::text("Generated"),
            Cell::text(document.generated_at.format("%Y-%m-%d %H:%M UTC").to_string()),
        ],
    ];
    rows.extend(
        document
            .summary
            .iter()
            .map(|(label, value)| vec![Cell::text(label), Cell::text(value)]),
    );
    (vec!["Metric".to_string(), "Value".to_string()], rows)
}

/// Summary sheet first, then one sheet per section.
pub fn render_xlsx(document: &ReportDocument) -> ApiResult<Vec<u8>> {
    let (summary_header, summary_rows) = summary_sheet(document);

    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut names: Vec<String> = Vec::new();

    let mut push = |raw_name: &str, xml: String, names: &mut Vec<String>| {
        let name = sheet_name(raw_name, names);
        names.push(name.clone());
        sheets.push((name, xml));
    };
    push("Summary", sheet_xml(&summary_header, &summary_rows), &mut names);
    for ReportTable { name, headers, rows } in &document.sections {
        push(name.as_str(), sheet_xml(headers, rows), &mut names);
    }

    let mut content_types = String::from(CONTENT_TYPES_HEAD);
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut workbook_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for (i, (name, _)) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
            n
        ));
        workbook.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
            escape_xml(name), n, n
        ));
        workbook_rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
            n, n
        ));
    }
    let styles_id = sheets.len() + 1;
    workbook_rels.push_str(&format!(
        "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
        styles_id
    ));
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    workbook_rels.push_str("</Relationships>");

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, &str); 5] = [
            ("[Content_Types].xml", &content_types),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", &workbook),
            ("xl/_rels/workbook.xml.rels", &workbook_rels),
            ("xl/styles.xml", STYLES),
        ];
        for (path, body) in parts {
            zip.start_file(path, options)?;
            zip.write_all(body.as_bytes())?;
        }
        for (i, (_, xml)) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
            zip.write_all(xml.as_bytes())?;
        }
        zip.finish()?;
    }

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use crate::models::{ReportType, Shift};
    use crate::reports::aggregate::aggregate;
    use crate::reports::document::{build, DocumentHeader};
    use crate::test_fixtures::{collection, date};

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_sheet_names_are_sanitized_and_unique() {
        let taken = vec!["Summary".to_string()];
        assert_eq!(sheet_name("summary", &taken), "summary (2)");
        assert_eq!(sheet_name("Fat/Protein [avg]", &[]), "Fat_Protein _avg_");
        assert_eq!(sheet_name(&"x".repeat(40), &[]).len(), 31);
    }

    #[test]
    fn test_workbook_reads_back() {
        let rows = vec![
            collection("a", ("Daisy & Co", "T-001"), date(2024, 3, 4), Shift::Morning, 12.5, Default::default()),
            collection("b", ("Bella", "T-002"), date(2024, 3, 5), Shift::Evening, 9.25, Default::default()),
        ];
        let agg = aggregate(ReportType::Weekly, &rows, false);
        let doc = build(
            DocumentHeader {
                title: "Weekly Production Report",
                report_type: ReportType::Weekly,
                date_range_start: date(2024, 3, 4),
                date_range_end: date(2024, 3, 10),
            },
            &agg,
            &rows,
        );

        let bytes = render_xlsx(&doc).unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();

        let names = workbook.sheet_names().to_vec();
        assert_eq!(names, vec!["Summary", "Daily Totals", "Top Producers"]);

        let summary = workbook.worksheet_range("Summary").unwrap();
        let first: Vec<String> = summary.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(first, vec!["Metric", "Value"]);
        assert_eq!(summary.get_value((1, 1)), Some(&Data::String("Weekly Production Report".into())));

        let days = workbook.worksheet_range("Daily Totals").unwrap();
        assert_eq!(days.height(), 3);
        assert_eq!(days.get_value((1, 3)), Some(&Data::Float(12.5)));

        let top = workbook.worksheet_range("Top Producers").unwrap();
        assert_eq!(top.get_value((1, 1)), Some(&Data::String("Daisy & Co".into())));
    }
}
