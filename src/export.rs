//! Spreadsheet export of the result table.
//!
//! Serializes the session's [`ResultTable`] into a single-sheet XLSX
//! package: header row with the fixed human-readable column labels, one
//! row per record in insertion order, all cells as inline strings. The
//! package is assembled directly (`zip` container + `quick-xml` parts),
//! the mirror image of how OOXML worksheets are read elsewhere in the
//! pipeline's ecosystem.

use anyhow::Result;
use chrono::{DateTime, Local};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::models::{ResultTable, FIELD_COLUMNS, FILE_NAME_COLUMN, PROCESSED_AT_COLUMN};

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Column labels in export order: the eight field labels, then file name,
/// then processing timestamp.
pub fn headers() -> Vec<&'static str> {
    FIELD_COLUMNS
        .iter()
        .map(|(_, label)| *label)
        .chain([FILE_NAME_COLUMN, PROCESSED_AT_COLUMN])
        .collect()
}

/// Export file-name convention: `{prefix}_{YYYYMMDD_HHMMSS}.xlsx`.
pub fn export_file_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.xlsx", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Serialize the table to an XLSX byte stream with a single named sheet.
pub fn write_xlsx(table: &ResultTable, sheet_name: &str) -> Result<Vec<u8>> {
    let workbook = workbook_xml(sheet_name)?;
    let worksheet = worksheet_xml(table)?;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS_XML.as_bytes())?;
        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(&workbook)?;
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(WORKBOOK_RELS_XML.as_bytes())?;
        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(&worksheet)?;

        zip.finish()?;
    }
    Ok(buf)
}

/// Write the export next to `out` and return the final path.
///
/// When `out` is an existing directory the conventional timestamped file
/// name is generated inside it; otherwise `out` is used as the file path.
pub fn run_export(export: &ExportConfig, table: &ResultTable, out: &Path) -> Result<PathBuf> {
    let path = if out.is_dir() {
        out.join(export_file_name(&export.file_prefix, Local::now()))
    } else {
        out.to_path_buf()
    };

    let bytes = write_xlsx(table, &export.sheet_name)?;
    std::fs::write(&path, &bytes)?;
    eprintln!("Exported {} records to {}", table.len(), path.display());
    Ok(path)
}

fn workbook_xml(sheet_name: &str) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("workbook");
    root.push_attribute(("xmlns", SPREADSHEET_NS));
    root.push_attribute(("xmlns:r", RELATIONSHIPS_NS));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("sheets")))?;
    let mut sheet = BytesStart::new("sheet");
    sheet.push_attribute(("name", sheet_name));
    sheet.push_attribute(("sheetId", "1"));
    sheet.push_attribute(("r:id", "rId1"));
    writer.write_event(Event::Empty(sheet))?;
    writer.write_event(Event::End(BytesEnd::new("sheets")))?;

    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(writer.into_inner().into_inner())
}

fn worksheet_xml(table: &ResultTable) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", SPREADSHEET_NS));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

    write_row(&mut writer, 1, &headers())?;

    for (i, record) in table.records().iter().enumerate() {
        let timestamp = record.processed_at_display();
        let mut cells: Vec<&str> = record.fields.values().to_vec();
        cells.push(&record.file_name);
        cells.push(&timestamp);
        write_row(&mut writer, i as u32 + 2, &cells)?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner().into_inner())
}

/// One worksheet row of inline-string cells.
fn write_row<W: Write>(writer: &mut Writer<W>, index: u32, cells: &[&str]) -> Result<()> {
    let mut row = BytesStart::new("row");
    let r = index.to_string();
    row.push_attribute(("r", r.as_str()));
    writer.write_event(Event::Start(row))?;

    for cell in cells {
        let mut c = BytesStart::new("c");
        c.push_attribute(("t", "inlineStr"));
        writer.write_event(Event::Start(c))?;
        writer.write_event(Event::Start(BytesStart::new("is")))?;
        writer.write_event(Event::Start(BytesStart::new("t")))?;
        writer.write_event(Event::Text(BytesText::new(cell)))?;
        writer.write_event(Event::End(BytesEnd::new("t")))?;
        writer.write_event(Event::End(BytesEnd::new("is")))?;
        writer.write_event(Event::End(BytesEnd::new("c")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldSet, ResultRecord};
    use chrono::TimeZone;

    fn sample_table(rows: usize) -> ResultTable {
        let at = Local.with_ymd_and_hms(2024, 3, 12, 14, 5, 9).unwrap();
        let mut table = ResultTable::new();
        for i in 0..rows {
            let fields = FieldSet {
                customer_company: "TÜPRAŞ".into(),
                service_engineer: format!("Engineer {}", i),
                ..Default::default()
            };
            table.push(ResultRecord::new(fields, format!("rapor_{}.pdf", i), at));
        }
        table
    }

    /// Pull every inline-string cell out of the worksheet, row by row.
    fn read_back_rows(xlsx: &[u8]) -> Vec<Vec<String>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(xlsx)).unwrap();
        let mut xml = Vec::new();
        std::io::Read::read_to_end(
            &mut archive.by_name("xl/worksheets/sheet1.xml").unwrap(),
            &mut xml,
        )
        .unwrap();

        let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
        let mut buf = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut in_t = false;
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) if e.local_name().as_ref() == b"row" => rows.push(Vec::new()),
                Event::Start(e) if e.local_name().as_ref() == b"t" => {
                    // Push the cell up front so empty <t></t> keeps its slot.
                    rows.last_mut().unwrap().push(String::new());
                    in_t = true;
                }
                Event::Text(t) if in_t => {
                    *rows.last_mut().unwrap().last_mut().unwrap() =
                        t.unescape().unwrap().into_owned();
                }
                Event::End(e) if e.local_name().as_ref() == b"t" => in_t = false,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        rows
    }

    #[test]
    fn header_order_is_fixed() {
        let headers = headers();
        assert_eq!(headers.len(), 10);
        assert_eq!(headers[0], "Geri Yükleme Zamanı");
        assert_eq!(headers[7], "Ekipman No");
        assert_eq!(headers[8], FILE_NAME_COLUMN);
        assert_eq!(headers[9], PROCESSED_AT_COLUMN);
    }

    #[test]
    fn row_count_matches_record_count() {
        let table = sample_table(3);
        let xlsx = write_xlsx(&table, "PDF Analiz Sonuçları").unwrap();
        let rows = read_back_rows(&xlsx);
        // Header plus one row per record.
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], headers());
    }

    #[test]
    fn rows_preserve_insertion_order_and_values() {
        let table = sample_table(2);
        let xlsx = write_xlsx(&table, "Sonuçlar").unwrap();
        let rows = read_back_rows(&xlsx);
        assert_eq!(rows[1][3], "TÜPRAŞ");
        assert_eq!(rows[1][5], "Engineer 0");
        assert_eq!(rows[2][5], "Engineer 1");
        assert_eq!(rows[1][8], "rapor_0.pdf");
        assert_eq!(rows[1][9], "2024-03-12 14:05:09");
    }

    #[test]
    fn empty_table_exports_header_only() {
        let xlsx = write_xlsx(&ResultTable::new(), "Sonuçlar").unwrap();
        let rows = read_back_rows(&xlsx);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn file_name_convention_includes_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 12, 14, 5, 9).unwrap();
        assert_eq!(
            export_file_name("pdf_analiz_sonuclari", at),
            "pdf_analiz_sonuclari_20240312_140509.xlsx"
        );
    }

    #[test]
    fn export_to_directory_uses_convention() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table(1);
        let path = run_export(&ExportConfig::default(), &table, dir.path()).unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("pdf_analiz_sonuclari_"));
    }

    /// Empty-field rows keep their cell count so columns stay aligned.
    #[test]
    fn blank_fields_still_emit_cells() {
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut table = ResultTable::new();
        table.push(ResultRecord::new(FieldSet::default(), "x.pdf", at));
        let xlsx = write_xlsx(&table, "Sonuçlar").unwrap();
        let rows = read_back_rows(&xlsx);
        assert_eq!(rows[1].len(), 10);
        assert!(rows[1][..8].iter().all(|c| c.is_empty()));
        assert_eq!(rows[1][8], "x.pdf");
        assert_eq!(rows[1][9], "2024-01-01 00:00:00");
    }
}
