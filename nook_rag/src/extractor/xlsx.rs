//! XLSX/XLS text extraction: one `=== sheet ===` section per sheet, rows
//! TAB-joined (spec.md §4.1). Unreadable sheets are skipped, not fatal.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::Extractor;
use crate::error::{RagError, Result};

pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| RagError::Extraction(format!("failed to open workbook: {e}")))?;

        let mut out = String::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            let Ok(range) = workbook.worksheet_range(&sheet_name) else {
                continue;
            };
            out.push_str(&format!("=== {sheet_name} ===\n"));
            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                out.push_str(&cells.join("\t"));
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn mime_type(&self) -> &'static str {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    }
}

fn cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERROR:{e:?}"),
    }
}
