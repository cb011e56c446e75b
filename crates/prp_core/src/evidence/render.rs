use serde::{Deserialize, Serialize};

use crate::domain::EvidenceRow;
use crate::error::AppError;

pub const COLUMN_HEADERS: [&str; 5] = ["Claim", "Evidence snippet", "Citation", "Confidence", "Notes"];
pub const CSV_HEADERS: [&str; 5] = ["claim", "evidence_snippet", "citation", "confidence", "notes"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceFormat {
    Markdown,
    Csv,
    Html,
}

impl EvidenceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            EvidenceFormat::Markdown => "md",
            EvidenceFormat::Csv => "csv",
            EvidenceFormat::Html => "html",
        }
    }

    pub fn render(&self, rows: &[EvidenceRow]) -> Result<String, AppError> {
        match self {
            EvidenceFormat::Markdown => Ok(render_markdown(rows)),
            EvidenceFormat::Csv => render_csv(rows),
            EvidenceFormat::Html => Ok(render_html(rows, "Evidence Table")),
        }
    }
}

/// Keep at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn md_cell(s: &str, max_chars: usize) -> String {
    let flat = s.replace(['\r', '\n'], " ");
    truncate_chars(&flat, max_chars).replace('|', "\\|")
}

pub fn render_markdown(rows: &[EvidenceRow]) -> String {
    if rows.is_empty() {
        return "No evidence rows extracted.".to_string();
    }
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", COLUMN_HEADERS.join(" | ")));
    lines.push("|-------|------------------|----------|------------|-------|".to_string());
    for r in rows {
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            md_cell(&r.claim, 150),
            md_cell(&r.evidence_snippet, 200),
            md_cell(&r.citation, 120),
            r.confidence.as_str(),
            md_cell(&r.notes, 80),
        ));
    }
    lines.join("\n")
}

/// CSV keeps row fields whole; the snippet budget was applied when the rows were built.
pub fn render_csv(rows: &[EvidenceRow]) -> Result<String, AppError> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);
    wtr.write_record(CSV_HEADERS).map_err(|e| {
        AppError::new("EVIDENCE_EXPORT_FAILED", "Failed to write CSV header")
            .with_details(e.to_string())
    })?;
    for r in rows {
        wtr.write_record([
            r.claim.as_str(),
            r.evidence_snippet.as_str(),
            r.citation.as_str(),
            r.confidence.as_str(),
            r.notes.as_str(),
        ])
        .map_err(|e| {
            AppError::new("EVIDENCE_EXPORT_FAILED", "Failed to write CSV row")
                .with_details(e.to_string())
        })?;
    }
    let bytes = wtr.into_inner().map_err(|e| {
        AppError::new("EVIDENCE_EXPORT_FAILED", "Failed to flush CSV output")
            .with_details(e.to_string())
    })?;
    String::from_utf8(bytes).map_err(|e| {
        AppError::new("EVIDENCE_EXPORT_FAILED", "CSV output was not UTF-8")
            .with_details(e.to_string())
    })
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn html_cell(s: &str, max_chars: usize) -> String {
    html_escape(&truncate_chars(s, max_chars))
}

/// Standalone HTML page suitable for print-to-PDF.
pub fn render_html(rows: &[EvidenceRow], title: &str) -> String {
    let title = html_escape(title);
    if rows.is_empty() {
        return format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
<body>\n<h1>{title}</h1>\n<p>No evidence rows.</p>\n</body>\n</html>\n"
        );
    }

    let mut cells = Vec::with_capacity(rows.len() + 1);
    cells.push(format!(
        "<tr>{}</tr>",
        COLUMN_HEADERS
            .iter()
            .map(|h| format!("<th>{h}</th>"))
            .collect::<String>()
    ));
    for r in rows {
        cells.push(format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_cell(&r.claim, 200),
            html_cell(&r.evidence_snippet, 300),
            html_cell(&r.citation, 120),
            r.confidence.as_str(),
            html_cell(&r.notes, 80),
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
<body>\n<h1>{title}</h1>\n\
<table border=\"1\" cellpadding=\"8\" style=\"border-collapse:collapse\">\n{}\n</table>\n\
<p><small>Use File &rarr; Print &rarr; Save as PDF to archive this table.</small></p>\n\
</body>\n</html>\n",
        cells.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;

    fn row(claim: &str, evidence: &str, confidence: Confidence) -> EvidenceRow {
        EvidenceRow {
            claim: claim.to_string(),
            evidence_snippet: evidence.to_string(),
            citation: "(S, S_chunk_00)".to_string(),
            confidence,
            notes: String::new(),
        }
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("ééééé", 3), "ééé...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn markdown_escapes_pipes_and_newlines() {
        let md = render_markdown(&[row("a | b\nc", "ev", Confidence::High)]);
        let line = md.lines().nth(2).unwrap();
        assert_eq!(line, "| a \\| b c | ev | (S, S_chunk_00) | high |  |");
    }

    #[test]
    fn csv_quotes_structural_characters() {
        let csv = render_csv(&[row("a, \"b\"", "line1\nline2", Confidence::Low)]).unwrap();
        assert!(csv.starts_with("claim,evidence_snippet,citation,confidence,notes\n"));
        assert!(csv.contains("\"a, \"\"b\"\"\",\"line1\nline2\",\"(S, S_chunk_00)\",low,"));
    }

    #[test]
    fn html_escapes_markup() {
        let html = render_html(&[row("<script>", "a & b", Confidence::High)], "T");
        assert!(html.contains("<td>&lt;script&gt;</td><td>a &amp; b</td>"));
        assert!(html.contains("<title>T</title>"));
    }

    #[test]
    fn empty_tables_render_placeholders() {
        assert_eq!(render_markdown(&[]), "No evidence rows extracted.");
        assert_eq!(
            render_csv(&[]).unwrap(),
            "claim,evidence_snippet,citation,confidence,notes\n"
        );
        assert!(render_html(&[], "Evidence Table").contains("No evidence rows."));
    }
}
