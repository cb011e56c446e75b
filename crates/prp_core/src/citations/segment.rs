use crate::domain::{CitationMarker, Claim};

use super::{scan_markers, strip_reference_section, MarkerMatch};

/// Claims shorter than this (in characters) are treated as noise by the evidence table.
pub const MIN_CLAIM_CHARS: usize = 10;

/// Split an answer body into claims with the markers that cite them.
///
/// Per paragraph (blank-line separated, reference section removed):
/// - no markers: the whole paragraph is one uncited claim, unless it is a list item;
/// - text before a marker belongs to that marker, even when it is only punctuation;
/// - a marker with nothing before it cites the span up to the next marker;
/// - text after the final marker is a claim cited by the final marker.
///
/// Every byte of a paragraph outside markers lands in at most one claim. Segments with no
/// alphanumeric content are dropped; the length threshold is applied by
/// [`significant_claims`].
pub fn segment_claims(answer: &str) -> Vec<Claim> {
    let body = strip_reference_section(answer);
    let mut out = Vec::new();
    for para in paragraphs(body) {
        let markers = scan_markers(&para);
        if markers.is_empty() {
            if !is_list_item(&para) {
                if let Some(text) = clean_claim_text(&para) {
                    out.push(Claim {
                        text,
                        citations: Vec::new(),
                    });
                }
            }
            continue;
        }
        out.extend(ParagraphScanner::new(&para, markers).run());
    }
    out
}

/// [`segment_claims`] without claims shorter than [`MIN_CLAIM_CHARS`].
pub fn significant_claims(answer: &str) -> Vec<Claim> {
    segment_claims(answer)
        .into_iter()
        .filter(|c| c.text.chars().count() >= MIN_CLAIM_CHARS)
        .collect()
}

fn paragraphs(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n").trim().to_string());
    }
    out
}

fn is_list_item(para: &str) -> bool {
    para.starts_with('-') || para.starts_with("* ") || para.starts_with("+ ")
}

/// Trim whitespace and punctuation left over from the previous sentence.
fn clean_claim_text(raw: &str) -> Option<String> {
    let t = raw
        .trim()
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':'))
        .trim();
    if t.chars().any(char::is_alphanumeric) {
        Some(t.to_string())
    } else {
        None
    }
}

struct ParagraphScanner<'a> {
    para: &'a str,
    markers: Vec<MarkerMatch>,
    /// First byte not yet assigned to a claim.
    cursor: usize,
    claims: Vec<Claim>,
}

impl<'a> ParagraphScanner<'a> {
    fn new(para: &'a str, markers: Vec<MarkerMatch>) -> Self {
        Self {
            para,
            markers,
            cursor: 0,
            claims: Vec::new(),
        }
    }

    fn push(&mut self, raw: &str, marker: &CitationMarker) {
        if let Some(text) = clean_claim_text(raw) {
            self.claims.push(Claim {
                text,
                citations: vec![marker.clone()],
            });
        }
    }

    fn run(mut self) -> Vec<Claim> {
        let para = self.para;
        let markers = std::mem::take(&mut self.markers);
        for (i, m) in markers.iter().enumerate() {
            let before = if self.cursor < m.start {
                &para[self.cursor..m.start]
            } else {
                ""
            };

            if !before.trim().is_empty() {
                self.push(before, &m.marker);
                self.cursor = m.end;
                continue;
            }

            // Nothing precedes this marker: it describes what follows.
            let span_end = markers
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(para.len());
            let after = &para[m.end..span_end];
            if after.chars().any(char::is_alphanumeric) {
                self.push(after, &m.marker);
                self.cursor = span_end;
            } else {
                self.cursor = m.end;
            }
        }

        if self.cursor < para.len() {
            if let Some(last) = markers.last() {
                let rest = &para[self.cursor..];
                self.push(rest, &last.marker);
            }
        }
        self.claims
    }
}
