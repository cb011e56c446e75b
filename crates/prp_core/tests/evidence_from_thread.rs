use pretty_assertions::assert_eq;

use prp_core::domain::Confidence;
use prp_core::evidence::{build_evidence_table, render_csv, render_html, render_markdown};
use prp_core::thread::ResearchThread;

const THREAD: &str = r#"{
  "thread_id": "T_20260101_000000",
  "query_id": "Q_1a2b3c4d",
  "query": "How is faithfulness measured?",
  "retrieved_chunks": [
    {"chunk_id": "RAGAS2023_chunk_02", "source_id": "RAGAS2023", "text": "Faithfulness is the fraction of claims supported by the context.", "chunk_index": 2, "score": 0.41},
    {"chunk_id": "ARES2023_chunk_00", "source_id": "ARES2023", "text": "ARES trains lightweight judges | with synthetic data.", "chunk_index": 0, "score": 0.52}
  ],
  "answer": "Faithfulness counts supported claims (RAGAS2023, RAGAS2023_chunk_02). Judges can be trained on synthetic data (ARES2023). Some systems also use human raters (HUMAN2022, HUMAN2022_chunk_01).\n\nNothing here is cited at all in this paragraph.\n\n## References\n\n- **RAGAS2023**: RAGAS.",
  "timestamp": "2026-01-01T00:00:00Z"
}"#;

#[test]
fn thread_record_yields_rows_in_claim_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("T_20260101_000000.json");
    std::fs::write(&path, THREAD).unwrap();
    let thread = ResearchThread::from_json_file(&path).expect("thread");

    let rows = build_evidence_table(&thread);
    let summary: Vec<(&str, Confidence)> = rows
        .iter()
        .map(|r| (r.citation.as_str(), r.confidence))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("(RAGAS2023, RAGAS2023_chunk_02)", Confidence::High),
            ("(ARES2023, ARES2023_chunk_00)", Confidence::High),
            ("(HUMAN2022, HUMAN2022_chunk_01)", Confidence::Low),
            ("", Confidence::Low),
        ]
    );
    assert_eq!(rows[0].claim, "Faithfulness counts supported claims");
    assert_eq!(rows[3].notes, "No inline citation");
    // The reference section is not mined for claims.
    assert!(rows.iter().all(|r| !r.claim.contains("**RAGAS2023**")));
}

#[test]
fn all_formats_carry_the_same_rows_in_the_same_order() {
    let thread: ResearchThread = serde_json::from_str(THREAD).unwrap();
    let rows = build_evidence_table(&thread);

    let md = render_markdown(&rows);
    let md_rows: Vec<&str> = md.lines().skip(2).collect();
    assert_eq!(md_rows.len(), rows.len());
    assert!(md_rows[1].contains("ARES trains lightweight judges \\| with synthetic data."));

    let csv = render_csv(&rows).unwrap();
    let mut rdr = csv::Reader::from_reader(csv.as_bytes());
    let csv_claims: Vec<String> = rdr
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect();
    let claims: Vec<String> = rows.iter().map(|r| r.claim.clone()).collect();
    assert_eq!(csv_claims, claims);

    let html = render_html(&rows, "Evidence Table");
    assert_eq!(html.matches("<tr><td>").count(), rows.len());
    let first = html.find("Faithfulness counts").unwrap();
    let last = html.find("Nothing here is cited").unwrap();
    assert!(first < last);
}

#[test]
fn refusal_answer_produces_no_cited_rows() {
    let thread = ResearchThread {
        thread_id: String::new(),
        query_id: String::new(),
        query: "unrelated".to_string(),
        retrieved_chunks: vec![],
        answer: "The corpus does not contain evidence for this.".to_string(),
        timestamp: String::new(),
    };
    let rows = build_evidence_table(&thread);
    assert!(rows.iter().all(|r| r.citation.is_empty()));
}
