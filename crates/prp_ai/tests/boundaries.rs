use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(p) = stack.pop() {
        let entries = match fs::read_dir(&p) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for ent in entries.flatten() {
            let path = ent.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn prp_core_stays_offline() {
    // Guardrail: network clients live in prp_ai only.
    let core_src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../prp_core/src");
    let files = collect_rs_files(&core_src);
    assert!(!files.is_empty());

    for f in files {
        let text = fs::read_to_string(&f).unwrap_or_default();
        assert!(!text.contains("ureq::"), "network client found in {}", f.display());
    }
}

#[test]
fn citation_parsing_is_not_reimplemented_in_prp_ai() {
    // The marker grammar has one home; AI-side code must call into it.
    let src_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    for f in collect_rs_files(&src_root) {
        let text = fs::read_to_string(&f).unwrap_or_default();
        assert!(!text.contains("Regex::new"), "ad hoc citation parsing in {}", f.display());
        assert!(!text.contains("fn match_marker_at"), "duplicate grammar in {}", f.display());
    }
}

const ERROR_CODE_GROUPS: [&str; 17] = [
    "CONFIG_",
    "CHUNK_",
    "MANIFEST_",
    "FRAGMENT_STORE_",
    "INGEST_",
    "RUN_LOG_",
    "THREAD_",
    "EVIDENCE_",
    "AI_INDEX_",
    "AI_EMBEDDINGS_",
    "AI_RETRIEVAL_",
    "AI_GENERATION_",
    "AI_REMOTE_",
    "AI_OLLAMA_",
    "CLI_",
    // Test-only codes.
    "TEST_",
    "MOCK_",
];

fn error_codes_in(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(i) = rest.find("AppError::new(") {
        rest = &rest[i + "AppError::new(".len()..];
        let trimmed = rest.trim_start();
        if let Some(lit) = trimmed.strip_prefix('"') {
            if let Some(end) = lit.find('"') {
                out.push(lit[..end].to_string());
            }
        }
    }
    out
}

#[test]
fn error_codes_stay_in_known_groups() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
    let mut files = collect_rs_files(&root.join("crates/prp_core/src"));
    files.extend(collect_rs_files(&root.join("crates/prp_ai/src")));
    files.extend(collect_rs_files(&root.join("src-cli/src")));

    let mut seen = 0;
    for f in files {
        let text = fs::read_to_string(&f).unwrap_or_default();
        for code in error_codes_in(&text) {
            seen += 1;
            assert!(
                ERROR_CODE_GROUPS.iter().any(|g| code.starts_with(g)),
                "{code} in {} is outside the error code groups",
                f.display()
            );
        }
    }
    assert!(seen > 20);
}
