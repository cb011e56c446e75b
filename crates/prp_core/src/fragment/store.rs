use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::Fragment;
use crate::error::AppError;

/// Write the fragment store as JSON lines, one fragment per line.
///
/// Written to a sibling `.tmp` file first and renamed into place.
pub fn write_fragments(path: &Path, fragments: &[Fragment]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(
                "FRAGMENT_STORE_WRITE_FAILED",
                "Failed to create fragment store directory",
            )
            .with_details(format!("path={}; err={}", parent.display(), e))
        })?;
    }

    let mut buf: Vec<u8> = Vec::new();
    for f in fragments {
        serde_json::to_writer(&mut buf, f).map_err(|e| {
            AppError::new("FRAGMENT_STORE_WRITE_FAILED", "Failed to encode fragment")
                .with_details(format!("chunk_id={}; err={}", f.fragment_id, e))
        })?;
        buf.push(b'\n');
    }

    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).map_err(|e| {
        AppError::new("FRAGMENT_STORE_WRITE_FAILED", "Failed to create fragment store")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    file.write_all(&buf).map_err(|e| {
        AppError::new("FRAGMENT_STORE_WRITE_FAILED", "Failed to write fragment store")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new(
            "FRAGMENT_STORE_WRITE_FAILED",
            "Failed to finalize fragment store write",
        )
        .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}

pub fn read_fragments(path: &Path) -> Result<Vec<Fragment>, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            "FRAGMENT_STORE_NOT_FOUND",
            "Fragment store not found; run ingestion first",
        )
        .with_details(format!("path={}", path.display())));
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::new("FRAGMENT_STORE_READ_FAILED", "Failed to read fragment store")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;

    let mut out = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let f: Fragment = serde_json::from_str(line).map_err(|e| {
            AppError::new("FRAGMENT_STORE_READ_FAILED", "Failed to decode fragment record")
                .with_details(format!("path={}; line={}; err={}", path.display(), i + 1, e))
        })?;
        out.push(f);
    }
    Ok(out)
}
