// src/store/persist.rs

//! Read-merge-write helpers for the shared snapshot document.
//!
//! The document is a JSON object whose top-level keys are namespaces owned by
//! different writers. A writer only ever replaces its own keys; everything
//! else found on disk is carried over untouched.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::fs::FileSystem;

/// Read the current document. Missing, unreadable or non-object content is
/// treated as an empty document.
pub fn read_document(fs: &dyn FileSystem, path: &Path) -> Map<String, Value> {
    if !fs.exists(path) {
        return Map::new();
    }

    let raw = match fs.read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "state file unreadable; treating as empty");
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(path = %path.display(), "state file is not a JSON object; treating as empty");
            Map::new()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "state file corrupt; treating as empty");
            Map::new()
        }
    }
}

/// Overlay `sections` onto the on-disk document and atomically write it back.
pub fn merge_and_write(
    fs: &dyn FileSystem,
    path: &Path,
    sections: Map<String, Value>,
) -> Result<()> {
    let mut merged = read_document(fs, path);
    let keys: Vec<String> = sections.keys().cloned().collect();
    merged.extend(sections);

    let mut buf = serde_json::to_vec_pretty(&Value::Object(merged))
        .context("serializing state document")?;
    buf.push(b'\n');
    fs.write_atomic(path, &buf)?;

    debug!(path = %path.display(), ?keys, "state document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use serde_json::json;

    #[test]
    fn merge_preserves_foreign_keys() {
        let fs = MockFileSystem::new();
        let path = Path::new("state.json");
        fs.add_file(path, r#"{"goals": [1, 2], "logs": ["old"]}"#);

        let mut sections = Map::new();
        sections.insert("logs".into(), json!(["new"]));
        merge_and_write(&fs, path, sections).unwrap();

        let doc = read_document(&fs, path);
        assert_eq!(doc["goals"], json!([1, 2]));
        assert_eq!(doc["logs"], json!(["new"]));
    }

    #[test]
    fn corrupt_or_non_object_documents_read_as_empty() {
        let fs = MockFileSystem::new();
        fs.add_file("a.json", "{not json");
        fs.add_file("b.json", "[1, 2, 3]");
        assert!(read_document(&fs, Path::new("a.json")).is_empty());
        assert!(read_document(&fs, Path::new("b.json")).is_empty());
        assert!(read_document(&fs, Path::new("missing.json")).is_empty());
    }
}
