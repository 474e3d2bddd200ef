//! Write-only dump of compiled queries for inspection.

use crate::compiler::CompiledDocument;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, warn};

/// Writes every compiled document to `<dir>/<Type>.graphql`.
///
/// Failures are logged and skipped. Returns the number of files written.
pub async fn write_compiled_queries(dir: &Path, documents: &IndexMap<String, CompiledDocument>) -> usize {
    if let Err(error) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), %error, "cannot create debug directory");
        return 0;
    }

    let mut written = 0;
    for (type_name, document) in documents {
        let path = dir.join(format!("{type_name}.graphql"));
        match tokio::fs::write(&path, format!("{}\n", document.query)).await {
            Ok(()) => written += 1,
            Err(error) => warn!(path = %path.display(), %error, "cannot write compiled query"),
        }
    }
    debug!(dir = %dir.display(), written, "dumped compiled queries");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlsrc_syntax::Document;

    fn document(name: &str) -> CompiledDocument {
        CompiledDocument {
            remote_type_name: name.into(),
            document: Document::default(),
            operations: Vec::new(),
            is_interface: false,
            query: format!("fragment {name} on {name} {{\n  id\n}}"),
        }
    }

    #[tokio::test]
    async fn test_writes_one_file_per_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut documents = IndexMap::new();
        documents.insert("Article".to_string(), document("Article"));
        documents.insert("Tag".to_string(), document("Tag"));

        let target = dir.path().join("queries");
        assert_eq!(write_compiled_queries(&target, &documents).await, 2);
        let text = std::fs::read_to_string(target.join("Tag.graphql")).unwrap();
        assert_eq!(text, "fragment Tag on Tag {\n  id\n}\n");
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "").unwrap();

        let mut documents = IndexMap::new();
        documents.insert("Article".to_string(), document("Article"));
        assert_eq!(write_compiled_queries(&file, &documents).await, 0);
    }
}
