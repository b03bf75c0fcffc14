//! Corpus enumeration and document loading.

use std::path::Path;

use walkdir::WalkDir;

use crate::core::errors::AgentError;

/// A raw document with its provenance. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source: String,
}

/// Load every document under `dir` whose extension matches `extension`
/// (case-insensitive, without the leading dot). Enumeration order is
/// sorted so repeated builds see the corpus identically.
///
/// A corpus that yields zero readable documents is an error: an empty
/// index would silently answer every question with "no context".
pub fn load_documents(dir: &Path, extension: &str) -> Result<Vec<Document>, AgentError> {
    if !dir.is_dir() {
        return Err(AgentError::Corpus(format!(
            "corpus path is not a readable directory: {}",
            dir.display()
        )));
    }

    let mut documents = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok());

    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let source = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();

        match std::fs::read_to_string(entry.path()) {
            Ok(text) if !text.trim().is_empty() => documents.push(Document { text, source }),
            Ok(_) => tracing::debug!("skipping empty document: {}", source),
            Err(err) => tracing::warn!("skipping unreadable document {}: {}", source, err),
        }
    }

    if documents.is_empty() {
        return Err(AgentError::Corpus(format!(
            "no .{} documents found under {}",
            extension,
            dir.display()
        )));
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_matching_documents_with_relative_provenance() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.md"), "conteúdo A").unwrap();
        std::fs::write(dir.path().join("sub/b.md"), "conteúdo B").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "não é markdown").unwrap();

        let docs = load_documents(dir.path(), "md").expect("corpus loads");
        assert_eq!(docs.len(), 2);
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert!(sources.contains(&"a.md"));
        assert!(sources.iter().any(|s| s.ends_with("b.md")));
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_documents(dir.path(), "md").unwrap_err();
        assert!(matches!(err, AgentError::Corpus(_)));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_documents(Path::new("/definitely/not/here"), "md").unwrap_err();
        assert!(matches!(err, AgentError::Corpus(_)));
    }
}
