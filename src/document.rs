//! Knowledge base loader.

use anyhow::{Context, Result};
use kbqa_core::models::Document;
use kbqa_core::qa::QaError;
use std::path::Path;

/// Read the knowledge base file into a [`Document`].
///
/// A missing file is a [`QaError::Configuration`] so callers can tell it
/// apart from I/O failures on a file that does exist.
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(QaError::Configuration(format!(
            "'{}' not found. Please create it.",
            path.display()
        ))
        .into());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge base: {}", path.display()))?;

    Ok(Document::new(path.display().to_string(), text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.txt");
        std::fs::write(&path, "Ferris is a crab.").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.text, "Ferris is a crab.");
        assert_eq!(doc.source, path.display().to_string());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_document(&tmp.path().join("nope.txt")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QaError>(),
            Some(QaError::Configuration(_))
        ));
        assert!(err.to_string().contains("nope.txt"));
    }
}
