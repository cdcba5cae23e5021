use std::path::Path;

use juriaid_common::orchestrator::CaseDocument;

use crate::error::AppError;

/// MIME type for the document kinds the intake form accepts.
fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Read a case document from disk, refusing files above `max_bytes`.
pub async fn load(
    path: &Path,
    mime_override: Option<&str>,
    max_bytes: u64,
) -> Result<CaseDocument, AppError> {
    let io_err = |source| AppError::Document {
        path: path.to_path_buf(),
        source,
    };

    let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
    if size > max_bytes {
        return Err(AppError::DocumentTooLarge {
            path: path.to_path_buf(),
            size,
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(io_err)?;
    let name = path.file_name().and_then(|n| n.to_str());
    let mime = mime_override.or_else(|| mime_for(path));
    Ok(CaseDocument::new(name, mime, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn loads_text_document_with_inferred_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Plaint.TXT");
        std::fs::write(&path, "The defendant left the matrimonial home.").unwrap();

        let doc = load(&path, None, 1024).await.unwrap();
        assert_eq!(doc.name, "Plaint.TXT");
        assert_eq!(doc.mime_type, "text/plain");
        assert_eq!(doc.bytes.len(), 40);
    }

    #[tokio::test]
    async fn unknown_extension_falls_back_to_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let doc = load(&path, None, 1024).await.unwrap();
        assert_eq!(doc.mime_type, "application/pdf");

        let doc = load(&path, Some("image/png"), 1024).await.unwrap();
        assert_eq!(doc.mime_type, "image/png");
    }

    #[tokio::test]
    async fn oversized_and_missing_documents_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![0u8; 16]).unwrap();

        assert!(matches!(
            load(&path, None, 8).await,
            Err(AppError::DocumentTooLarge { size: 16, limit: 8, .. })
        ));
        assert!(matches!(
            load(&dir.path().join("absent.pdf"), None, 8).await,
            Err(AppError::Document { .. })
        ));
    }
}
