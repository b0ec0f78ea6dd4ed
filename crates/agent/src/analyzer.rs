use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Placeholder note for attachments that cannot be decoded as text. A bad
/// attachment never aborts the turn.
pub const UNREADABLE_NOTE: &str = "Archivo procesado (formato no legible)";

const PREVIEW_CHARS: usize = 200;

/// Optional collaborator turning an uploaded attachment into a short note
/// appended to the conversation context. Does not affect the stage
/// machine.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, content_base64: &str) -> String;
}

/// Local analyzer: base64-decode, read as UTF-8, keep a truncated preview.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextPreviewAnalyzer;

#[async_trait]
impl DocumentAnalyzer for TextPreviewAnalyzer {
    async fn analyze(&self, content_base64: &str) -> String {
        let decoded = match BASE64.decode(content_base64.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return UNREADABLE_NOTE.to_string(),
        };
        let text = match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(_) => return UNREADABLE_NOTE.to_string(),
        };

        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        if text.chars().count() > PREVIEW_CHARS {
            format!("Archivo analizado: {preview}...")
        } else {
            format!("Archivo analizado: {preview}")
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    use super::{DocumentAnalyzer, TextPreviewAnalyzer, UNREADABLE_NOTE};

    #[tokio::test]
    async fn readable_text_yields_a_preview_note() {
        let encoded = BASE64.encode("Proceso de facturación: manual, en excel");
        let note = TextPreviewAnalyzer.analyze(&encoded).await;
        assert_eq!(note, "Archivo analizado: Proceso de facturación: manual, en excel");
    }

    #[tokio::test]
    async fn long_documents_are_truncated() {
        let encoded = BASE64.encode("x".repeat(500));
        let note = TextPreviewAnalyzer.analyze(&encoded).await;
        assert!(note.ends_with("..."));
        assert!(note.len() < 250);
    }

    #[tokio::test]
    async fn invalid_base64_yields_placeholder() {
        let note = TextPreviewAnalyzer.analyze("definitely not base64!!!").await;
        assert_eq!(note, UNREADABLE_NOTE);
    }

    #[tokio::test]
    async fn non_utf8_bytes_yield_placeholder() {
        let encoded = BASE64.encode([0xff, 0xfe, 0x00, 0x80]);
        let note = TextPreviewAnalyzer.analyze(&encoded).await;
        assert_eq!(note, UNREADABLE_NOTE);
    }
}
