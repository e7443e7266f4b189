//! MIME type guessing and coarse attachment classification.

use serde::{Deserialize, Serialize};

/// Fallback when nothing better is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("heic", "image/heic"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("zip", "application/zip"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
];

const DOCUMENT_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

/// Guess a MIME type from a file name's extension.
///
/// ```
/// use notevault_core::mime::guess_mime_type;
///
/// assert_eq!(guess_mime_type("hello.TXT"), "text/plain");
/// assert_eq!(guess_mime_type("blob"), "application/octet-stream");
/// ```
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Coarse attachment category, used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Document,
    Other,
}

impl FileKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            FileKind::Image
        } else if mime_type == "application/pdf" {
            FileKind::Pdf
        } else if mime_type.starts_with("text/") || DOCUMENT_TYPES.contains(&mime_type) {
            FileKind::Document
        } else {
            FileKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
            FileKind::Document => "document",
            FileKind::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_known_and_unknown() {
        assert_eq!(guess_mime_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_mime_type("report.final.pdf"), "application/pdf");
        assert_eq!(guess_mime_type("archive.tar.xz"), DEFAULT_MIME_TYPE);
        assert_eq!(guess_mime_type("noext"), DEFAULT_MIME_TYPE);
        assert_eq!(guess_mime_type("trailingdot."), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_mime("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_mime("application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_mime("text/plain"), FileKind::Document);
        assert_eq!(
            FileKind::from_mime("application/vnd.ms-excel"),
            FileKind::Document
        );
        assert_eq!(FileKind::from_mime(DEFAULT_MIME_TYPE), FileKind::Other);
    }
}
