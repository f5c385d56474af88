//! File classification shared by the upload path and the podcast gateway.
//!
//! Both sides must agree on the storage subfolder for a given file, so the
//! lookup is a fixed two-stage table: extension → canonical MIME type →
//! coarse category.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse storage category; doubles as the per-user subfolder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Docs,
    Code,
    Images,
    Others,
}

impl FileCategory {
    pub fn subfolder(self) -> &'static str {
        match self {
            FileCategory::Docs => "docs",
            FileCategory::Code => "code",
            FileCategory::Images => "images",
            FileCategory::Others => "others",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.subfolder())
    }
}

/// Canonical MIME type for a lowercase extension (without the dot).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt" => "application/vnd.ms-powerpoint",
        "txt" => "text/plain",
        "py" => "text/x-python",
        "js" => "application/javascript",
        "md" => "text/markdown",
        "html" => "text/html",
        "xml" => "application/xml",
        "json" => "application/json",
        "csv" => "text/csv",
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime)
}

/// Category for an allowed MIME type. Used directly by uploads, which know
/// the declared type rather than the name.
pub fn classify_mime(mime: &str) -> FileCategory {
    match mime {
        "application/pdf"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "application/vnd.ms-powerpoint"
        | "text/plain" => FileCategory::Docs,
        "text/x-python" | "application/javascript" | "text/javascript" | "text/markdown"
        | "text/html" | "application/xml" | "text/xml" | "application/json" | "text/csv" => {
            FileCategory::Code
        }
        "image/jpeg" | "image/png" | "image/bmp" | "image/gif" => FileCategory::Images,
        _ => FileCategory::Others,
    }
}

/// Category for an original (user-facing) filename.
pub fn classify_filename(original_name: &str) -> FileCategory {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref().and_then(mime_for_extension) {
        Some(mime) => classify_mime(mime),
        None => FileCategory::Others,
    }
}
