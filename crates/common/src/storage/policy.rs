//! Per-artifact upload limits

use super::Upload;
use crate::errors::{AppError, Result};

const MIB: usize = 1024 * 1024;

const DOC: &str = "application/msword";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const PDF: &str = "application/pdf";
const JPEG: &str = "image/jpeg";
const PNG: &str = "image/png";

/// Accepted media types, size ceiling and file count for one kind of upload
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub kind: &'static str,
    /// Empty means any media type
    pub allowed_types: &'static [&'static str],
    pub max_bytes: usize,
    pub max_files: usize,
}

impl UploadPolicy {
    pub const MANUSCRIPT: UploadPolicy = UploadPolicy {
        kind: "manuscript",
        allowed_types: &[DOC, DOCX],
        max_bytes: 10 * MIB,
        max_files: 1,
    };

    pub const REVISION: UploadPolicy = UploadPolicy {
        kind: "revision",
        allowed_types: &[PDF],
        max_bytes: 10 * MIB,
        max_files: 1,
    };

    pub const REVIEW_ATTACHMENT: UploadPolicy = UploadPolicy {
        kind: "review attachment",
        allowed_types: &[],
        max_bytes: 5 * MIB,
        max_files: 10,
    };

    pub const PAYMENT_PROOF: UploadPolicy = UploadPolicy {
        kind: "payment proof",
        allowed_types: &[JPEG, PNG, PDF],
        max_bytes: 2 * MIB,
        max_files: 1,
    };

    pub const FINAL_PUBLICATION: UploadPolicy = UploadPolicy {
        kind: "final publication",
        allowed_types: &[PDF],
        max_bytes: 15 * MIB,
        max_files: 1,
    };

    /// Validate a single upload
    pub fn check(&self, upload: &Upload) -> Result<()> {
        if upload.is_empty() {
            return Err(AppError::Validation {
                message: format!("Uploaded {} is empty", self.kind),
                field: None,
            });
        }

        if upload.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge {
                size: upload.len(),
                limit: self.max_bytes,
            });
        }

        if self.allowed_types.is_empty() {
            return Ok(());
        }

        let media_type = effective_media_type(upload);
        if self.allowed_types.contains(&media_type.as_str()) {
            Ok(())
        } else {
            Err(AppError::UnsupportedMediaType {
                mime_type: media_type,
                allowed: self.allowed_types.join(", "),
            })
        }
    }

    /// Validate a batch of uploads for one request
    pub fn check_all(&self, uploads: &[Upload]) -> Result<()> {
        if uploads.len() > self.max_files {
            return Err(AppError::Validation {
                message: format!(
                    "At most {} {} files may be uploaded at once",
                    self.max_files, self.kind
                ),
                field: None,
            });
        }

        uploads.iter().try_for_each(|u| self.check(u))
    }
}

/// Declared media type, or one inferred from the extension when the
/// client sent nothing useful.
fn effective_media_type(upload: &Upload) -> String {
    let declared = upload
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !declared.is_empty() && declared != "application/octet-stream" {
        return match declared.as_str() {
            "image/jpg" | "image/pjpeg" => JPEG.to_string(),
            _ => declared,
        };
    }

    let inferred = match upload.extension().as_deref() {
        Some("doc") => DOC,
        Some("docx") => DOCX,
        Some("pdf") => PDF,
        Some("jpg") | Some("jpeg") => JPEG,
        Some("png") => PNG,
        _ => "application/octet-stream",
    };
    inferred.to_string()
}
