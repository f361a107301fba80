//! `multipart/form-data` request bodies

use axum::extract::{multipart::MultipartError, Multipart};
use reviewflow_common::{
    errors::{AppError, Result},
    storage::Upload,
};
use std::collections::HashMap;

/// A fully read multipart body: text fields by name plus file parts in order
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: Vec<(String, Upload)>,
}

fn malformed(e: MultipartError) -> AppError {
    AppError::InvalidFormat {
        message: e.body_text(),
    }
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Form::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    // Browsers send an empty, unnamed part for an untouched file input
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files
                        .push((name, Upload::new(file_name, content_type, bytes.to_vec())));
                }
                None => {
                    let text = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Text field, if present
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Text field that must be present and non-blank
    pub fn required(&self, name: &str) -> Result<&str> {
        self.text(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::MissingField {
                field: name.to_string(),
            })
    }

    /// Text field holding JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        serde_json::from_str(self.required(name)?)
            .map_err(|e| AppError::validation(name, format!("Malformed {}: {}", name, e)))
    }

    /// First file part with the given name
    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        let index = self.files.iter().position(|(n, _)| n == name)?;
        Some(self.files.remove(index).1)
    }

    /// Every file part with the given name, in arrival order
    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(n, _)| n == name);
        self.files = rest;
        taken.into_iter().map(|(_, upload)| upload).collect()
    }
}
