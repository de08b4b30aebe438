//! Multipart form extraction.
//!
//! Text parts become [`FormFields`]; file parts are buffered by field name
//! and only written to disk once the input has parsed, so a rejected form
//! never leaves files behind.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::Field;

use crate::error::AppError;
use crate::files::{FileStore, StoredFile, UploadKind, UploadedFile};
use crate::input::FormFields;

/// A fully read multipart submission.
#[derive(Debug, Default)]
pub struct SubmittedForm {
    pub fields: FormFields,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl SubmittedForm {
    /// Read every part of the request.
    ///
    /// File inputs left empty by the browser (no name, no bytes) are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is not valid multipart or a
    /// text part is not UTF-8.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::debug!(error = %e, "failed to read multipart field");
            AppError::BadRequest(format!("invalid multipart body: {e}"))
        })? {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };

            if field.file_name().is_some() {
                if let Some(file) = read_file(field).await? {
                    form.files.entry(name).or_default().push(file);
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("field '{name}': {e}")))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Remove and return the files submitted under `field`, in submission
    /// order.
    pub fn take_files(&mut self, field: &str) -> Vec<UploadedFile> {
        self.files.remove(field).unwrap_or_default()
    }

    /// Number of files still held, for logging.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

async fn read_file(field: Field<'_>) -> Result<Option<UploadedFile>, AppError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(ToString::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("file '{original_name}': {e}")))?;

    if original_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(UploadedFile {
        original_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

/// Write `uploads` to the store, in order.
///
/// If any write fails, the files already written by this call are removed
/// before the error is returned.
///
/// # Errors
///
/// Returns `AppError::File` if a write fails.
pub async fn store_all(
    store: &FileStore,
    kind: UploadKind,
    uploads: Vec<UploadedFile>,
) -> Result<Vec<StoredFile>, AppError> {
    let mut stored = Vec::with_capacity(uploads.len());

    for upload in uploads {
        match store.save(kind, upload).await {
            Ok(file) => stored.push(file),
            Err(e) => {
                store.discard(&stored).await;
                return Err(e.into());
            }
        }
    }

    Ok(stored)
}
