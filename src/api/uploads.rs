//! Multipart form ingestion with image staging.
//!
//! Image parts are written straight to the image directory under a generated
//! name (`<field>-<millis>-<random><ext>`); text parts are kept in memory. An
//! `UploadForm` that is dropped before `commit` deletes every image it staged,
//! so a request that fails validation or rolls back its transaction leaves no
//! orphan files behind.

use axum::extract::{multipart::MultipartError, Multipart};
use rand::Rng;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

use super::response::ApiError;

/// Multipart fields accepted as image uploads.
pub const IMAGE_FIELDS: &[&str] = &[
    "bannerImage",
    "image",
    "logo",
    "icon",
    "webImage",
    "appImage",
    "thumbnail1",
    "thumbnail2",
    "imageThumbnail",
];

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

#[derive(Debug)]
pub struct UploadForm {
    dir: PathBuf,
    fields: HashMap<String, Vec<String>>,
    images: HashMap<String, Vec<String>>,
    committed: bool,
}

impl UploadForm {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fields: HashMap::new(),
            images: HashMap::new(),
            committed: false,
        }
    }

    /// Drains `multipart`, staging image parts into `dir`.
    ///
    /// # Errors
    /// `BadRequest` for malformed bodies, disallowed image types or oversized
    /// files; `Internal` when a file cannot be written.
    pub async fn from_multipart(mut multipart: Multipart, dir: &Path) -> Result<Self, ApiError> {
        let mut form = Self::new(dir);

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if !IMAGE_FIELDS.contains(&name.as_str()) {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.entry(name).or_default().push(value);
                continue;
            }

            // Browsers send an empty part for a file input left blank.
            let Some(original) = field.file_name().filter(|f| !f.is_empty()) else {
                continue;
            };
            let extension = image_extension(original, field.content_type())?;

            let mut bytes = Vec::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                    return Err(ApiError::bad_request("Image exceeds the 5 MiB limit"));
                }
                bytes.extend_from_slice(&chunk);
            }

            let stored = stored_name(&name, &extension);
            tokio::fs::write(form.dir.join(&stored), &bytes)
                .await
                .map_err(ApiError::internal)?;
            debug!(field = %name, file = %stored, size = bytes.len(), "staged image");
            form.images.entry(name).or_default().push(stored);
        }

        Ok(form)
    }

    /// First value of a text field, trimmed; `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Every value sent for `name` or `name[]`, with comma separated values split.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<String> {
        let bracketed = format!("{name}[]");
        [name, bracketed.as_str()]
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .flatten()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Stored file name of the first image uploaded under `name`.
    #[must_use]
    pub fn image(&self, name: &str) -> Option<&str> {
        self.images
            .get(name)
            .and_then(|files| files.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn images(&self, name: &str) -> &[String] {
        self.images.get(name).map_or(&[], Vec::as_slice)
    }

    /// Fails with the list of fields that are neither a non-blank text value,
    /// a non-empty `name[]` list nor an uploaded image.
    ///
    /// # Errors
    /// `BadRequest` naming every missing field.
    pub fn require(&self, names: &[&str]) -> Result<(), ApiError> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| {
                self.text(name).is_none() && self.image(name).is_none() && self.list(name).is_empty()
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::bad_request(format!(
                "Invalid or incomplete data: Missing fields {}",
                missing.join(", ")
            )))
        }
    }

    /// # Errors
    /// `BadRequest` when the field is missing or does not parse.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, ApiError> {
        self.parse_opt(name)?
            .ok_or_else(|| ApiError::bad_request(format!("Missing field {name}")))
    }

    /// # Errors
    /// `BadRequest` when the field is present but does not parse.
    pub fn parse_opt<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.text(name)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|_| ApiError::bad_request(format!("Invalid value for {name}")))
            })
            .transpose()
    }

    /// Boolean form value; accepts `true/false`, `1/0` and `on/off`.
    ///
    /// # Errors
    /// `BadRequest` for any other value.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, ApiError> {
        match self.text(name).map(str::to_ascii_lowercase).as_deref() {
            None => Ok(None),
            Some("true" | "1" | "on") => Ok(Some(true)),
            Some("false" | "0" | "off") => Ok(Some(false)),
            Some(_) => Err(ApiError::bad_request(format!("Invalid value for {name}"))),
        }
    }

    /// Keeps the staged images. Call only after the write that references them
    /// has committed.
    pub fn commit(&mut self) {
        self.committed = true;
    }
}

#[cfg(test)]
impl UploadForm {
    /// In-memory form for handler tests; `images` are recorded as already
    /// committed so nothing is removed on drop.
    pub(crate) fn from_pairs(fields: &[(&str, &str)], images: &[(&str, &str)]) -> Self {
        let mut form = Self::new(&std::env::temp_dir());
        for (name, value) in fields {
            form.fields
                .entry((*name).to_string())
                .or_default()
                .push((*value).to_string());
        }
        for (name, stored) in images {
            form.images
                .entry((*name).to_string())
                .or_default()
                .push((*stored).to_string());
        }
        form.committed = true;
        form
    }
}

impl Drop for UploadForm {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for file in self.images.values().flatten() {
            let path = self.dir.join(file);
            if let Err(err) = std::fs::remove_file(&path) {
                warn!("Failed to remove staged image {}: {err}", path.display());
            }
        }
    }
}

/// Deletes replaced images after the replacing write committed. Failures are
/// logged and otherwise ignored.
pub async fn remove_images<I, S>(dir: &Path, files: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for file in files {
        let file = file.as_ref();
        if file.is_empty() || file.contains('/') || file.contains("..") {
            continue;
        }
        let path = dir.join(file);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove image {}: {err}", path.display());
        }
    }
}

fn image_extension(file_name: &str, content_type: Option<&str>) -> Result<String, ApiError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

    let mime_ok = content_type
        .and_then(|mime| mime.strip_prefix("image/"))
        .is_some_and(|subtype| ALLOWED_EXTENSIONS.contains(&subtype.to_ascii_lowercase().as_str()));

    match extension {
        Some(ext) if mime_ok => Ok(format!(".{ext}")),
        _ => Err(ApiError::bad_request(
            "Only jpeg, jpg, png, gif and webp images are allowed",
        )),
    }
}

fn stored_name(field: &str, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{field}-{millis}-{random}{extension}")
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
}
