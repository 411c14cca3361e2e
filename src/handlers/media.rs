//! Base64 image intake.
//!
//! Clients send images as `data:image/<subtype>;base64,<payload>` data
//! URLs. The payload is decoded and written under the media root; entities
//! store the path relative to that root.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::fs;
use uuid::Uuid;

use crate::error::AppError;

/// Decodes a data URL and writes it to `<media_root>/<subdir>/<uuid>.<ext>`.
///
/// Returns the path relative to the media root.
pub async fn save_base64_image(
    media_root: &str,
    subdir: &str,
    data_url: &str,
) -> Result<String, AppError> {
    let (meta, payload) = data_url
        .split_once(";base64,")
        .ok_or_else(|| AppError::validation("Изображение должно быть передано как base64"))?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| AppError::validation("Некорректные base64-данные изображения"))?;

    let file_name = format!("{}.{}", Uuid::new_v4().simple(), extension(meta));

    let dir = Path::new(media_root).join(subdir);
    fs::create_dir_all(&dir).await?;
    fs::write(dir.join(&file_name), bytes).await?;

    Ok(format!("{subdir}/{file_name}"))
}

fn extension(meta: &str) -> &str {
    match meta.strip_prefix("data:image/") {
        Some("jpeg") => "jpg",
        Some(subtype) if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()) => {
            subtype
        }
        _ => "png",
    }
}
