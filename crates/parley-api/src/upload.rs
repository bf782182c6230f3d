use std::path::Path;

use axum::extract::multipart::Field;
use tracing::info;
use uuid::Uuid;

/// On-disk directory for uploaded profile pictures. Served read-only under
/// the same path prefix by the server binary.
pub const UPLOAD_DIR: &str = "uploads";

/// Store an uploaded profile picture and hand back its public relative
/// path, or `None` when the field carried no data.
pub async fn store_profile_pic(field: Field<'_>) -> anyhow::Result<Option<String>> {
    let original_name = field.file_name().map(|n| n.to_owned());
    let data = field.bytes().await?;
    if data.is_empty() {
        return Ok(None);
    }

    let extension = original_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let file_name = format!("{}.{}", Uuid::new_v4(), extension);

    tokio::fs::create_dir_all(UPLOAD_DIR).await?;
    let path = Path::new(UPLOAD_DIR).join(&file_name);
    tokio::fs::write(&path, &data).await?;

    info!("stored profile picture {} ({} bytes)", path.display(), data.len());
    Ok(Some(format!("/{UPLOAD_DIR}/{file_name}")))
}
