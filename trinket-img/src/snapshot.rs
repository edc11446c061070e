use anyhow::Result;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub fn file_name(at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("jewelry-tryon-{millis}.png")
}

/// Writes `img` as a PNG into `dir`, returning the path written.
pub fn save(img: &RgbaImage, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(file_name(SystemTime::now()));
    img.save(&path)?;
    info!("Snapshot at {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn names_by_timestamp() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(file_name(at), "jewelry-tryon-1700000000123.png");
    }

    #[test]
    fn saves_png() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("trinket-snapshot-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;

        let path = save(&RgbaImage::new(3, 2), &dir)?;
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(image::open(&path)?.into_rgba8().dimensions(), (3, 2));

        std::fs::remove_dir_all(dir)?;
        Ok(())
    }
}
