//! Image transcoding for uploads and generated artifacts.

use crate::session::ImageArtifact;
use anyhow::Context;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

pub fn encode(img: &DynamicImage, format: ImageFormat) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .with_context(|| format!("failed to encode image as {format:?}"))?;
    Ok(buf.into_inner())
}

fn decode(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    image::load_from_memory(bytes).context("unsupported or corrupt image")
}

/// Re-encode an uploaded image as JPEG for the vision model.
pub fn to_jpeg(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let img = DynamicImage::ImageRgb8(decode(bytes)?.to_rgb8());
    encode(&img, ImageFormat::Jpeg)
}

/// Re-encode an uploaded image as PNG for the image editing model.
pub fn to_png(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    encode(&decode(bytes)?, ImageFormat::Png)
}

/// Write a generated image into `dir` under a fresh `gen_<uuid>.png` name.
///
/// Files are never removed by this process.
pub fn write_artifact(dir: &Path, data: &[u8]) -> anyhow::Result<ImageArtifact> {
    let img = decode(data)?;
    let path = dir.join(format!("gen_{}.png", uuid::Uuid::new_v4().simple()));
    img.save_with_format(&path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote generated image");
    Ok(ImageArtifact {
        path,
        mime_type: "image/png".to_string(),
    })
}

/// True for names produced by [`write_artifact`]; anything else is refused
/// when serving files back.
pub fn is_artifact_name(name: &str) -> bool {
    name.strip_prefix("gen_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    pub(crate) fn sample_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 128])));
        encode(&img, ImageFormat::Png).unwrap()
    }

    #[test]
    fn rgba_upload_becomes_jpeg() {
        let jpeg = to_jpeg(&sample_png()).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (4, 3));
    }

    #[test]
    fn garbage_upload_is_rejected() {
        assert!(to_png(b"nope").is_err());
        assert!(to_jpeg(&[]).is_err());
    }

    #[test]
    fn artifact_is_written_with_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let art = write_artifact(dir.path(), &sample_png()).unwrap();

        assert!(art.path.starts_with(dir.path()));
        assert!(is_artifact_name(art.file_name().unwrap()));
        assert_eq!(art.mime_type, "image/png");
        let written = std::fs::read(&art.path).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Png);

        let other = write_artifact(dir.path(), &sample_png()).unwrap();
        assert_ne!(art.path, other.path);
    }

    #[test]
    fn artifact_names_are_validated() {
        assert!(is_artifact_name("gen_0123abcdef.png"));
        assert!(!is_artifact_name("gen_.png"));
        assert!(!is_artifact_name("gen_../../etc/passwd.png"));
        assert!(!is_artifact_name("other.png"));
    }
}
