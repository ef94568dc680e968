//! Photo preparation pipeline.

use crate::encoder::encode_within_ceiling;
use crate::error::{MediaError, Result};
use crate::watermark::{apply_watermark, WatermarkText};
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::config::ImageConfig;
use core_runtime::logging::strip_path;
use image::RgbImage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// File name prefix of every image this crate writes.
pub const IMAGE_FILE_PREFIX: &str = "tugas_";

const IMAGE_FILE_EXTENSION: &str = ".jpg";

/// Whether `file_name` looks like a prepared report image.
pub fn is_prepared_image_name(file_name: &str) -> bool {
    file_name.starts_with(IMAGE_FILE_PREFIX) && file_name.ends_with(IMAGE_FILE_EXTENSION)
}

/// Officer identity stamped into the photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub national_id: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, national_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            national_id: national_id.into(),
        }
    }
}

/// GPS fix as reported by the device, kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub latitude: String,
    pub longitude: String,
}

impl Coordinates {
    pub fn new(latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }
}

/// An encoded photo written to the image directory.
///
/// Owned by the submission attempt that produced it until it is either
/// delivered or handed to the report queue.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub path: PathBuf,
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub within_ceiling: bool,
}

impl PreparedImage {
    pub fn bytes_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Decodes, watermarks and compresses report photos.
pub struct ImagePreparer {
    output_dir: PathBuf,
    config: ImageConfig,
    clock: Arc<dyn Clock>,
}

impl ImagePreparer {
    pub fn new(output_dir: impl Into<PathBuf>, config: ImageConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
            clock,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Stamps the photo at `source` with identity, coordinates and the
    /// current local time, then encodes it under the size ceiling.
    ///
    /// # Errors
    ///
    /// [`MediaError::Decode`] when `source` is not a readable image. Callers
    /// treat that as fatal for the submission.
    #[instrument(skip(self, source, identity, coords), fields(source = %strip_path(&source.to_string_lossy())))]
    pub async fn prepare(
        &self,
        source: &Path,
        identity: &Identity,
        coords: &Coordinates,
    ) -> Result<PreparedImage> {
        let raw = read_source(source).await?;
        let text = WatermarkText::new(
            &identity.name,
            &identity.national_id,
            &coords.latitude,
            &coords.longitude,
            self.clock.now_local(),
        );
        self.process(raw, Some(text)).await
    }

    /// Re-encodes the photo at `source` under the size ceiling without a
    /// watermark. Used when replacing the photo of an already submitted
    /// report.
    #[instrument(skip(self, source), fields(source = %strip_path(&source.to_string_lossy())))]
    pub async fn reduce(&self, source: &Path) -> Result<PreparedImage> {
        let raw = read_source(source).await?;
        self.process(raw, None).await
    }

    async fn process(&self, raw: Vec<u8>, watermark: Option<WatermarkText>) -> Result<PreparedImage> {
        let config = self.config;
        let (encoded, width, height) = tokio::task::spawn_blocking(move || {
            let mut img: RgbImage = image::load_from_memory(&raw)
                .map_err(|e| MediaError::Decode(e.to_string()))?
                .to_rgb8();
            if let Some(text) = watermark {
                apply_watermark(&mut img, &text);
            }
            let encoded = encode_within_ceiling(&img, &config)?;
            Ok::<_, MediaError>((encoded, img.width(), img.height()))
        })
        .await
        .map_err(|e| MediaError::Task(e.to_string()))??;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!(
            "{}{}{}",
            IMAGE_FILE_PREFIX,
            Uuid::new_v4(),
            IMAGE_FILE_EXTENSION
        ));
        tokio::fs::write(&path, &encoded.bytes).await?;

        info!(
            file = %strip_path(&path.to_string_lossy()),
            size = encoded.bytes.len(),
            quality = encoded.quality,
            within_ceiling = encoded.within_ceiling,
            "Prepared report image"
        );

        Ok(PreparedImage {
            path,
            bytes: Bytes::from(encoded.bytes),
            width,
            height,
            quality: encoded.quality,
            within_ceiling: encoded.within_ceiling,
        })
    }
}

async fn read_source(source: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(source).await {
        Ok(raw) => {
            debug!(size = raw.len(), "Read source image");
            Ok(raw)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(MediaError::SourceNotFound(
            strip_path(&source.to_string_lossy()).to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
