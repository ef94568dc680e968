//! # Report Photo Preparation
//!
//! Turns a captured photo into the image that travels with an off-site task
//! report:
//! - Decode the source file
//! - Stamp a watermark band with officer identity, coordinates and local time
//! - Re-encode as JPEG under a byte-size ceiling
//! - Persist the result as `tugas_<uuid>.jpg` in the image directory
//!
//! Decoding and encoding are CPU bound and run on tokio's blocking pool.
//!
//! ## Usage
//!
//! ```ignore
//! use core_media::{Coordinates, Identity, ImagePreparer};
//!
//! let preparer = ImagePreparer::new(image_dir, config.image, config.clock.clone());
//! let prepared = preparer
//!     .prepare(
//!         &photo_path,
//!         &Identity::new("Siti Rahma", "3201010101010001"),
//!         &Coordinates::new("-6.4817", "106.8540"),
//!     )
//!     .await?;
//! ```

pub mod encoder;
pub mod error;
pub mod preparer;
pub mod watermark;

pub use encoder::{encode_within_ceiling, EncodedJpeg};
pub use error::{MediaError, Result};
pub use preparer::{
    is_prepared_image_name, Coordinates, Identity, ImagePreparer, PreparedImage,
    IMAGE_FILE_PREFIX,
};
pub use watermark::{apply_watermark, WatermarkText};
