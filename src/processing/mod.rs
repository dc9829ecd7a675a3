//! Per-image work: discovery, transcoding and folder measurement

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::DynamicImage;
use tracing::debug;

use crate::config::TranscodeSettings;
use crate::error::TranscodeError;

pub mod formats;
pub mod resize;
pub mod scanner;
pub mod sizer;

pub use formats::*;
pub use resize::*;
pub use scanner::*;
pub use sizer::*;

/// One discovered input file and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    name: String,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            input_path,
            output_path,
        }
    }

    /// File name relative to the input folder
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// What a successful transcode produced
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub original_dimensions: (u32, u32),
    pub output_dimensions: (u32, u32),
    pub format: ImageFormat,
    pub output_size: u64,
    pub processing_time: Duration,
}

/// Decodes an image, halves it and writes it back with the configured encoder
#[derive(Debug, Clone, Default)]
pub struct ImageTranscoder {
    settings: TranscodeSettings,
    resizer: HalfResizer,
}

impl ImageTranscoder {
    pub fn new(settings: TranscodeSettings) -> Self {
        Self {
            resizer: HalfResizer::new(settings.filter),
            settings,
        }
    }

    /// Transcode a single image.
    ///
    /// Blocks on decoding, resizing and encoding. On failure no output file
    /// is left behind.
    pub fn transcode(&self, image: &ImageRef) -> Result<TranscodeOutput, TranscodeError> {
        let start_time = Instant::now();
        let input_path = image.input_path();
        let output_path = image.output_path();

        debug!("Processing file: {:?} -> {:?}", input_path, output_path);

        let (decoded, decoded_format) = self.load_image(input_path)?;
        let original_dimensions = (decoded.width(), decoded.height());

        let resized = self.resizer.resize(&decoded, input_path)?;
        drop(decoded);

        let format = detect_format_from_path(output_path)
            .or(decoded_format)
            .unwrap_or(ImageFormat::Jpeg);

        if let Err(e) = self.save_image(&resized, output_path, format) {
            let _ = fs::remove_file(output_path);
            return Err(e);
        }

        let output_size = fs::metadata(output_path)
            .map_err(|e| TranscodeError::io(output_path, e))?
            .len();

        let output = TranscodeOutput {
            original_dimensions,
            output_dimensions: (resized.width(), resized.height()),
            format,
            output_size,
            processing_time: start_time.elapsed(),
        };

        debug!(
            "Saved {}: {}x{} -> {}x{} ({:.2}MB, {:?})",
            image.name(),
            output.original_dimensions.0,
            output.original_dimensions.1,
            output.output_dimensions.0,
            output.output_dimensions.1,
            output.output_size as f64 / 1024.0 / 1024.0,
            output.processing_time
        );

        Ok(output)
    }

    /// Decode by content, so a mislabelled extension still loads
    fn load_image(&self, path: &Path) -> Result<(DynamicImage, Option<ImageFormat>), TranscodeError> {
        let reader = image::io::Reader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| TranscodeError::io(path, e))?;

        let format = reader.format().and_then(ImageFormat::from_image_format);

        let decoded = reader.decode().map_err(|source| TranscodeError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        Ok((decoded, format))
    }

    fn save_image(
        &self,
        image: &DynamicImage,
        output_path: &Path,
        format: ImageFormat,
    ) -> Result<(), TranscodeError> {
        let encode_error = |source: image::ImageError| TranscodeError::Encode {
            path: output_path.to_path_buf(),
            source,
        };

        let file = File::create(output_path).map_err(|e| TranscodeError::io(output_path, e))?;
        let mut writer = BufWriter::new(file);

        if format.supports_quality() {
            // JPEG has no alpha channel and no 16-bit mode
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut writer, self.settings.quality);
            rgb.write_with_encoder(encoder).map_err(encode_error)?;
        } else if format.supports_optimization() && self.settings.optimize {
            let encoder = PngEncoder::new_with_quality(
                &mut writer,
                CompressionType::Best,
                PngFilterType::Adaptive,
            );
            image.write_with_encoder(encoder).map_err(encode_error)?;
        } else {
            image
                .write_to(&mut writer, image::ImageFormat::from(format))
                .map_err(encode_error)?;
        }

        writer.flush().map_err(|e| TranscodeError::io(output_path, e))
    }
}
